// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh operations on 3D nodes: smoothing, face filtering, grid
//! subdivision, level-of-detail reduction, batching and UV mapping

mod batch;
mod reduce;
mod smooth;
mod subdivide;
pub mod uv;

pub use batch::batch_by_material;
pub use reduce::{decimate, reduce, reduce_bounds, reduce_quadric_decimation};
pub use smooth::smooth;
pub use subdivide::{subdivide_mesh, subdivide_to_grid};

use crate::geometry::Mesh;
use crate::node::Node3;
use nalgebra::Vector3;

/// Drop the faces whose unit normal has a dot product with `direction`
/// above `threshold`, in this node and its mesh descendants
pub fn remove_faces_pointing(obj: &Node3, direction: [f64; 3], threshold: f64) -> Node3 {
    let dir = Vector3::from(direction);
    let dir = if dir.norm() > 0.0 { dir.normalize() } else { dir };
    obj.map_meshes(&|m: &Mesh| {
        let normals = m.face_normals();
        let mut out = m.clone();
        out.retain_faces(|i, _| normals[i].map_or(true, |n| n.dot(&dir) <= threshold));
        out.remove_orphaned_vertices();
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;

    #[test]
    fn test_remove_bottom_faces() {
        let b = shapes::cuboid([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let open = remove_faces_pointing(&b, [0.0, 0.0, -1.0], 0.9);
        assert_eq!(open.triangle_count(), 10);
        assert!(!open.is_closed());
        assert_eq!(b.triangle_count(), 12);
    }
}
