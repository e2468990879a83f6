// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Straight extrusion of a footprint

use super::step::{extrude_step, initial_state, push_triangle};
use super::{ExtrusionState, StepOptions};
use crate::error::{DddError, Result};
use crate::geometry::{Mesh, Shape2};
use geo::MultiPolygon;
use nalgebra::Point3;

/// Lift a footprint to height `h`: walls around every ring, a triangulated
/// cap at `h` and a base at 0. Holes get inward walls; each polygon of a
/// multipolygon is extruded on its own. A negative height extrudes
/// downwards, still with outward normals. Lines become vertical ribbons.
pub fn extrude(shape: &Shape2, h: f64, cap: bool, base: bool) -> Result<(Mesh, ExtrusionState)> {
    if !h.is_finite() || h == 0.0 {
        return Err(DddError::geometry_msg(
            shape.kind().to_string(),
            format!("invalid extrusion height {h}"),
        ));
    }

    let area = Shape2::from_multipolygon(MultiPolygon::new(shape.polygons()));
    let (mut mesh, state) = if area.is_empty() {
        (Mesh::new(), initial_state(&area))
    } else {
        let opts = StepOptions::default().with_cap(cap).with_base(base);
        extrude_step(&Mesh::new(), &initial_state(&area), &area, h, &opts)?
    };

    let ribbons = extrude_lines(shape, 0.0, h);
    if !ribbons.is_empty() {
        mesh.merge(&ribbons);
        mesh.recompute_normals();
    }
    Ok((mesh, state))
}

/// Vertical ribbons under every line of a shape, from `z0` to `z0 + h`
pub fn extrude_lines(shape: &Shape2, z0: f64, h: f64) -> Mesh {
    let mut mesh = Mesh::new();
    let z1 = z0 + h;
    for line in shape.lines() {
        for segment in line.lines() {
            let a0 = Point3::new(segment.start.x, segment.start.y, z0);
            let b0 = Point3::new(segment.end.x, segment.end.y, z0);
            let (a1, b1) = (Point3::new(a0.x, a0.y, z1), Point3::new(b0.x, b0.y, z1));
            if h > 0.0 {
                push_triangle(&mut mesh, a0, b0, b1);
                push_triangle(&mut mesh, a0, b1, a1);
            } else {
                push_triangle(&mut mesh, a0, b1, b0);
                push_triangle(&mut mesh, a0, a1, b1);
            }
        }
    }
    mesh.merge_vertices();
    mesh.recompute_normals();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::mesh_utils::is_closed;
    use geo::{line_string, polygon};

    #[test]
    fn test_box_from_rect() {
        let rect = Shape2::Polygon(polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 7.0), (x: 0.0, y: 7.0)]);
        let (mesh, state) = extrude(&rect, 3.0, true, true).unwrap();
        assert_eq!(mesh.triangle_count(), 12);
        assert!(is_closed(&mesh));
        assert!((mesh.volume() - 84.0).abs() < 1e-9);
        assert_eq!(state.steps, 1);
        assert_eq!(state.last_z, 3.0);
    }

    #[test]
    fn test_hole_walls_face_inward() {
        let ring = Shape2::Polygon(polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)]],
        ));
        let (mesh, _) = extrude(&ring, 2.0, true, true).unwrap();
        assert!(is_closed(&mesh));
        assert!((mesh.volume() - 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_open_extrusion_and_ribbons() {
        let rect = Shape2::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)]);
        let (open, _) = extrude(&rect, 1.0, false, false).unwrap();
        assert_eq!(open.triangle_count(), 8);
        assert!(!is_closed(&open));

        let wall = Shape2::Line(line_string![(x: 0.0, y: 0.0), (x: 3.0, y: 0.0), (x: 3.0, y: 2.0)]);
        let (ribbon, _) = extrude(&wall, 2.0, true, true).unwrap();
        assert_eq!(ribbon.triangle_count(), 4);
        assert!((ribbon.area() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_height_is_error() {
        let rect = Shape2::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0)]);
        assert!(extrude(&rect, 0.0, true, true).is_err());
    }
}
