// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

use crate::geometry::Mesh;
use crate::node::{Material, Node, Node3, SceneNode};
use nalgebra::Matrix4;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const NO_MATERIAL: &str = "default";

struct Batch {
    material: Option<Arc<Material>>,
    mesh: Mesh,
}

fn gather(node: &Node, parent: &Matrix4<f64>, batches: &mut BTreeMap<String, Batch>) {
    match node {
        Node::D3(n) => {
            let m = parent * n.transform.to_matrix();
            if let Some(mesh) = n.mesh.as_ref().filter(|mesh| !mesh.is_empty()) {
                let material = n.get_material().cloned();
                let key = material.as_ref().map_or(NO_MATERIAL.to_string(), |mat| mat.name.clone());
                let batch = batches.entry(key).or_insert_with(|| Batch {
                    material,
                    mesh: Mesh::new(),
                });
                let mut placed = mesh.clone();
                placed.transform(&m);
                batch.mesh.merge(&placed);
            }
            for child in n.children() {
                gather(child, &m, batches);
            }
        }
        Node::Instance(i) => {
            if let Some(proto) = i.prototype() {
                gather(&proto, &(parent * i.transform.to_matrix()), batches);
            }
        }
        Node::D2(n) => {
            for child in n.children() {
                gather(child, parent, batches);
            }
        }
    }
}

/// Flatten the tree and merge meshes sharing a material, giving one child
/// per material ordered by material name. Instances are expanded.
pub fn batch_by_material(root: &Node) -> Node3 {
    let mut batches = BTreeMap::new();
    gather(root, &Matrix4::identity(), &mut batches);

    let mut out = Node3::group().named(format!("{}_batched", root.label()));
    for (name, batch) in batches {
        let mut mesh = batch.mesh;
        mesh.merge_vertices();
        debug!(material = %name, triangles = mesh.triangle_count(), "Material batch");
        let mut node = Node3::new(mesh).named(name);
        node.set_material(batch.material, false);
        out.append(node);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;

    #[test]
    fn test_groups_by_material() {
        let brick = Material::new("brick").shared();
        let glass = Material::new("glass").shared();
        let mut root = Node::group3("city");
        let mut house = shapes::cuboid([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]).material(Some(brick.clone()), true);
        house.append(shapes::cuboid([0.0, 0.0, 1.0], [1.0, 1.0, 1.5]).material(Some(glass), true));
        root.append(house);
        root.append(
            shapes::cuboid([5.0, 0.0, 0.0], [6.0, 1.0, 2.0])
                .material(Some(brick), true)
                .translate([1.0, 0.0, 0.0]),
        );
        root.append(shapes::cuboid([9.0, 0.0, 0.0], [10.0, 1.0, 1.0]));

        let batched = batch_by_material(&root);
        let names: Vec<_> = batched.children().iter().filter_map(|c| c.name()).collect();
        assert_eq!(names, vec!["brick", "default", "glass"]);
        let brick_node = batched.children()[0].as_3d().unwrap();
        assert!((brick_node.volume() - 3.0).abs() < 1e-9);
        assert_eq!(brick_node.get_material().map(|m| m.name.as_str()), Some("brick"));
        let bounds = brick_node.bounds().unwrap();
        assert!((bounds.max.x - 7.0).abs() < 1e-9);
    }
}
