// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scene analytics and statistics

use super::mesh_utils::is_closed;
use crate::node::{Node, SceneNode};
use serde::{Deserialize, Serialize};

/// Statistics over a scene tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneStats {
    pub node_count: usize,
    pub node2_count: usize,
    pub node3_count: usize,
    pub instance_count: usize,
    /// Nodes carrying a mesh with at least one face
    pub mesh_count: usize,
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Sum of signed mesh volumes, in local node coordinates
    pub volume: f64,
    pub surface_area: f64,
    /// Sum of planar areas
    pub area_2d: f64,
    /// Bounding box [min_x, min_y, min_z, max_x, max_y, max_z]
    pub bbox: Option<[f64; 6]>,
    /// Meshes with every edge shared by exactly two faces
    pub watertight_meshes: usize,
    pub max_depth: usize,
}

impl SceneStats {
    /// Pretty print statistics
    pub fn print(&self) {
        println!("╔══════════════════════════════════════════════════════════╗");
        println!("║              SCENE ANALYTICS                             ║");
        println!("╠══════════════════════════════════════════════════════════╣");
        println!("║ Nodes:           {:>10}  (depth {:>3})                ║", self.node_count, self.max_depth);
        println!("║   2D:            {:>10}                              ║", self.node2_count);
        println!("║   3D:            {:>10}                              ║", self.node3_count);
        println!("║   Instances:     {:>10}                              ║", self.instance_count);
        println!("║                                                          ║");
        println!("║ Meshes:          {:>10}  ({} watertight)             ║", self.mesh_count, self.watertight_meshes);
        println!("║ Vertices:        {:>10}                              ║", self.vertex_count);
        println!("║ Triangles:       {:>10}                              ║", self.triangle_count);
        println!("║ Volume:          {:>10.4}                              ║", self.volume);
        println!("║ Surface Area:    {:>10.4}                              ║", self.surface_area);
        println!("║ Planar Area:     {:>10.4}                              ║", self.area_2d);
        if let Some(b) = self.bbox {
            println!("║                                                          ║");
            println!("║ Bounding Box:                                            ║");
            println!("║   Min: ({:>7.2}, {:>7.2}, {:>7.2})                      ║", b[0], b[1], b[2]);
            println!("║   Max: ({:>7.2}, {:>7.2}, {:>7.2})                      ║", b[3], b[4], b[5]);
        }
        println!("╚══════════════════════════════════════════════════════════╝");
    }
}

/// Walk a tree and collect statistics
pub fn analyze(root: &Node) -> SceneStats {
    let mut stats = SceneStats::default();
    root.walk(&mut |node, depth| {
        stats.node_count += 1;
        stats.max_depth = stats.max_depth.max(depth);
        match node {
            Node::D2(n) => {
                stats.node2_count += 1;
                stats.area_2d += n.geom.area();
            }
            Node::D3(n) => {
                stats.node3_count += 1;
                if let Some(mesh) = n.mesh.as_ref().filter(|m| !m.is_empty()) {
                    stats.mesh_count += 1;
                    stats.vertex_count += mesh.vertex_count();
                    stats.triangle_count += mesh.triangle_count();
                    stats.volume += mesh.volume();
                    stats.surface_area += mesh.area();
                    if is_closed(mesh) {
                        stats.watertight_meshes += 1;
                    }
                }
            }
            Node::Instance(_) => stats.instance_count += 1,
        }
    });
    stats.bbox = root.bounds().map(|b| [b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z]);
    tracing::debug!(nodes = stats.node_count, triangles = stats.triangle_count, "Analyzed scene {}", root.label());
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;

    #[test]
    fn test_analyze_mixed_tree() {
        let mut root = Node::group3("Scene");
        root.append(shapes::rect([[0.0, 0.0], [4.0, 7.0]]).extrude(3.0).unwrap());
        root.append(shapes::rect([[0.0, 0.0], [2.0, 2.0]]));
        let stats = analyze(&root);

        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.node3_count, 2);
        assert_eq!(stats.node2_count, 1);
        assert_eq!(stats.mesh_count, 1);
        assert_eq!(stats.triangle_count, 12);
        assert_eq!(stats.watertight_meshes, 1);
        assert!((stats.volume - 84.0).abs() < 1e-9);
        assert!((stats.area_2d - 4.0).abs() < 1e-12);
        assert_eq!(stats.max_depth, 1);
        assert_eq!(stats.bbox, Some([0.0, 0.0, 0.0, 4.0, 7.0, 3.0]));
    }

    #[test]
    fn test_analyze_empty_group() {
        let stats = analyze(&Node::group2("Empty"));
        assert_eq!(stats.node_count, 1);
        assert!(stats.bbox.is_none());
    }
}
