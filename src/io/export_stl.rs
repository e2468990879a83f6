// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Binary STL of the flattened scene mesh

use crate::error::{DddError, Result};
use crate::geometry::{Mesh, Triangle, Vertex};
use crate::node::{Node, Node3};
use nalgebra::{Point3, Vector3};
use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::Path;
use stl_io::{Normal, Triangle as StlTriangle, Vertex as StlVertex};

/// Every mesh below `root` in the root's frame, instances expanded.
/// Planar nodes contribute nothing.
pub fn scene_mesh(root: &Node) -> Mesh {
    let mut out = Mesh::new();
    collect(root, &mut out);
    out
}

fn collect(node: &Node, out: &mut Mesh) {
    match node {
        Node::D3(n) => out.merge(&n.combined_mesh()),
        Node::Instance(i) => {
            if let Some(group) = i.expand() {
                out.merge(&group.combined_mesh());
            }
        }
        Node::D2(n) => {
            for child in &n.base.children {
                collect(child, out);
            }
        }
    }
}

fn to_stl_triangles(mesh: &Mesh) -> Vec<StlTriangle> {
    let vertex = |i: usize| {
        let p = mesh.vertices[i].position;
        StlVertex::new([p.x as f32, p.y as f32, p.z as f32])
    };
    mesh.triangles
        .iter()
        .enumerate()
        .map(|(index, tri)| {
            let n = mesh.face_normal(index).unwrap_or_else(Vector3::zeros);
            StlTriangle {
                normal: Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [vertex(tri.indices[0]), vertex(tri.indices[1]), vertex(tri.indices[2])],
            }
        })
        .collect()
}

pub fn to_stl_bytes(root: &Node) -> Result<Vec<u8>> {
    let mesh = scene_mesh(root);
    let mut buffer = Vec::new();
    stl_io::write_stl(&mut Cursor::new(&mut buffer), to_stl_triangles(&mesh).iter())
        .map_err(|e| DddError::Export(format!("STL export error: {e}")))?;
    Ok(buffer)
}

pub fn export(root: &Node, path: &Path) -> Result<()> {
    let mesh = scene_mesh(root);
    if mesh.is_empty() {
        return Err(DddError::Export(format!(
            "nothing to write to {}: the scene has no meshes",
            path.display()
        )));
    }
    let mut writer = BufWriter::new(File::create(path)?);
    stl_io::write_stl(&mut writer, to_stl_triangles(&mesh).iter())?;
    Ok(())
}

/// Load an STL file as a single mesh node with welded vertices
pub fn import(path: &Path) -> Result<Node3> {
    let mut file = File::open(path)?;
    let stl = stl_io::read_stl(&mut file)?;

    let mut mesh = Mesh::with_capacity(stl.vertices.len(), stl.faces.len());
    for v in &stl.vertices {
        mesh.add_vertex(Vertex::at(Point3::new(v[0] as f64, v[1] as f64, v[2] as f64)));
    }
    for face in &stl.faces {
        mesh.add_triangle(Triangle::new(face.vertices));
    }
    mesh.recompute_normals();
    Ok(Node3::new(mesh))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SceneNode;
    use crate::shapes;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    #[test]
    fn test_stl_round_trip() {
        let mut root = Node::group2("root");
        let mut solids = Node::group3("solids");
        solids.append(shapes::cuboid([0.0; 3], [1.0, 2.0, 3.0]));
        solids.append(shapes::cuboid([0.0; 3], [1.0; 3]).translate([5.0, 0.0, 0.0]));
        root.append(solids);
        root.append(shapes::rect([[0.0, 0.0], [9.0, 9.0]]));

        let dir = tempdir().unwrap();
        let path = dir.path().join("scene.stl");
        export(&root, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        // 80-byte header, triangle count, 50 bytes per triangle
        assert_eq!(bytes.len(), 84 + 24 * 50);
        assert_eq!(to_stl_bytes(&root).unwrap().len(), bytes.len());

        let loaded = import(&path).unwrap();
        assert_eq!(loaded.triangle_count(), 24);
        assert_relative_eq!(loaded.volume(), 7.0, epsilon = 1e-4);
        let bounds = Node::from(loaded).bounds().unwrap();
        assert_relative_eq!(bounds.max.x, 6.0, epsilon = 1e-6);
    }

    #[test]
    fn test_empty_scene_rejected() {
        let dir = tempdir().unwrap();
        let root = Node::group2("root").with_child(shapes::point([0.0, 0.0]));
        assert!(matches!(
            export(&root, &dir.path().join("empty.stl")),
            Err(DddError::Export(_))
        ));
    }
}
