// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh validation utilities

use super::{Mesh, Triangle};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

/// Undirected edge between two vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Edge {
    pub v0: usize,
    pub v1: usize,
}

impl Edge {
    pub fn new(v0: usize, v1: usize) -> Self {
        // Smaller index first for consistent hashing
        if v0 < v1 {
            Self { v0, v1 }
        } else {
            Self { v0: v1, v1: v0 }
        }
    }
}

pub fn triangle_edges(triangle: &Triangle) -> [Edge; 3] {
    let [a, b, c] = triangle.indices;
    [Edge::new(a, b), Edge::new(b, c), Edge::new(c, a)]
}

/// Number of faces sharing each edge
pub fn build_edge_counts(mesh: &Mesh) -> AHashMap<Edge, u32> {
    let mut edge_counts: AHashMap<Edge, u32> = AHashMap::new();
    for triangle in &mesh.triangles {
        for edge in triangle_edges(triangle) {
            *edge_counts.entry(edge).or_insert(0) += 1;
        }
    }
    edge_counts
}

/// Faces adjacent to each edge
pub fn build_edge_faces(mesh: &Mesh) -> AHashMap<Edge, Vec<usize>> {
    let mut edge_faces: AHashMap<Edge, Vec<usize>> = AHashMap::new();
    for (i, triangle) in mesh.triangles.iter().enumerate() {
        for edge in triangle_edges(triangle) {
            edge_faces.entry(edge).or_default().push(i);
        }
    }
    edge_faces
}

/// Check if mesh is manifold (each edge shared by at most 2 triangles)
pub fn is_manifold(mesh: &Mesh) -> bool {
    build_edge_counts(mesh).values().all(|&count| count <= 2)
}

/// Check if mesh is closed (each edge shared by exactly 2 triangles)
pub fn is_closed(mesh: &Mesh) -> bool {
    !mesh.triangles.is_empty() && build_edge_counts(mesh).values().all(|&count| count == 2)
}

/// All boundary edges (edges used by exactly one triangle)
pub fn find_boundary_edges(mesh: &Mesh) -> AHashSet<Edge> {
    build_edge_counts(mesh)
        .into_iter()
        .filter(|(_, count)| *count == 1)
        .map(|(edge, _)| edge)
        .collect()
}

/// Every face has positive area and valid indices
pub fn validate_winding_order(mesh: &Mesh) -> bool {
    let n = mesh.vertices.len();
    mesh.triangles.iter().all(|triangle| {
        if triangle.indices.iter().any(|&i| i >= n) {
            return false;
        }
        let v0 = &mesh.vertices[triangle.indices[0]].position;
        let v1 = &mesh.vertices[triangle.indices[1]].position;
        let v2 = &mesh.vertices[triangle.indices[2]].position;
        (v1 - v0).cross(&(v2 - v0)).norm() > 1e-10
    })
}

/// Mesh validation report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshValidation {
    pub is_manifold: bool,
    pub is_closed: bool,
    pub has_valid_winding: bool,
    pub edge_count: usize,
    pub boundary_edge_count: usize,
}

pub fn validate_mesh(mesh: &Mesh) -> MeshValidation {
    let edge_counts = build_edge_counts(mesh);
    let boundary_edges = edge_counts.values().filter(|&&count| count == 1).count();

    MeshValidation {
        is_manifold: edge_counts.values().all(|&count| count <= 2),
        is_closed: !edge_counts.is_empty() && edge_counts.values().all(|&count| count == 2),
        has_valid_winding: validate_winding_order(mesh),
        edge_count: edge_counts.len(),
        boundary_edge_count: boundary_edges,
    }
}
