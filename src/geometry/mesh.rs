// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh representation and utilities

use super::BoundingBox;
use crate::utils::math::{triangle_area, triangle_normal, triangle_normal_raw};
use ahash::AHashMap;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Vertex with position, normal and optional texture coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv: Option<[f64; 2]>,
}

impl Vertex {
    pub fn new(position: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            position,
            normal,
            uv: None,
        }
    }

    pub fn at(position: Point3<f64>) -> Self {
        Self::new(position, Vector3::zeros())
    }

    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        self.position = matrix.transform_point(&self.position);
        // Normals use the inverse transpose
        let normal_matrix = matrix
            .try_inverse()
            .map(|m| m.transpose())
            .unwrap_or(*matrix);
        let n = normal_matrix.transform_vector(&self.normal);
        self.normal = if n.norm() > 0.0 { n.normalize() } else { n };
    }
}

/// Triangle defined by three vertex indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle {
    pub indices: [usize; 3],
}

impl Triangle {
    pub fn new(indices: [usize; 3]) -> Self {
        Self { indices }
    }

    pub fn flipped(&self) -> Self {
        Self::new([self.indices[0], self.indices[2], self.indices[1]])
    }

    pub fn is_degenerate(&self) -> bool {
        let [a, b, c] = self.indices;
        a == b || b == c || a == c
    }
}

/// Triangular mesh
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

impl Mesh {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::new()
    }

    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            triangles: Vec::with_capacity(triangle_count),
        }
    }

    /// Build a mesh from raw positions and faces
    pub fn from_raw(positions: &[Point3<f64>], faces: &[[usize; 3]]) -> Self {
        let mut mesh = Self::with_capacity(positions.len(), faces.len());
        for p in positions {
            mesh.add_vertex(Vertex::at(*p));
        }
        for f in faces {
            mesh.add_triangle(Triangle::new(*f));
        }
        mesh.recompute_normals();
        mesh
    }

    /// Add a vertex and return its index
    pub fn add_vertex(&mut self, vertex: Vertex) -> usize {
        let index = self.vertices.len();
        self.vertices.push(vertex);
        index
    }

    /// Add a triangle
    pub fn add_triangle(&mut self, triangle: Triangle) {
        self.triangles.push(triangle);
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Every face references existing vertices
    pub fn is_valid(&self) -> bool {
        let n = self.vertices.len();
        self.triangles
            .iter()
            .all(|t| t.indices.iter().all(|&i| i < n))
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    pub fn has_uvs(&self) -> bool {
        !self.vertices.is_empty() && self.vertices.iter().all(|v| v.uv.is_some())
    }

    /// Transform all vertices by a matrix
    pub fn transform(&mut self, matrix: &Matrix4<f64>) {
        for vertex in &mut self.vertices {
            vertex.transform(matrix);
        }
        // Mirroring transforms flip the winding
        if matrix.fixed_view::<3, 3>(0, 0).determinant() < 0.0 {
            self.invert();
        }
    }

    pub fn translate(&mut self, offset: &Vector3<f64>) {
        for vertex in &mut self.vertices {
            vertex.position += offset;
        }
    }

    /// Flip the winding of every face
    pub fn invert(&mut self) {
        for triangle in &mut self.triangles {
            *triangle = triangle.flipped();
        }
        for vertex in &mut self.vertices {
            vertex.normal = -vertex.normal;
        }
    }

    /// Compute bounding box
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_vertices(&self.vertices)
    }

    /// Get vertex count
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Get triangle count
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle_positions(&self, index: usize) -> [Point3<f64>; 3] {
        let t = &self.triangles[index];
        [
            self.vertices[t.indices[0]].position,
            self.vertices[t.indices[1]].position,
            self.vertices[t.indices[2]].position,
        ]
    }

    /// Unit normal of a face, `None` for degenerate faces
    pub fn face_normal(&self, index: usize) -> Option<Vector3<f64>> {
        let [a, b, c] = self.triangle_positions(index);
        triangle_normal(&a, &b, &c)
    }

    pub fn face_normals(&self) -> Vec<Option<Vector3<f64>>> {
        (0..self.triangles.len()).map(|i| self.face_normal(i)).collect()
    }

    /// Signed volume; positive for closed meshes with outward normals
    pub fn volume(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let a = self.vertices[t.indices[0]].position.coords;
                let b = self.vertices[t.indices[1]].position.coords;
                let c = self.vertices[t.indices[2]].position.coords;
                a.dot(&b.cross(&c)) / 6.0
            })
            .sum()
    }

    /// Total surface area
    pub fn area(&self) -> f64 {
        (0..self.triangles.len())
            .map(|i| {
                let [a, b, c] = self.triangle_positions(i);
                triangle_area(&a, &b, &c)
            })
            .sum()
    }

    /// Merge with another mesh (simple concatenation without CSG)
    pub fn merge(&mut self, other: &Mesh) {
        let offset = self.vertices.len();
        self.vertices.extend_from_slice(&other.vertices);

        for triangle in &other.triangles {
            self.triangles.push(Triangle::new([
                triangle.indices[0] + offset,
                triangle.indices[1] + offset,
                triangle.indices[2] + offset,
            ]));
        }
    }

    /// Weld vertices that are within epsilon distance of each other.
    /// Vertices with different UVs are kept apart.
    /// Returns the number of vertices removed.
    pub fn weld_vertices(&mut self, epsilon: f64) -> usize {
        if self.vertices.is_empty() {
            return 0;
        }

        let original_count = self.vertices.len();
        let cell = epsilon.max(1e-12);
        let key = |p: &Point3<f64>| {
            (
                (p.x / cell).round() as i64,
                (p.y / cell).round() as i64,
                (p.z / cell).round() as i64,
            )
        };

        let mut grid: AHashMap<(i64, i64, i64), Vec<usize>> = AHashMap::new();
        let mut new_vertices: Vec<Vertex> = Vec::with_capacity(original_count);
        let mut new_indices: Vec<usize> = vec![0; original_count];

        for (i, vertex) in self.vertices.iter().enumerate() {
            let (kx, ky, kz) = key(&vertex.position);
            let mut found = None;
            'search: for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        if let Some(bucket) = grid.get(&(kx + dx, ky + dy, kz + dz)) {
                            for &j in bucket {
                                let other = &new_vertices[j];
                                if (other.position - vertex.position).norm() <= epsilon
                                    && other.uv == vertex.uv
                                {
                                    found = Some(j);
                                    break 'search;
                                }
                            }
                        }
                    }
                }
            }

            new_indices[i] = match found {
                Some(j) => j,
                None => {
                    let j = new_vertices.len();
                    new_vertices.push(*vertex);
                    grid.entry((kx, ky, kz)).or_default().push(j);
                    j
                }
            };
        }

        for triangle in &mut self.triangles {
            for index in &mut triangle.indices {
                *index = new_indices[*index];
            }
        }

        self.vertices = new_vertices;
        original_count - self.vertices.len()
    }

    /// Weld exactly coincident vertices
    pub fn merge_vertices(&mut self) -> usize {
        self.weld_vertices(1e-9)
    }

    /// Remove duplicate triangles (same vertex set in the same cyclic order)
    /// and degenerate triangles. Returns the number of triangles removed.
    pub fn remove_duplicate_triangles(&mut self) -> usize {
        use std::collections::HashSet;

        let original_count = self.triangles.len();
        let mut seen: HashSet<[usize; 3]> = HashSet::new();
        let vertex_count = self.vertices.len();

        self.triangles.retain(|triangle| {
            if triangle.is_degenerate() || triangle.indices.iter().any(|&i| i >= vertex_count) {
                return false;
            }
            // Rotate so the smallest index leads; keeps winding
            let [a, b, c] = triangle.indices;
            let key = if a <= b && a <= c {
                [a, b, c]
            } else if b <= a && b <= c {
                [b, c, a]
            } else {
                [c, a, b]
            };
            seen.insert(key)
        });

        original_count - self.triangles.len()
    }

    /// Remove triangles whose area is below `min_area`
    pub fn remove_zero_area_triangles(&mut self, min_area: f64) -> usize {
        let before = self.triangles.len();
        let vertices = &self.vertices;
        self.triangles.retain(|t| {
            let a = vertices[t.indices[0]].position;
            let b = vertices[t.indices[1]].position;
            let c = vertices[t.indices[2]].position;
            triangle_normal_raw(&a, &b, &c).norm() * 0.5 > min_area
        });
        before - self.triangles.len()
    }

    /// Remove orphaned vertices (vertices not referenced by any triangle).
    /// Returns the number of vertices removed.
    pub fn remove_orphaned_vertices(&mut self) -> usize {
        if self.triangles.is_empty() {
            let removed = self.vertices.len();
            self.vertices.clear();
            return removed;
        }

        let mut used_vertices = vec![false; self.vertices.len()];
        for triangle in &self.triangles {
            for &i in &triangle.indices {
                used_vertices[i] = true;
            }
        }

        let mut new_indices = vec![0; self.vertices.len()];
        let mut new_vertices = Vec::new();
        for (old_idx, &used) in used_vertices.iter().enumerate() {
            if used {
                new_indices[old_idx] = new_vertices.len();
                new_vertices.push(self.vertices[old_idx]);
            }
        }

        for triangle in &mut self.triangles {
            for index in &mut triangle.indices {
                *index = new_indices[*index];
            }
        }

        let removed = self.vertices.len() - new_vertices.len();
        self.vertices = new_vertices;
        removed
    }

    /// Merge vertices, drop degenerate, zero-area and duplicate faces, and
    /// drop unreferenced vertices
    pub fn clean(&mut self) {
        self.merge_vertices();
        self.remove_duplicate_triangles();
        self.remove_zero_area_triangles(1e-12);
        self.remove_orphaned_vertices();
    }

    /// Keep only the faces for which `keep` returns true
    pub fn retain_faces(&mut self, mut keep: impl FnMut(usize, &Triangle) -> bool) {
        let mut index = 0;
        self.triangles.retain(|t| {
            let k = keep(index, t);
            index += 1;
            k
        });
    }

    /// Recompute vertex normals from triangle geometry
    /// This calculates face normals and averages them at shared vertices
    pub fn recompute_normals(&mut self) {
        if self.vertices.is_empty() || self.triangles.is_empty() {
            return;
        }

        let mut normal_sums: Vec<Vector3<f64>> = vec![Vector3::zeros(); self.vertices.len()];

        for triangle in &self.triangles {
            let v0 = self.vertices[triangle.indices[0]].position;
            let v1 = self.vertices[triangle.indices[1]].position;
            let v2 = self.vertices[triangle.indices[2]].position;

            // Area weighted
            let face_normal = triangle_normal_raw(&v0, &v1, &v2);
            if face_normal.norm() > 1e-12 {
                for &idx in &triangle.indices {
                    normal_sums[idx] += face_normal;
                }
            }
        }

        for (vertex, sum) in self.vertices.iter_mut().zip(normal_sums) {
            vertex.normal = if sum.norm() > 1e-12 {
                sum.normalize()
            } else {
                Vector3::new(0.0, 0.0, 1.0)
            };
        }
    }
}
