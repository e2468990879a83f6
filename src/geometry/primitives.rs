// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh primitive generators
//!
//! All primitives are closed, share vertices between faces and wind
//! counter-clockwise seen from outside. Z is up.

use super::{Mesh, Triangle, Vertex};
use nalgebra::{Point3, Vector3};
use std::f64::consts::PI;

/// Mesh primitives
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Cube { size: Vector3<f64>, center: bool },
    Sphere { r: f64, segments: u32 },
    Cylinder { h: f64, r: f64, segments: u32 },
    Cone { h: f64, r1: f64, r2: f64, segments: u32 },
}

fn segments_or_default(segments: u32) -> u32 {
    if segments >= 3 {
        segments
    } else {
        32
    }
}

impl Primitive {
    pub fn cube(size: Vector3<f64>, center: bool) -> Self {
        Self::Cube { size, center }
    }

    pub fn sphere(r: f64, segments: u32) -> Self {
        Self::Sphere {
            r,
            segments: segments_or_default(segments),
        }
    }

    pub fn cylinder(h: f64, r: f64, segments: u32) -> Self {
        Self::Cylinder {
            h,
            r,
            segments: segments_or_default(segments),
        }
    }

    /// Frustum from radius `r1` at z=0 to `r2` at z=h; `r2 == 0` gives a single apex vertex
    pub fn cone(h: f64, r1: f64, r2: f64, segments: u32) -> Self {
        Self::Cone {
            h,
            r1,
            r2,
            segments: segments_or_default(segments),
        }
    }

    pub fn to_mesh(&self) -> Mesh {
        match self {
            Self::Cube { size, center } => generate_cube_mesh(*size, *center),
            Self::Sphere { r, segments } => generate_sphere_mesh(*r, *segments),
            Self::Cylinder { h, r, segments } => generate_cone_mesh(*h, *r, *r, *segments),
            Self::Cone { h, r1, r2, segments } => generate_cone_mesh(*h, *r1, *r2, *segments),
        }
    }
}

fn generate_cube_mesh(size: Vector3<f64>, center: bool) -> Mesh {
    let min = if center { -size / 2.0 } else { Vector3::zeros() };
    let max = min + size;

    let positions = [
        Point3::new(min.x, min.y, min.z),
        Point3::new(max.x, min.y, min.z),
        Point3::new(max.x, max.y, min.z),
        Point3::new(min.x, max.y, min.z),
        Point3::new(min.x, min.y, max.z),
        Point3::new(max.x, min.y, max.z),
        Point3::new(max.x, max.y, max.z),
        Point3::new(min.x, max.y, max.z),
    ];

    let faces = [
        // Bottom (z-)
        [0, 2, 1],
        [0, 3, 2],
        // Top (z+)
        [4, 5, 6],
        [4, 6, 7],
        // Front (y-)
        [0, 1, 5],
        [0, 5, 4],
        // Right (x+)
        [1, 2, 6],
        [1, 6, 5],
        // Back (y+)
        [2, 3, 7],
        [2, 7, 6],
        // Left (x-)
        [3, 0, 4],
        [3, 4, 7],
    ];

    Mesh::from_raw(&positions, &faces)
}

fn generate_sphere_mesh(radius: f64, segments: u32) -> Mesh {
    let slices = segments as usize;
    let stacks = (segments as usize / 2).max(2);
    let mut mesh = Mesh::with_capacity(2 + (stacks - 1) * slices, 2 * slices * (stacks - 1));

    let north = mesh.add_vertex(Vertex::new(
        Point3::new(0.0, 0.0, radius),
        Vector3::new(0.0, 0.0, 1.0),
    ));

    let mut rings: Vec<Vec<usize>> = Vec::with_capacity(stacks - 1);
    for i in 1..stacks {
        let phi = PI * i as f64 / stacks as f64;
        let z = radius * phi.cos();
        let r = radius * phi.sin();
        let ring = (0..slices)
            .map(|j| {
                let theta = 2.0 * PI * j as f64 / slices as f64;
                let position = Point3::new(r * theta.cos(), r * theta.sin(), z);
                let normal = position.coords.normalize();
                mesh.add_vertex(Vertex::new(position, normal))
            })
            .collect();
        rings.push(ring);
    }

    let south = mesh.add_vertex(Vertex::new(
        Point3::new(0.0, 0.0, -radius),
        Vector3::new(0.0, 0.0, -1.0),
    ));

    for j in 0..slices {
        let next = (j + 1) % slices;
        mesh.add_triangle(Triangle::new([north, rings[0][j], rings[0][next]]));
    }
    for k in 0..rings.len() - 1 {
        let (upper, lower) = (&rings[k], &rings[k + 1]);
        for j in 0..slices {
            let next = (j + 1) % slices;
            mesh.add_triangle(Triangle::new([upper[j], lower[j], lower[next]]));
            mesh.add_triangle(Triangle::new([upper[j], lower[next], upper[next]]));
        }
    }
    let last = &rings[rings.len() - 1];
    for j in 0..slices {
        let next = (j + 1) % slices;
        mesh.add_triangle(Triangle::new([south, last[next], last[j]]));
    }

    mesh
}

fn generate_cone_mesh(height: f64, r1: f64, r2: f64, segments: u32) -> Mesh {
    let n = segments as usize;
    let mut mesh = Mesh::new();

    let ring = |mesh: &mut Mesh, r: f64, z: f64| -> Vec<usize> {
        (0..n)
            .map(|i| {
                let angle = 2.0 * PI * i as f64 / n as f64;
                mesh.add_vertex(Vertex::at(Point3::new(r * angle.cos(), r * angle.sin(), z)))
            })
            .collect()
    };

    let bottom_center = mesh.add_vertex(Vertex::at(Point3::new(0.0, 0.0, 0.0)));
    let bottom = ring(&mut mesh, r1, 0.0);

    for i in 0..n {
        let next = (i + 1) % n;
        mesh.add_triangle(Triangle::new([bottom_center, bottom[next], bottom[i]]));
    }

    if r2 <= 0.0 {
        let apex = mesh.add_vertex(Vertex::at(Point3::new(0.0, 0.0, height)));
        for i in 0..n {
            let next = (i + 1) % n;
            mesh.add_triangle(Triangle::new([bottom[i], bottom[next], apex]));
        }
    } else {
        let top_center = mesh.add_vertex(Vertex::at(Point3::new(0.0, 0.0, height)));
        let top = ring(&mut mesh, r2, height);
        for i in 0..n {
            let next = (i + 1) % n;
            mesh.add_triangle(Triangle::new([top_center, top[i], top[next]]));
            mesh.add_triangle(Triangle::new([bottom[i], bottom[next], top[next]]));
            mesh.add_triangle(Triangle::new([bottom[i], top[next], top[i]]));
        }
    }

    mesh.recompute_normals();
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::mesh_utils::{is_closed, is_manifold};

    #[test]
    fn test_cube_shares_vertices() {
        let mesh = generate_cube_mesh(Vector3::new(10.0, 10.0, 10.0), false);
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(is_closed(&mesh));
        assert!((mesh.volume() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_cylinder_counts_and_volume() {
        let mesh = generate_cone_mesh(10.0, 5.0, 5.0, 16);
        assert!(is_manifold(&mesh));
        assert!(is_closed(&mesh));
        assert_eq!(mesh.vertex_count(), 2 + 16 * 2);
        assert_eq!(mesh.triangle_count(), 16 * 4);
        // Inscribed 16-gon prism
        let polygon_area = 0.5 * 16.0 * 25.0 * (2.0 * PI / 16.0).sin();
        assert!((mesh.volume() - polygon_area * 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_cone_with_apex() {
        let mesh = generate_cone_mesh(3.0, 1.0, 0.0, 8);
        assert!(is_closed(&mesh));
        assert_eq!(mesh.vertex_count(), 1 + 8 + 1);
        assert!(mesh.volume() > 0.0);
    }

    #[test]
    fn test_sphere_is_closed_and_outward() {
        let mesh = generate_sphere_mesh(2.0, 16);
        assert!(is_closed(&mesh));
        assert_eq!(mesh.vertex_count(), 2 + 7 * 16);
        let exact = 4.0 / 3.0 * PI * 8.0;
        let volume = mesh.volume();
        assert!(volume > 0.8 * exact && volume < exact);
    }
}
