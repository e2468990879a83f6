// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

use crate::geometry::{Mesh, Triangle, Vertex};
use crate::utils::math::triangle_normal_raw;
use ahash::AHashMap;
use nalgebra::Vector3;

/// Vertex normals shared across faces whose normals are within `angle`
/// radians of each other. Corners on sharper edges get their own vertex.
/// Degenerate faces are dropped.
pub fn smooth(mesh: &Mesh, angle: f64) -> Mesh {
    let mut welded = mesh.clone();
    welded.merge_vertices();

    let raw: Vec<Vector3<f64>> = (0..welded.triangle_count())
        .map(|i| {
            let [a, b, c] = welded.triangle_positions(i);
            triangle_normal_raw(&a, &b, &c)
        })
        .collect();
    let unit: Vec<Option<Vector3<f64>>> = raw
        .iter()
        .map(|n| (n.norm() > 1e-12).then(|| n.normalize()))
        .collect();

    let mut incident: Vec<Vec<usize>> = vec![Vec::new(); welded.vertex_count()];
    for (f, t) in welded.triangles.iter().enumerate() {
        if unit[f].is_some() {
            for &v in &t.indices {
                incident[v].push(f);
            }
        }
    }

    let cos_limit = angle.cos();
    let mut out = Mesh::with_capacity(welded.vertex_count(), welded.triangle_count());
    let mut corners: AHashMap<(usize, [u64; 3]), usize> = AHashMap::new();
    for (f, t) in welded.triangles.iter().enumerate() {
        let Some(nf) = unit[f] else {
            continue;
        };
        let mut indices = [0usize; 3];
        for (k, &v) in t.indices.iter().enumerate() {
            let sum: Vector3<f64> = incident[v]
                .iter()
                .filter(|&&g| unit[g].is_some_and(|ng| ng.dot(&nf) >= cos_limit - 1e-12))
                .map(|&g| raw[g])
                .sum();
            let normal = if sum.norm() > 1e-12 { sum.normalize() } else { nf };
            let key = (v, [normal.x.to_bits(), normal.y.to_bits(), normal.z.to_bits()]);
            indices[k] = *corners.entry(key).or_insert_with(|| {
                let source = welded.vertices[v];
                out.add_vertex(Vertex {
                    normal,
                    ..source
                })
            });
        }
        out.add_triangle(Triangle::new(indices));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;
    use std::f64::consts::PI;

    fn cube() -> Mesh {
        Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh()
    }

    #[test]
    fn test_sharp_cube_splits_corners() {
        let sharp = smooth(&cube(), 0.1);
        assert_eq!(sharp.triangle_count(), 12);
        assert_eq!(sharp.vertex_count(), 24);
        let top = sharp
            .vertices
            .iter()
            .filter(|v| (v.normal - Vector3::z()).norm() < 1e-9)
            .count();
        assert_eq!(top, 4);
    }

    #[test]
    fn test_wide_angle_shares_everything() {
        let soft = smooth(&cube(), PI);
        assert_eq!(soft.vertex_count(), 8);
        assert!((soft.volume() - 1.0).abs() < 1e-9);
    }
}
