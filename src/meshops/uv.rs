// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Texture coordinate mapping
//!
//! Every mapping is a pure function of a vertex position and normal, applied
//! to the node and its descendants of the same dimension. Planar nodes store
//! one coordinate per geometry vertex; mesh nodes store them on vertices.

use crate::geometry::path::closest_segment;
use crate::geometry::shape2::to_point2;
use crate::geometry::{BoundingBox, Mesh, Triangle};
use crate::node::{Node, Node2, Node3, SceneNode, Transform};
use crate::utils::math::cross2;
use nalgebra::{Matrix3, Point2, Point3, Vector3};
use std::f64::consts::{PI, TAU};
use tracing::warn;

/// Vertex seen by a mapping function
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvSample {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
}

/// Nodes that can carry texture coordinates
pub trait UvMap: Sized {
    /// Copy with coordinates computed by `f`. With `split`, mesh faces get
    /// their own vertices and their face normal.
    fn map_uv(&self, split: bool, f: &dyn Fn(&UvSample) -> [f64; 2]) -> Self;

    /// Bounds of the subtree in the node's own frame
    fn local_bounds(&self) -> Option<BoundingBox>;
}

impl UvMap for Node2 {
    fn map_uv(&self, _split: bool, f: &dyn Fn(&UvSample) -> [f64; 2]) -> Self {
        let mut out = self.copy();
        apply_2d(&mut out, f);
        out
    }

    fn local_bounds(&self) -> Option<BoundingBox> {
        self.bounds()
    }
}

fn apply_2d(node: &mut Node2, f: &dyn Fn(&UvSample) -> [f64; 2]) {
    let uv: Vec<[f64; 2]> = node
        .geom
        .coords()
        .into_iter()
        .map(|c| {
            f(&UvSample {
                position: Point3::new(c[0], c[1], 0.0),
                normal: Vector3::z(),
            })
        })
        .collect();
    node.uv = (!uv.is_empty()).then_some(uv);
    for child in node.children_mut() {
        if let Node::D2(c) = child {
            apply_2d(c, f);
        }
    }
}

impl UvMap for Node3 {
    fn map_uv(&self, split: bool, f: &dyn Fn(&UvSample) -> [f64; 2]) -> Self {
        let mut out = self.copy();
        apply_3d(&mut out, split, f);
        out
    }

    fn local_bounds(&self) -> Option<BoundingBox> {
        let mut local = self.clone();
        local.transform = Transform::identity();
        local.bounds()
    }
}

fn apply_3d(node: &mut Node3, split: bool, f: &dyn Fn(&UvSample) -> [f64; 2]) {
    if let Some(mesh) = &node.mesh {
        node.mesh = Some(map_mesh(mesh, split, f));
    }
    for child in node.children_mut() {
        if let Node::D3(c) = child {
            apply_3d(c, split, f);
        }
    }
}

/// Texture coordinates for one mesh
pub fn map_mesh(mesh: &Mesh, split: bool, f: &dyn Fn(&UvSample) -> [f64; 2]) -> Mesh {
    if split {
        let mut out = Mesh::with_capacity(mesh.triangle_count() * 3, mesh.triangle_count());
        for (i, t) in mesh.triangles.iter().enumerate() {
            let normal = mesh.face_normal(i).unwrap_or_else(Vector3::z);
            let base = out.vertex_count();
            for &index in &t.indices {
                let mut v = mesh.vertices[index];
                v.uv = Some(f(&UvSample {
                    position: v.position,
                    normal,
                }));
                out.add_vertex(v);
            }
            out.add_triangle(Triangle::new([base, base + 1, base + 2]));
        }
        out.merge_vertices();
        return out;
    }

    let mut out = mesh.clone();
    if out.vertices.iter().any(|v| v.normal.norm() == 0.0) {
        out.recompute_normals();
    }
    for v in &mut out.vertices {
        v.uv = Some(f(&UvSample {
            position: v.position,
            normal: v.normal,
        }));
    }
    out
}

/// Project on the plane facing the dominant axis of the normal
pub fn map_cubic<N: UvMap>(obj: &N, scale: f64, split: bool) -> N {
    obj.map_uv(split, &|s: &UvSample| {
        let n = s.normal.abs();
        let p = s.position;
        let uv = if n.x >= n.y && n.x >= n.z {
            [p.y, p.z]
        } else if n.y >= n.z {
            [p.x, p.z]
        } else {
            [p.x, p.y]
        };
        [uv[0] * scale, uv[1] * scale]
    })
}

/// Angle around the vertical axis through the bounds centre, and height
/// above the bottom of the bounds
pub fn map_cylindrical<N: UvMap>(obj: &N, scale: f64) -> N {
    let Some(bounds) = obj.local_bounds() else {
        return obj.map_uv(false, &|_| [0.0, 0.0]);
    };
    let center = bounds.center();
    obj.map_uv(false, &|s: &UvSample| {
        let d = s.position - center;
        let u = d.y.atan2(d.x) / TAU + 0.5;
        [u, (s.position.z - bounds.min.z) * scale]
    })
}

/// Longitude and latitude around the bounds centre, both in [0, 1]
pub fn map_spherical<N: UvMap>(obj: &N) -> N {
    let center = obj.local_bounds().map_or(Point3::origin(), |b| b.center());
    obj.map_uv(false, &|s: &UvSample| {
        let d = s.position - center;
        let r = d.norm();
        if r == 0.0 {
            return [0.5, 0.5];
        }
        let u = d.y.atan2(d.x) / TAU + 0.5;
        let v = (d.z / r).clamp(-1.0, 1.0).asin() / PI + 0.5;
        [u, v]
    })
}

/// Coordinates along a path: `u` is the signed distance to the path (left
/// positive) plus `x_offset`, `v` the distance along it plus `d_offset`
pub fn map_2d_path<N: UvMap>(obj: &N, path: &Node2, x_offset: f64, d_offset: f64) -> N {
    let points: Vec<Point2<f64>> = path
        .geom
        .paths()
        .first()
        .map(|l| l.0.iter().map(|c| to_point2(*c)).collect())
        .unwrap_or_default();
    if points.len() < 2 {
        warn!(path = %path.label(), "Path mapping needs a line, coordinates set to the offsets");
    }
    obj.map_uv(false, &|s: &UvSample| {
        let p = Point2::new(s.position.x, s.position.y);
        match closest_segment(&points, &p) {
            Some(proj) => {
                let side = if cross2(&proj.a, &proj.b, &p) < 0.0 { -1.0 } else { 1.0 };
                [side * proj.distance + x_offset, proj.offset + d_offset]
            }
            None => [x_offset, d_offset],
        }
    })
}

/// Affine map from planar positions to texture coordinates, fitted by least
/// squares on the samples; `None` when the samples are colinear
fn fit_affine(samples: &[([f64; 2], [f64; 2])]) -> Option<Matrix3<f64>> {
    let mut m = Matrix3::zeros();
    let mut bu = Vector3::zeros();
    let mut bv = Vector3::zeros();
    for (p, uv) in samples {
        let row = Vector3::new(p[0], p[1], 1.0);
        m += row * row.transpose();
        bu += row * uv[0];
        bv += row * uv[1];
    }
    let inv = m.try_inverse()?;
    let (cu, cv) = (inv * bu, inv * bv);
    Some(Matrix3::new(cu.x, cu.y, cu.z, cv.x, cv.y, cv.z, 0.0, 0.0, 1.0))
}

/// Carry the coordinates of a planar node over to a mesh, by XY position.
/// Planar nodes without coordinates use their positions as coordinates.
pub fn map_3d_from_2d(obj3: &Node3, obj2: &Node2) -> Node3 {
    let samples: Vec<([f64; 2], [f64; 2])> = obj2
        .planar_nodes()
        .into_iter()
        .flat_map(|n| {
            let coords = n.geom.coords();
            let uv = n.uv.clone().filter(|uv| uv.len() == coords.len()).unwrap_or_else(|| coords.clone());
            coords.into_iter().zip(uv)
        })
        .collect();
    if samples.is_empty() {
        warn!(node = %obj2.label(), "No planar coordinates to map from");
        return obj3.copy();
    }

    match fit_affine(&samples) {
        Some(affine) => obj3.map_uv(false, &|s: &UvSample| {
            let uv = affine * Vector3::new(s.position.x, s.position.y, 1.0);
            [uv.x, uv.y]
        }),
        None => obj3.map_uv(false, &|s: &UvSample| {
            samples
                .iter()
                .min_by(|a, b| {
                    let da = (a.0[0] - s.position.x).powi(2) + (a.0[1] - s.position.y).powi(2);
                    let db = (b.0[0] - s.position.x).powi(2) + (b.0[1] - s.position.y).powi(2);
                    da.total_cmp(&db)
                })
                .map_or([0.0, 0.0], |(_, uv)| *uv)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;

    fn uvs(node: &Node3) -> Vec<[f64; 2]> {
        node.mesh.as_ref().unwrap().vertices.iter().filter_map(|v| v.uv).collect()
    }

    fn in_unit_range(uv: &[f64; 2]) -> bool {
        uv.iter().all(|c| (-1e-9..=1.0 + 1e-9).contains(c))
    }

    #[test]
    fn test_cubic_split_faces() {
        let cube = shapes::cuboid([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let mapped = map_cubic(&cube, 1.0, true);
        let mesh = mapped.mesh.as_ref().unwrap();
        assert!(mesh.has_uvs());
        assert_eq!(mesh.triangle_count(), 12);
        assert!(uvs(&mapped).iter().all(in_unit_range));
        assert!(cube.mesh.as_ref().unwrap().vertices.iter().all(|v| v.uv.is_none()));
    }

    #[test]
    fn test_planar_to_mesh_round_trip() {
        let footprint = shapes::rect([[0.0, 0.0], [1.0, 1.0]]);
        let solid = map_cubic(&footprint.extrude(3.0).unwrap(), 1.0, false);
        let planar = map_cubic(&footprint, 1.0, false);
        assert_eq!(planar.uv.as_ref().unwrap().len(), 5);
        let mapped = map_3d_from_2d(&solid, &planar);
        let all = uvs(&mapped);
        assert_eq!(all.len(), mapped.mesh.as_ref().unwrap().vertex_count());
        assert!(all.iter().all(in_unit_range));
    }

    #[test]
    fn test_spherical_and_cylindrical_ranges() {
        let sphere = map_spherical(&shapes::sphere(2.0, 16));
        assert!(uvs(&sphere).iter().all(in_unit_range));
        let cylinder = map_cylindrical(&shapes::cylinder(1.0, 1.0, 12), 1.0);
        assert!(uvs(&cylinder).iter().all(in_unit_range));
    }

    #[test]
    fn test_path_mapping() {
        let road = shapes::rect([[0.0, -1.0], [10.0, 1.0]]);
        let axis = shapes::line(&[[0.0, 0.0], [10.0, 0.0]]).unwrap();
        let mapped = map_2d_path(&road, &axis, 0.5, 2.0);
        let uv = mapped.uv.unwrap();
        let coords = road.geom.coords();
        let i = coords.iter().position(|c| *c == [10.0, 1.0]).unwrap();
        assert_eq!(uv[i], [1.5, 12.0]);
        let j = coords.iter().position(|c| *c == [0.0, -1.0]).unwrap();
        assert_eq!(uv[j], [-0.5, 2.0]);
    }
}
