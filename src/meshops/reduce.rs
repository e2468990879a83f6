// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Level-of-detail generation: convex hull, bounding box and quadric
//! decimation

use crate::geometry::{Mesh, Primitive, Triangle, Vertex};
use crate::node::{Node3, SceneNode, Transform};
use crate::utils::math::triangle_normal_raw;
use nalgebra::{Matrix4, Point3, Vector4};
use parry3d::transformation::try_convex_hull;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, warn};

/// Every mesh of the subtree in the node's own frame
fn local_mesh(obj: &Node3) -> Mesh {
    let mut local = obj.clone();
    local.transform = Transform::identity();
    local.combined_mesh()
}

fn lod_node(obj: &Node3, mesh: Mesh) -> Node3 {
    let mut out = obj.derived(Some(mesh));
    out.transform = obj.transform;
    out
}

/// Convex hull of the subtree as a single mesh
pub fn reduce(obj: &Node3) -> Node3 {
    let mesh = local_mesh(obj);
    let points: Vec<Point3<f32>> = mesh.vertices.iter().map(|v| v.position.cast::<f32>()).collect();
    let hull = match try_convex_hull(&points) {
        Ok((vertices, indices)) => {
            let positions: Vec<Point3<f64>> = vertices.iter().map(|p| p.cast::<f64>()).collect();
            let faces: Vec<[usize; 3]> = indices.iter().map(|f| f.map(|i| i as usize)).collect();
            let mut hull = Mesh::from_raw(&positions, &faces);
            if hull.volume() < 0.0 {
                hull.invert();
            }
            hull
        }
        Err(e) => {
            warn!(node = %obj.label(), error = ?e, "Convex hull failed, keeping mesh");
            mesh
        }
    };
    lod_node(obj, hull)
}

/// Axis-aligned box around the subtree
pub fn reduce_bounds(obj: &Node3) -> Node3 {
    let mesh = local_mesh(obj);
    if mesh.vertices.is_empty() {
        return lod_node(obj, mesh);
    }
    let bbox = mesh.bounding_box();
    let mut cube = Primitive::cube(bbox.size(), false).to_mesh();
    cube.translate(&bbox.min.coords);
    lod_node(obj, cube)
}

/// Subtree merged into one mesh and decimated toward `target_faces`
pub fn reduce_quadric_decimation(obj: &Node3, target_faces: usize) -> Node3 {
    let mesh = decimate(&local_mesh(obj), target_faces);
    lod_node(obj, mesh)
}

#[derive(Debug, PartialEq)]
struct Collapse {
    cost: f64,
    a: usize,
    b: usize,
    stamp: (u32, u32),
    target: Point3<f64>,
}

impl Eq for Collapse {}

impl Ord for Collapse {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost
        other.cost.total_cmp(&self.cost).then_with(|| (other.a, other.b).cmp(&(self.a, self.b)))
    }
}

impl PartialOrd for Collapse {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn plane_quadric(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Matrix4<f64> {
    let n = triangle_normal_raw(a, b, c);
    if n.norm() <= 1e-12 {
        return Matrix4::zeros();
    }
    let n = n.normalize();
    let p = Vector4::new(n.x, n.y, n.z, -n.dot(&a.coords));
    p * p.transpose()
}

fn quadric_error(q: &Matrix4<f64>, p: &Point3<f64>) -> f64 {
    let v = p.to_homogeneous();
    (v.transpose() * q * v)[(0, 0)]
}

struct Decimator {
    positions: Vec<Point3<f64>>,
    quadrics: Vec<Matrix4<f64>>,
    stamps: Vec<u32>,
    alive: Vec<bool>,
    faces: Vec<[usize; 3]>,
    face_alive: Vec<bool>,
    vertex_faces: Vec<Vec<usize>>,
    live_faces: usize,
}

impl Decimator {
    fn new(mesh: &Mesh) -> Self {
        let positions = mesh.positions();
        let faces: Vec<[usize; 3]> = mesh.triangles.iter().map(|t| t.indices).collect();
        let mut quadrics = vec![Matrix4::zeros(); positions.len()];
        let mut vertex_faces = vec![Vec::new(); positions.len()];
        for (f, [a, b, c]) in faces.iter().enumerate() {
            let q = plane_quadric(&positions[*a], &positions[*b], &positions[*c]);
            for &v in &[*a, *b, *c] {
                quadrics[v] += q;
                vertex_faces[v].push(f);
            }
        }
        Self {
            stamps: vec![0; positions.len()],
            alive: vec![true; positions.len()],
            face_alive: vec![true; faces.len()],
            live_faces: faces.len(),
            positions,
            quadrics,
            faces,
            vertex_faces,
        }
    }

    fn candidate(&self, a: usize, b: usize) -> Collapse {
        let q = self.quadrics[a] + self.quadrics[b];
        let (pa, pb) = (self.positions[a], self.positions[b]);
        let mid = Point3::from((pa.coords + pb.coords) * 0.5);
        let (cost, target) = [pa, pb, mid]
            .into_iter()
            .map(|p| (quadric_error(&q, &p), p))
            .min_by(|x, y| x.0.total_cmp(&y.0))
            .unwrap_or((0.0, mid));
        Collapse {
            cost,
            a,
            b,
            stamp: (self.stamps[a], self.stamps[b]),
            target,
        }
    }

    fn neighbours(&self, v: usize) -> Vec<usize> {
        let mut out: Vec<usize> = self.vertex_faces[v]
            .iter()
            .filter(|&&f| self.face_alive[f])
            .flat_map(|&f| self.faces[f])
            .filter(|&u| u != v)
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Moving `a` and `b` to `target` would turn a surviving face over
    fn flips(&self, a: usize, b: usize, target: &Point3<f64>) -> bool {
        [a, b].iter().any(|&v| {
            self.vertex_faces[v].iter().any(|&f| {
                if !self.face_alive[f] {
                    return false;
                }
                let face = self.faces[f];
                if face.contains(&a) && face.contains(&b) {
                    return false;
                }
                let before = face.map(|i| self.positions[i]);
                let after = face.map(|i| if i == v { *target } else { self.positions[i] });
                let n0 = triangle_normal_raw(&before[0], &before[1], &before[2]);
                let n1 = triangle_normal_raw(&after[0], &after[1], &after[2]);
                n0.dot(&n1) <= 0.0
            })
        })
    }

    fn collapse(&mut self, c: &Collapse) {
        let (a, b) = (c.a, c.b);
        self.positions[a] = c.target;
        self.quadrics[a] = self.quadrics[a] + self.quadrics[b];
        self.alive[b] = false;
        let moved = std::mem::take(&mut self.vertex_faces[b]);
        for f in moved {
            if !self.face_alive[f] {
                continue;
            }
            let face = &mut self.faces[f];
            for i in face.iter_mut() {
                if *i == b {
                    *i = a;
                }
            }
            if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
                self.face_alive[f] = false;
                self.live_faces -= 1;
            } else {
                self.vertex_faces[a].push(f);
            }
        }
        self.stamps[a] += 1;
        self.stamps[b] += 1;
    }

    fn into_mesh(self) -> Mesh {
        let faces: Vec<[usize; 3]> = self
            .faces
            .iter()
            .zip(&self.face_alive)
            .filter(|(_, alive)| **alive)
            .map(|(f, _)| *f)
            .collect();
        let mut mesh = Mesh::with_capacity(self.positions.len(), faces.len());
        for p in &self.positions {
            mesh.add_vertex(Vertex::at(*p));
        }
        for f in faces {
            mesh.add_triangle(Triangle::new(f));
        }
        mesh.remove_orphaned_vertices();
        mesh.recompute_normals();
        mesh
    }
}

/// Quadric error edge-collapse decimation. Collapses that would flip a face
/// are skipped, so the result may keep more faces than asked for.
pub fn decimate(mesh: &Mesh, target_faces: usize) -> Mesh {
    let mut welded = mesh.clone();
    for v in &mut welded.vertices {
        v.uv = None;
    }
    welded.clean();
    if welded.triangle_count() <= target_faces {
        return welded;
    }

    let mut d = Decimator::new(&welded);
    let mut heap = BinaryHeap::new();
    for v in 0..d.positions.len() {
        for u in d.neighbours(v) {
            if v < u {
                heap.push(d.candidate(v, u));
            }
        }
    }

    while d.live_faces > target_faces {
        let Some(c) = heap.pop() else {
            break;
        };
        if !d.alive[c.a] || !d.alive[c.b] || c.stamp != (d.stamps[c.a], d.stamps[c.b]) {
            continue;
        }
        if d.flips(c.a, c.b, &c.target) {
            continue;
        }
        d.collapse(&c);
        for u in d.neighbours(c.a) {
            heap.push(d.candidate(c.a.min(u), c.a.max(u)));
        }
    }

    debug!(from = welded.triangle_count(), to = d.live_faces, "Mesh decimated");
    d.into_mesh()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;
    use nalgebra::Vector3;

    #[test]
    fn test_hull_of_two_boxes() {
        let mut group = Node3::group();
        group.append(shapes::cuboid([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]));
        group.append(shapes::cuboid([3.0, 0.0, 0.0], [4.0, 1.0, 1.0]));
        let hull = reduce(&group);
        assert!(hull.children().is_empty());
        assert!((hull.volume() - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_bounds_lod_keeps_transform() {
        let sphere = shapes::sphere(1.0, 16).translate([5.0, 0.0, 0.0]);
        let lod = reduce_bounds(&sphere);
        assert_eq!(lod.triangle_count(), 12);
        let bounds = lod.bounds().unwrap();
        assert!((bounds.min.x - 4.0).abs() < 1e-9);
        assert!((bounds.max.z - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_decimation_reaches_target() {
        let sphere = Primitive::sphere(1.0, 32).to_mesh();
        let original = sphere.volume();
        let reduced = decimate(&sphere, 100);
        assert!(reduced.triangle_count() <= 100);
        assert!(reduced.triangle_count() > 20);
        assert!(reduced.volume() > original * 0.5);

        let cube = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        assert_eq!(decimate(&cube, 50).triangle_count(), 12);
    }
}
