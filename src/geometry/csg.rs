// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG (Constructive Solid Geometry) operations using BSP trees

use super::{Mesh, Triangle, Vertex};
use nalgebra::Vector3;

const EPSILON: f64 = 1e-7;

const COPLANAR: u8 = 0;
const FRONT: u8 = 1;
const BACK: u8 = 2;
const SPANNING: u8 = 3;

#[derive(Debug, Clone, Copy)]
struct Plane {
    normal: Vector3<f64>,
    w: f64,
}

#[derive(Debug, Clone)]
struct Polygon {
    vertices: Vec<Vertex>,
    plane: Plane,
}

/// BSP tree node for CSG operations
#[derive(Debug, Clone, Default)]
struct BspNode {
    plane: Option<Plane>,
    front: Option<Box<BspNode>>,
    back: Option<Box<BspNode>>,
    polygons: Vec<Polygon>,
}

impl Plane {
    fn from_vertices(vertices: &[Vertex]) -> Option<Self> {
        let (a, b, c) = (vertices[0].position, vertices[1].position, vertices[2].position);
        let n = (b - a).cross(&(c - a));
        let len = n.norm();
        if len < 1e-12 {
            return None;
        }
        let normal = n / len;
        Some(Self {
            normal,
            w: normal.dot(&a.coords),
        })
    }

    fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    /// Sort `polygon` into the four output lists, splitting it when it spans the plane
    fn split_polygon(
        &self,
        polygon: &Polygon,
        coplanar_front: &mut Vec<Polygon>,
        coplanar_back: &mut Vec<Polygon>,
        front: &mut Vec<Polygon>,
        back: &mut Vec<Polygon>,
    ) {
        let mut polygon_type = 0u8;
        let types: Vec<u8> = polygon
            .vertices
            .iter()
            .map(|v| {
                let t = self.normal.dot(&v.position.coords) - self.w;
                let ty = if t < -EPSILON {
                    BACK
                } else if t > EPSILON {
                    FRONT
                } else {
                    COPLANAR
                };
                polygon_type |= ty;
                ty
            })
            .collect();

        match polygon_type {
            COPLANAR => {
                if self.normal.dot(&polygon.plane.normal) > 0.0 {
                    coplanar_front.push(polygon.clone());
                } else {
                    coplanar_back.push(polygon.clone());
                }
            }
            FRONT => front.push(polygon.clone()),
            BACK => back.push(polygon.clone()),
            _ => {
                debug_assert_eq!(polygon_type, SPANNING);
                let mut f = Vec::new();
                let mut b = Vec::new();
                let n = polygon.vertices.len();
                for i in 0..n {
                    let j = (i + 1) % n;
                    let (ti, tj) = (types[i], types[j]);
                    let (vi, vj) = (polygon.vertices[i], polygon.vertices[j]);
                    if ti != BACK {
                        f.push(vi);
                    }
                    if ti != FRONT {
                        b.push(vi);
                    }
                    if (ti | tj) == SPANNING {
                        let t = (self.w - self.normal.dot(&vi.position.coords))
                            / self.normal.dot(&(vj.position - vi.position));
                        let v = interpolate(&vi, &vj, t);
                        f.push(v);
                        b.push(v);
                    }
                }
                if f.len() >= 3 {
                    front.push(Polygon {
                        vertices: f,
                        plane: polygon.plane,
                    });
                }
                if b.len() >= 3 {
                    back.push(Polygon {
                        vertices: b,
                        plane: polygon.plane,
                    });
                }
            }
        }
    }
}

fn interpolate(a: &Vertex, b: &Vertex, t: f64) -> Vertex {
    let uv = match (a.uv, b.uv) {
        (Some(ua), Some(ub)) => Some([ua[0] + (ub[0] - ua[0]) * t, ua[1] + (ub[1] - ua[1]) * t]),
        _ => None,
    };
    Vertex {
        position: a.position + (b.position - a.position) * t,
        normal: a.normal + (b.normal - a.normal) * t,
        uv,
    }
}

impl Polygon {
    fn flip(&mut self) {
        self.vertices.reverse();
        for v in &mut self.vertices {
            v.normal = -v.normal;
        }
        self.plane.flip();
    }
}

impl BspNode {
    fn new(polygons: Vec<Polygon>) -> Self {
        let mut node = Self::default();
        node.build(polygons);
        node
    }

    fn invert(&mut self) {
        for poly in &mut self.polygons {
            poly.flip();
        }
        if let Some(plane) = self.plane.as_mut() {
            plane.flip();
        }
        if let Some(front) = self.front.as_mut() {
            front.invert();
        }
        if let Some(back) = self.back.as_mut() {
            back.invert();
        }
        std::mem::swap(&mut self.front, &mut self.back);
    }

    /// Remove all polygons in `polygons` that are inside this tree
    fn clip_polygons(&self, polygons: Vec<Polygon>) -> Vec<Polygon> {
        let Some(plane) = self.plane else {
            return polygons;
        };
        let mut front = Vec::new();
        let mut back = Vec::new();
        for poly in &polygons {
            let (mut cf, mut cb) = (Vec::new(), Vec::new());
            plane.split_polygon(poly, &mut cf, &mut cb, &mut front, &mut back);
            front.append(&mut cf);
            back.append(&mut cb);
        }
        let mut front = match &self.front {
            Some(node) => node.clip_polygons(front),
            None => front,
        };
        let back = match &self.back {
            Some(node) => node.clip_polygons(back),
            None => Vec::new(),
        };
        front.extend(back);
        front
    }

    fn clip_to(&mut self, bsp: &BspNode) {
        self.polygons = bsp.clip_polygons(std::mem::take(&mut self.polygons));
        if let Some(front) = self.front.as_mut() {
            front.clip_to(bsp);
        }
        if let Some(back) = self.back.as_mut() {
            back.clip_to(bsp);
        }
    }

    fn all_polygons(&self) -> Vec<Polygon> {
        let mut result = self.polygons.clone();
        if let Some(front) = &self.front {
            result.extend(front.all_polygons());
        }
        if let Some(back) = &self.back {
            result.extend(back.all_polygons());
        }
        result
    }

    fn build(&mut self, polygons: Vec<Polygon>) {
        if polygons.is_empty() {
            return;
        }
        let plane = *self.plane.get_or_insert(polygons[0].plane);
        let mut front = Vec::new();
        let mut back = Vec::new();
        for poly in &polygons {
            let (mut cf, mut cb) = (Vec::new(), Vec::new());
            plane.split_polygon(poly, &mut cf, &mut cb, &mut front, &mut back);
            self.polygons.append(&mut cf);
            self.polygons.append(&mut cb);
        }
        if !front.is_empty() {
            self.front
                .get_or_insert_with(|| Box::new(BspNode::default()))
                .build(front);
        }
        if !back.is_empty() {
            self.back
                .get_or_insert_with(|| Box::new(BspNode::default()))
                .build(back);
        }
    }
}

fn mesh_to_polygons(mesh: &Mesh) -> Vec<Polygon> {
    mesh.triangles
        .iter()
        .filter_map(|tri| {
            let vertices = vec![
                mesh.vertices[tri.indices[0]],
                mesh.vertices[tri.indices[1]],
                mesh.vertices[tri.indices[2]],
            ];
            Plane::from_vertices(&vertices).map(|plane| Polygon { vertices, plane })
        })
        .collect()
}

fn polygons_to_mesh(polygons: &[Polygon]) -> Mesh {
    let mut mesh = Mesh::new();
    for poly in polygons {
        let base = mesh.vertices.len();
        for v in &poly.vertices {
            mesh.add_vertex(*v);
        }
        for i in 1..poly.vertices.len() - 1 {
            mesh.add_triangle(Triangle::new([base, base + i, base + i + 1]));
        }
    }
    mesh.clean();
    mesh.recompute_normals();
    mesh
}

/// Union of two closed meshes
pub fn csg_union(a: &Mesh, b: &Mesh) -> Mesh {
    if a.is_empty() {
        return b.clone();
    }
    if b.is_empty() {
        return a.clone();
    }
    let mut tree_a = BspNode::new(mesh_to_polygons(a));
    let mut tree_b = BspNode::new(mesh_to_polygons(b));
    tree_a.clip_to(&tree_b);
    tree_b.clip_to(&tree_a);
    tree_b.invert();
    tree_b.clip_to(&tree_a);
    tree_b.invert();
    tree_a.build(tree_b.all_polygons());
    polygons_to_mesh(&tree_a.all_polygons())
}

/// `a` minus `b`
pub fn csg_difference(a: &Mesh, b: &Mesh) -> Mesh {
    if a.is_empty() || b.is_empty() {
        return a.clone();
    }
    let mut tree_a = BspNode::new(mesh_to_polygons(a));
    let mut tree_b = BspNode::new(mesh_to_polygons(b));
    tree_a.invert();
    tree_a.clip_to(&tree_b);
    tree_b.clip_to(&tree_a);
    tree_b.invert();
    tree_b.clip_to(&tree_a);
    tree_b.invert();
    tree_a.build(tree_b.all_polygons());
    tree_a.invert();
    polygons_to_mesh(&tree_a.all_polygons())
}

/// Intersection of two closed meshes
pub fn csg_intersection(a: &Mesh, b: &Mesh) -> Mesh {
    if a.is_empty() || b.is_empty() {
        return Mesh::new();
    }
    let mut tree_a = BspNode::new(mesh_to_polygons(a));
    let mut tree_b = BspNode::new(mesh_to_polygons(b));
    tree_a.invert();
    tree_b.clip_to(&tree_a);
    tree_b.invert();
    tree_a.clip_to(&tree_b);
    tree_b.clip_to(&tree_a);
    tree_a.build(tree_b.all_polygons());
    tree_a.invert();
    polygons_to_mesh(&tree_a.all_polygons())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Primitive;

    fn cube_at(size: f64, offset: Vector3<f64>) -> Mesh {
        let mut mesh = Primitive::cube(Vector3::new(size, size, size), false).to_mesh();
        mesh.translate(&offset);
        mesh
    }

    #[test]
    fn test_union_of_overlapping_cubes() {
        let a = cube_at(2.0, Vector3::zeros());
        let b = cube_at(2.0, Vector3::new(1.0, 1.0, 1.0));
        let result = csg_union(&a, &b);
        assert!((result.volume() - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_difference_of_cubes() {
        let a = cube_at(2.0, Vector3::zeros());
        let b = cube_at(2.0, Vector3::new(1.0, 1.0, 1.0));
        let result = csg_difference(&a, &b);
        assert!((result.volume() - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_intersection_of_cubes() {
        let a = cube_at(2.0, Vector3::zeros());
        let b = cube_at(2.0, Vector3::new(1.0, 1.0, 1.0));
        let result = csg_intersection(&a, &b);
        assert!((result.volume() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let a = cube_at(1.0, Vector3::zeros());
        let b = cube_at(1.0, Vector3::new(5.0, 0.0, 0.0));
        assert!(csg_intersection(&a, &b).is_empty());
    }
}
