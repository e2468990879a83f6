// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Mesh nodes

use super::{Node, Node2, NodeBase, SceneNode, Transform};
use crate::error::{DddError, Result};
use crate::extrude::{self, StepOptions};
use crate::geometry::csg::{csg_difference, csg_intersection, csg_union};
use crate::geometry::mesh_utils;
use crate::geometry::{BoundingBox, Mesh};
use crate::meshops;
use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use crate::extrude::ExtrusionState;

/// Node carrying a triangle mesh in its own coordinate frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node3 {
    pub base: NodeBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<Mesh>,
    #[serde(default, skip_serializing_if = "Transform::is_identity")]
    pub transform: Transform,
    /// Present on nodes produced by an extrusion, so further steps can chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extrusion: Option<ExtrusionState>,
}

impl Node3 {
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh: Some(mesh),
            ..Self::default()
        }
    }

    pub fn group() -> Self {
        Self::default()
    }

    /// Same metadata and transform, a new mesh, no children
    pub fn derived(&self, mesh: Option<Mesh>) -> Node3 {
        Node3 {
            base: self.base.metadata_copy(),
            mesh,
            transform: self.transform,
            extrusion: None,
        }
    }

    // Transforms

    pub fn translate(&self, v: [f64; 3]) -> Node3 {
        let mut out = self.copy();
        out.transform.translate(Vector3::from(v));
        out
    }

    /// Rotate by euler angles (roll, pitch, yaw), in radians
    pub fn rotate(&self, euler: [f64; 3]) -> Node3 {
        let mut out = self.copy();
        out.transform.rotate_euler(Vector3::from(euler));
        out
    }

    pub fn rotate_quat(&self, q: UnitQuaternion<f64>) -> Node3 {
        let mut out = self.copy();
        out.transform.rotate(q);
        out
    }

    pub fn scale(&self, s: [f64; 3]) -> Node3 {
        let mut out = self.copy();
        out.transform.scale_by(Vector3::from(s));
        out
    }

    /// Bake the transform into the vertices of this node and its descendants
    pub fn apply_transform(&self) -> Node3 {
        let mut out = self.copy();
        out.bake(&Matrix4::identity());
        out
    }

    fn bake(&mut self, parent: &Matrix4<f64>) {
        let m = parent * self.transform.to_matrix();
        if let Some(mesh) = &mut self.mesh {
            mesh.transform(&m);
        }
        self.transform = Transform::identity();
        for child in &mut self.base.children {
            match child {
                Node::D3(c) => c.bake(&m),
                Node::D2(c) => c.apply_matrix(&m),
                Node::Instance(i) => i.transform = Transform::from_matrix(&(m * i.transform.to_matrix())),
            }
        }
    }

    fn collect_meshes(&self, parent: &Matrix4<f64>, out: &mut Mesh) {
        let m = parent * self.transform.to_matrix();
        if let Some(mesh) = &self.mesh {
            let mut placed = mesh.clone();
            placed.transform(&m);
            out.merge(&placed);
        }
        for child in self.children() {
            match child {
                Node::D3(c) => c.collect_meshes(&m, out),
                Node::Instance(i) => {
                    if let Some(Node::D3(proto)) = i.prototype().as_deref() {
                        proto.collect_meshes(&(m * i.transform.to_matrix()), out);
                    }
                }
                Node::D2(_) => {}
            }
        }
    }

    /// Every mesh of the subtree, instances expanded, in the parent's frame
    pub fn combined_mesh(&self) -> Mesh {
        let mut out = Mesh::new();
        self.collect_meshes(&Matrix4::identity(), &mut out);
        out
    }

    // Constructive solid geometry

    fn csg(&self, other: &Node3, op: fn(&Mesh, &Mesh) -> Mesh) -> Node3 {
        let mesh = op(&self.combined_mesh(), &other.combined_mesh());
        debug!(node = %self.label(), triangles = mesh.triangle_count(), "CSG result");
        Node3 {
            base: self.base.metadata_copy(),
            mesh: Some(mesh),
            ..Node3::group()
        }
    }

    pub fn union(&self, other: &Node3) -> Node3 {
        self.csg(other, csg_union)
    }

    pub fn subtract(&self, other: &Node3) -> Node3 {
        self.csg(other, csg_difference)
    }

    pub fn intersection(&self, other: &Node3) -> Node3 {
        self.csg(other, csg_intersection)
    }

    // Vertex and mesh edits

    pub(crate) fn map_meshes(&self, f: &impl Fn(&Mesh) -> Mesh) -> Node3 {
        let mut out = self.copy();
        out.apply_meshes(f);
        out
    }

    fn apply_meshes(&mut self, f: &impl Fn(&Mesh) -> Mesh) {
        if let Some(mesh) = &self.mesh {
            self.mesh = Some(f(mesh));
        }
        for child in &mut self.base.children {
            if let Node::D3(c) = child {
                c.apply_meshes(f);
            }
        }
    }

    /// Remap every vertex of the subtree. The function receives the local
    /// position, the vertex index and the node owning the mesh.
    pub fn vertex_func(&self, f: &dyn Fn([f64; 3], usize, &Node3) -> [f64; 3]) -> Node3 {
        let mut out = self.copy();
        out.apply_vertex_func(f);
        out
    }

    fn apply_vertex_func(&mut self, f: &dyn Fn([f64; 3], usize, &Node3) -> [f64; 3]) {
        if let Some(mut mesh) = self.mesh.take() {
            for (i, v) in mesh.vertices.iter_mut().enumerate() {
                let p = v.position;
                v.position = Point3::from(f([p.x, p.y, p.z], i, self));
            }
            mesh.recompute_normals();
            self.mesh = Some(mesh);
        }
        for child in &mut self.base.children {
            if let Node::D3(c) = child {
                c.apply_vertex_func(f);
            }
        }
    }

    /// Share normals between adjacent faces whose normals differ by less
    /// than `angle` radians
    pub fn smooth(&self, angle: f64) -> Node3 {
        self.map_meshes(&|m: &Mesh| meshops::smooth(m, angle))
    }

    pub fn merge_vertices(&self) -> Node3 {
        self.map_meshes(&|m: &Mesh| {
            let mut out = m.clone();
            out.merge_vertices();
            out
        })
    }

    /// Drop degenerate and duplicate faces and unused vertices
    pub fn clean(&self) -> Node3 {
        self.map_meshes(&|m: &Mesh| {
            let mut out = m.clone();
            out.clean();
            out
        })
    }

    /// Flip the winding of every face
    pub fn invert(&self) -> Node3 {
        self.map_meshes(&|m: &Mesh| {
            let mut out = m.clone();
            out.invert();
            out
        })
    }

    // Measures

    pub fn volume(&self) -> f64 {
        self.combined_mesh().volume()
    }

    pub fn area(&self) -> f64 {
        self.combined_mesh().area()
    }

    pub fn is_closed(&self) -> bool {
        self.mesh.as_ref().is_some_and(mesh_utils::is_closed)
    }

    pub fn is_manifold(&self) -> bool {
        self.mesh.as_ref().is_some_and(mesh_utils::is_manifold)
    }

    // Structure

    /// Single node holding every mesh of the subtree
    pub fn combine(&self) -> Node3 {
        let mut out = self.derived(None);
        out.transform = Transform::identity();
        out.mesh = Some(self.combined_mesh());
        out
    }

    /// This node with every descendant re-parented directly below it,
    /// transforms composed so positions are kept
    pub fn flatten(&self) -> Node3 {
        let mut out = self.derived(self.mesh.clone());
        fn collect(node: &Node, acc: &Matrix4<f64>, out: &mut Node3) {
            let mut copy = node.clone();
            copy.renew_ids();
            copy.children_mut().clear();
            let local = match &mut copy {
                Node::D3(n) => {
                    let m = acc * n.transform.to_matrix();
                    n.transform = Transform::from_matrix(&m);
                    m
                }
                Node::D2(n) => {
                    n.apply_matrix(acc);
                    *acc
                }
                Node::Instance(i) => {
                    let m = acc * i.transform.to_matrix();
                    i.transform = Transform::from_matrix(&m);
                    m
                }
            };
            out.append(copy);
            for child in node.children() {
                collect(child, &local, out);
            }
        }
        for child in self.children() {
            collect(child, &Matrix4::identity(), &mut out);
        }
        out
    }

    // Extrusion

    /// Number of extrusion steps applied so far
    pub fn extrusion_steps(&self) -> usize {
        self.extrusion.as_ref().map_or(0, |s| s.steps)
    }

    /// Add a step from the last extruded shape to `other`, `dh` above it
    pub fn extrude_step(&self, other: &Node2, dh: f64, opts: &StepOptions) -> Result<Node3> {
        let Some(state) = &self.extrusion else {
            return self.extrusion_failed("node has no extrusion state", opts);
        };
        let mesh = self.mesh.clone().unwrap_or_default();
        match extrude::extrude_step(&mesh, state, &other.geom, dh, opts) {
            Ok((mesh, state)) => {
                let mut out = self.copy();
                out.mesh = Some(mesh);
                out.extrusion = Some(state);
                Ok(out)
            }
            Err(e) => self.extrusion_failed(e.to_string(), opts),
        }
    }

    fn extrusion_failed(&self, message: impl Into<String>, opts: &StepOptions) -> Result<Node3> {
        let message = message.into();
        if opts.raise {
            return Err(DddError::extrusion(self.clone(), message));
        }
        warn!(node = %self.label(), %message, "Extrusion step failed, using empty node");
        let mut empty = self.derived(None);
        empty.set("ddd:empty", true);
        Ok(empty)
    }

    // Queries

    /// Vertices of the subtree in the parent's frame
    pub fn vertex_list(&self) -> Vec<[f64; 3]> {
        let m = self.transform.to_matrix();
        let local = self
            .mesh
            .iter()
            .flat_map(|mesh| mesh.vertices.iter().map(|v| v.position))
            .chain(
                self.children()
                    .iter()
                    .flat_map(Node::vertex_list)
                    .map(Point3::from),
            );
        local
            .map(|p| {
                let q = m.transform_point(&p);
                [q.x, q.y, q.z]
            })
            .collect()
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        self.bounds_with(&Matrix4::identity())
    }

    pub(crate) fn bounds_with(&self, parent: &Matrix4<f64>) -> Option<BoundingBox> {
        let m = parent * self.transform.to_matrix();
        let mut bbox = BoundingBox::empty();
        if let Some(mesh) = &self.mesh {
            for v in &mesh.vertices {
                bbox.expand_to_include(&m.transform_point(&v.position));
            }
        }
        for child in self.children() {
            if let Some(b) = child.bounds_with(&m) {
                bbox = bbox.union(&b);
            }
        }
        (!bbox.is_empty()).then_some(bbox)
    }

    /// No triangles here nor in any descendant
    pub fn is_empty(&self) -> bool {
        self.mesh.as_ref().map_or(true, Mesh::is_empty) && self.children().iter().all(Node::is_empty)
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.as_ref().map_or(0, Mesh::triangle_count)
    }
}

impl SceneNode for Node3 {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn kind_name(&self) -> &'static str {
        "Node3"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn unit_box() -> Node3 {
        shapes::cuboid([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]).named("box")
    }

    #[test]
    fn test_transforms_are_copies() {
        let b = unit_box();
        let moved = b.translate([2.0, 0.0, 0.0]);
        assert_eq!(b.transform, Transform::identity());
        assert_ne!(moved.id(), b.id());
        let bounds = moved.bounds().unwrap();
        assert_relative_eq!(bounds.min.x, 2.0);
        assert_relative_eq!(bounds.max.x, 3.0);
    }

    #[test]
    fn test_apply_transform_bakes_children() {
        let mut parent = Node3::group().named("parent");
        parent.append(unit_box().translate([0.0, 0.0, 1.0]));
        let parent = parent.translate([5.0, 0.0, 0.0]).scale([2.0, 2.0, 2.0]);
        let baked = parent.apply_transform();
        assert!(baked.transform.is_identity());
        let child = baked.children()[0].as_3d().unwrap();
        assert!(child.transform.is_identity());
        let before = parent.bounds().unwrap();
        let after = baked.bounds().unwrap();
        assert!(before.approx_eq(&after, 1e-9));
    }

    #[test]
    fn test_rotation_keeps_volume() {
        let b = unit_box().rotate([0.0, 0.0, FRAC_PI_2]);
        assert_relative_eq!(b.volume(), 1.0, epsilon = 1e-9);
        let bounds = b.bounds().unwrap();
        assert_relative_eq!(bounds.min.x, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_csg_subtract() {
        let a = shapes::cuboid([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]).named("a");
        let b = shapes::cuboid([1.0, 1.0, 1.0], [3.0, 3.0, 3.0]);
        let r = a.subtract(&b);
        assert_eq!(r.name(), Some("a"));
        assert_relative_eq!(r.volume(), 7.0, epsilon = 1e-6);
        assert_relative_eq!(a.union(&b).volume(), 15.0, epsilon = 1e-6);
    }

    #[test]
    fn test_vertex_func_sees_owner() {
        let b = unit_box().with("lift", 3.0);
        let lifted = b.vertex_func(&|p, _, obj| {
            let dz = obj.get_f64("lift").unwrap_or(0.0);
            [p[0], p[1], p[2] + dz]
        });
        let bounds = lifted.bounds().unwrap();
        assert_relative_eq!(bounds.min.z, 3.0);
        assert_relative_eq!(b.bounds().unwrap().min.z, 0.0);
    }

    #[test]
    fn test_combine_and_flatten() {
        let mut root = Node3::group().named("root");
        let mut a = unit_box().translate([1.0, 0.0, 0.0]);
        a.append(unit_box().translate([0.0, 2.0, 0.0]).named("inner"));
        root.append(a);
        let combined = root.combine();
        assert_relative_eq!(combined.volume(), 2.0, epsilon = 1e-9);
        let flat = root.flatten();
        assert_eq!(flat.children().len(), 2);
        let inner = flat.children()[1].bounds().unwrap();
        assert_relative_eq!(inner.min.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(inner.min.y, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_extrude_step_without_state() {
        let b = unit_box();
        let target = shapes::point([0.0, 0.0]);
        let empty = b.extrude_step(&target, 1.0, &StepOptions::default()).unwrap();
        assert!(empty.mesh.is_none());
        assert_eq!(empty.get("ddd:empty").and_then(|v| v.as_bool()), Some(true));
        let raising = StepOptions::default().raising(true);
        assert!(matches!(
            b.extrude_step(&target, 1.0, &raising),
            Err(DddError::Extrusion { .. })
        ));
    }

    #[test]
    fn test_chained_steps_count() {
        let base = shapes::rect([[0.0, 0.0], [2.0, 2.0]]).extrude(1.0).unwrap();
        assert_eq!(base.extrusion_steps(), 1);
        let roof = base
            .extrude_step(&shapes::point([1.0, 1.0]), 1.0, &StepOptions::default())
            .unwrap();
        assert_eq!(roof.extrusion_steps(), 2);
        assert!(roof.is_closed());
        assert_relative_eq!(roof.volume(), 4.0 + 4.0 / 3.0, epsilon = 1e-9);
    }
}
