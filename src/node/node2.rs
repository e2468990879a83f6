// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Planar nodes

use super::{Node, Node3, NodeBase, SceneNode};
use crate::error::{DddError, Result};
use crate::extrude::{self, initial_state, StepOptions, SweepOptions};
use crate::geometry::path::{self, SegmentPosition, Side};
use crate::geometry::shape2::to_point2;
use crate::geometry::{BoundingBox, Path2, Shape2};
use crate::ops2d::{self, BooleanOp, BufferOptions};
use ahash::AHashMap;
use geo::{LineString, MultiLineString};
use nalgebra::{Matrix4, Point2, Point3};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Node carrying a planar geometry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Node2 {
    pub base: NodeBase,
    #[serde(default)]
    pub geom: Shape2,
    /// Texture coordinates, one per entry of [`Shape2::coords`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv: Option<Vec<[f64; 2]>>,
    /// Vertex heights, one per entry of [`Shape2::coords`]. `None` means z = 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<Vec<f64>>,
}

/// Result of [`Node2::closest_segment`]
#[derive(Debug, Clone, Copy)]
pub struct ClosestSegment<'a> {
    pub point: [f64; 2],
    pub segment_index: usize,
    pub a: [f64; 2],
    pub b: [f64; 2],
    /// Node owning the closest segment
    pub object: &'a Node2,
    pub distance: f64,
}

fn xy(p: Point2<f64>) -> [f64; 2] {
    [p.x, p.y]
}

impl Node2 {
    pub fn new(geom: Shape2) -> Self {
        Self {
            base: NodeBase::default(),
            geom,
            uv: None,
            z: None,
        }
    }

    /// Attach a height to every vertex by position. Vertices with no
    /// matching entry sit at z = 0; all-zero heights are not stored.
    pub fn with_heights(mut self, heights: impl IntoIterator<Item = ([f64; 2], f64)>) -> Self {
        let lookup: AHashMap<[u64; 2], f64> = heights.into_iter().map(|(c, z)| (coord_key(c), z)).collect();
        let z: Vec<f64> = self
            .geom
            .coords()
            .into_iter()
            .map(|c| lookup.get(&coord_key(c)).copied().unwrap_or(0.0))
            .collect();
        self.z = z.iter().any(|v| *v != 0.0).then_some(z);
        self
    }

    /// Height of every vertex, zeros when none are stored
    pub fn heights(&self) -> Vec<f64> {
        let n = self.geom.coords().len();
        match &self.z {
            Some(z) if z.len() == n => z.clone(),
            _ => vec![0.0; n],
        }
    }

    /// Node without geometry, used to group children
    pub fn group() -> Self {
        Self::new(Shape2::Empty)
    }

    /// Same metadata and a new geometry, without children
    pub fn derived(&self, geom: Shape2) -> Node2 {
        Node2 {
            base: self.base.metadata_copy(),
            geom,
            uv: None,
            z: None,
        }
    }

    /// Mesh node with the same metadata and no mesh
    pub fn copy3(&self) -> Node3 {
        Node3 {
            base: self.base.metadata_copy(),
            ..Node3::group()
        }
    }

    /// Turn a geometry error without a node into one tagged with this node
    fn tag(&self, err: DddError) -> DddError {
        match err {
            DddError::Geometry {
                message, node: None, ..
            } => DddError::geometry(self.clone(), message),
            other => other,
        }
    }

    /// Planar nodes of the subtree, this one first, in pre-order
    pub fn planar_nodes(&self) -> Vec<&Node2> {
        let mut out = vec![self];
        for child in self.children() {
            if let Node::D2(c) = child {
                out.extend(c.planar_nodes());
            }
        }
        out
    }

    /// Geometries of the subtree gathered into one collection
    pub fn subtree_shape(&self) -> Shape2 {
        Shape2::from_parts(self.planar_nodes().into_iter().map(|n| n.geom.clone()).collect())
    }

    /// Union of every geometry in the subtree
    pub fn union_geom(&self) -> Result<Shape2> {
        ops2d::union_all(self.planar_nodes().into_iter().map(|n| n.geom.clone()).collect())
            .map_err(|e| self.tag(e))
    }

    fn try_map_tree(&self, f: &impl Fn(&Node2) -> Result<Shape2>) -> Result<Node2> {
        let mut out = self.clone();
        out.base.id = super::NodeId::fresh();
        out.geom = f(self).map_err(|e| self.tag(e))?;
        out.uv = None;
        out.z = None;
        for child in &mut out.base.children {
            match child {
                Node::D2(c) => *c = c.try_map_tree(f)?,
                other => other.renew_ids(),
            }
        }
        Ok(out)
    }

    /// Replace every geometry of the planar subtree; heights are dropped
    fn map_tree(&self, f: &impl Fn(&Shape2) -> Shape2) -> Node2 {
        let mut out = self.copy();
        out.apply_nodes(&|n: &mut Node2| {
            n.geom = f(&n.geom);
            n.uv = None;
            n.z = None;
        });
        out
    }

    fn apply_nodes(&mut self, f: &impl Fn(&mut Node2)) {
        f(self);
        for child in &mut self.base.children {
            if let Node::D2(c) = child {
                c.apply_nodes(f);
            }
        }
    }

    /// Move every vertex of the planar subtree, keeping its height.
    /// `reorient` rewinds rings after a mirroring map.
    fn move_vertices(&mut self, f: &impl Fn([f64; 3]) -> [f64; 3], reorient: bool) {
        self.apply_nodes(&|n: &mut Node2| {
            let vertices = n.vertices();
            let moved: Vec<[f64; 3]> = vertices.iter().copied().map(f).collect();
            let height: AHashMap<[u64; 2], f64> = vertices.iter().map(|v| (coord_key([v[0], v[1]]), v[2])).collect();
            let mut geom = n.geom.map_coords(&|c| {
                let z = height.get(&coord_key(c)).copied().unwrap_or(0.0);
                let [x, y, _] = f([c[0], c[1], z]);
                [x, y]
            });
            if reorient {
                geom = geom.oriented();
            }
            let keep_z = n.z.is_some();
            n.geom = geom;
            n.uv = None;
            n.z = None;
            if keep_z {
                let heights: Vec<([f64; 2], f64)> = moved.iter().map(|v| ([v[0], v[1]], v[2])).collect();
                let relocated = std::mem::take(n).with_heights(heights);
                *n = relocated;
            }
        });
    }

    /// Transform the planar subtree in place by a matrix. Stored heights
    /// follow the full transform; flat nodes stay flat.
    pub(crate) fn apply_matrix(&mut self, m: &Matrix4<f64>) {
        let flips = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)] < 0.0;
        self.move_vertices(
            &|v: [f64; 3]| {
                let p = m.transform_point(&Point3::new(v[0], v[1], v[2]));
                [p.x, p.y, p.z]
            },
            flips,
        );
    }

    // Transforms

    pub fn translate(&self, v: [f64; 2]) -> Node2 {
        let mut out = self.copy();
        out.move_vertices(&|c: [f64; 3]| [c[0] + v[0], c[1] + v[1], c[2]], false);
        out
    }

    /// Rotate counter-clockwise about the origin (radians)
    pub fn rotate(&self, angle: f64) -> Node2 {
        let (sin, cos) = angle.sin_cos();
        let mut out = self.copy();
        out.move_vertices(&|c: [f64; 3]| [c[0] * cos - c[1] * sin, c[0] * sin + c[1] * cos, c[2]], false);
        out
    }

    pub fn scale(&self, k: [f64; 2]) -> Node2 {
        let mut out = self.copy();
        out.move_vertices(&|c: [f64; 3]| [c[0] * k[0], c[1] * k[1], c[2]], k[0] * k[1] < 0.0);
        out
    }

    // Set algebra

    /// Union of both subtrees, as a single node carrying this node's metadata
    pub fn union(&self, other: &Node2) -> Result<Node2> {
        let (a, b) = (self.union_geom()?, other.union_geom()?);
        let geom = ops2d::boolean(&a, &b, BooleanOp::Union).map_err(|e| self.tag(e))?;
        Ok(self.derived(geom))
    }

    /// Union of this node's subtree into one geometry
    pub fn union_all(&self) -> Result<Node2> {
        Ok(self.derived(self.union_geom()?))
    }

    /// Remove `other` from this node and from each planar descendant
    pub fn subtract(&self, other: &Node2) -> Result<Node2> {
        let b = other.union_geom()?;
        self.try_map_tree(&|n: &Node2| ops2d::boolean(&n.geom, &b, BooleanOp::Difference))
    }

    /// Intersect this node and each planar descendant with `other`
    pub fn intersection(&self, other: &Node2) -> Result<Node2> {
        let b = other.union_geom()?;
        self.try_map_tree(&|n: &Node2| ops2d::boolean(&n.geom, &b, BooleanOp::Intersection))
    }

    pub fn symmetric_difference(&self, other: &Node2) -> Result<Node2> {
        let (a, b) = (self.union_geom()?, other.union_geom()?);
        let geom = ops2d::boolean(&a, &b, BooleanOp::SymmetricDifference).map_err(|e| self.tag(e))?;
        Ok(self.derived(geom))
    }

    // Offsetting and cleaning

    /// Buffer with round caps and joins
    pub fn buffer(&self, distance: f64) -> Result<Node2> {
        self.buffer_with(distance, &BufferOptions::default())
    }

    pub fn buffer_with(&self, distance: f64, opts: &BufferOptions) -> Result<Node2> {
        self.try_map_tree(&|n: &Node2| ops2d::buffer(&n.geom, distance, opts))
    }

    /// Remove duplicate and colinear vertices and resolve self-intersections.
    /// A negative `eps` also removes slivers thinner than `2 * |eps|`.
    pub fn clean(&self, eps: f64) -> Result<Node2> {
        self.try_map_tree(&|n: &Node2| ops2d::clean(&n.geom, eps))
    }

    pub fn simplify(&self, distance: f64) -> Node2 {
        self.map_tree(&|s: &Shape2| ops2d::simplify(s, distance))
    }

    pub fn convex_hull(&self) -> Node2 {
        self.derived(ops2d::convex_hull(&self.subtree_shape()))
    }

    pub fn remove_holes(&self) -> Node2 {
        self.map_tree(&Shape2::without_holes)
    }

    /// Boundary rings as lines
    pub fn outline(&self) -> Node2 {
        self.map_tree(&Shape2::outline)
    }

    /// Group whose children are one node per part of every planar geometry
    /// in the subtree
    pub fn individualize(&self) -> Node2 {
        let mut group = self.derived(Shape2::Empty);
        for node in self.planar_nodes() {
            for part in node.geom.parts() {
                group.append(node.derived(part));
            }
        }
        for child in self.children() {
            if !child.is_2d() {
                group.append(child.copy());
            }
        }
        group
    }

    // Linear referencing

    /// Closest segment to `p` among every ring and line of the planar subtree
    pub fn closest_segment(&self, p: [f64; 2]) -> Option<ClosestSegment<'_>> {
        let target = Point2::new(p[0], p[1]);
        let mut best: Option<ClosestSegment<'_>> = None;
        for node in self.planar_nodes() {
            for line in node.geom.paths() {
                let pts: Vec<Point2<f64>> = line.0.iter().map(|c| to_point2(*c)).collect();
                let Some(proj) = path::closest_segment(&pts, &target) else {
                    continue;
                };
                if best.map_or(true, |b| proj.distance < b.distance) {
                    best = Some(ClosestSegment {
                        point: xy(proj.point),
                        segment_index: proj.segment_index,
                        a: xy(proj.a),
                        b: xy(proj.b),
                        object: node,
                        distance: proj.distance,
                    });
                }
            }
            for q in node.geom.points() {
                let d = (to_point2(q.0) - target).norm();
                if best.map_or(true, |b| d < b.distance) {
                    let at = [q.x(), q.y()];
                    best = Some(ClosestSegment {
                        point: at,
                        segment_index: 0,
                        a: at,
                        b: at,
                        object: node,
                        distance: d,
                    });
                }
            }
        }
        best
    }

    fn first_path(&self) -> Option<Vec<Point2<f64>>> {
        self.geom
            .paths()
            .first()
            .map(|l| l.0.iter().map(|c| to_point2(*c)).collect())
    }

    /// Point at distance `d` along the first line or ring of this node
    pub fn interpolate_segment(&self, d: f64) -> Option<SegmentPosition> {
        path::interpolate(&self.first_path()?, d)
    }

    /// Perpendicular line at distance `d`
    pub fn perpendicular(&self, d: f64, length: f64, double: bool) -> Option<Node2> {
        let [a, b] = path::perpendicular(&self.first_path()?, d, length, double)?;
        Some(self.derived(Shape2::Line(LineString::from(vec![(a.x, a.y), (b.x, b.y)]))))
    }

    /// Portion of the line between two distances
    pub fn substring(&self, start: f64, end: f64) -> Node2 {
        let pts = self.first_path().map(|p| path::substring(&p, start, end)).unwrap_or_default();
        self.derived(line_shape(&pts))
    }

    /// Line offset sideways, left or right of the direction of travel
    pub fn parallel_offset(&self, distance: f64, side: Side) -> Node2 {
        let d = match side {
            Side::Left => distance,
            Side::Right => -distance,
        };
        let lines: Vec<LineString<f64>> = self
            .geom
            .lines()
            .iter()
            .map(|l| {
                let pts: Vec<Point2<f64>> = l.0.iter().map(|c| to_point2(*c)).collect();
                let offset = path::offset_polyline(&pts, d);
                LineString::from(offset.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>())
            })
            .collect();
        self.derived(Shape2::from_multiline(MultiLineString::new(lines)))
    }

    // Extrusion

    /// Extrude this node and its planar descendants, with cap and base
    pub fn extrude(&self, h: f64) -> Result<Node3> {
        self.extrude_with(h, true, true)
    }

    pub fn extrude_with(&self, h: f64, cap: bool, base: bool) -> Result<Node3> {
        let mut out = self.copy3();
        if !self.geom.is_empty() {
            let (mesh, state) = extrude::extrude(&self.geom, h, cap, base).map_err(|e| self.tag(e))?;
            out.mesh = Some(mesh);
            out.extrusion = Some(state);
        }
        for child in self.children() {
            match child {
                Node::D2(c) => {
                    out.append(c.extrude_with(h, cap, base)?);
                }
                other => {
                    out.append(other.copy());
                }
            }
        }
        Ok(out)
    }

    /// Start an extrusion from this footprint and stitch it to `other`.
    /// Invalid input gives an empty node tagged `ddd:empty` unless the
    /// options ask to raise.
    pub fn extrude_step(&self, other: &Node2, dh: f64, opts: &StepOptions) -> Result<Node3> {
        let mut start = self.copy3();
        start.extrusion = Some(initial_state(&self.geom));
        start.extrude_step(other, dh, opts)
    }

    /// Sweep this node's polygons, as a profile, along a path
    pub fn extrude_along(&self, path: &Path2, opts: &SweepOptions) -> Result<Node3> {
        let mesh = extrude::sweep(&self.geom, &path.linearize(), opts).map_err(|e| self.tag(e))?;
        let mut out = self.copy3();
        out.mesh = Some(mesh);
        Ok(out)
    }

    /// Planar triangulation as a mesh node; children are triangulated too
    pub fn triangulate(&self, twosided: bool) -> Result<Node3> {
        let mut out = self.copy3();
        if !self.geom.is_empty() {
            let mesh = ops2d::triangulate(&self.geom, 0.0, twosided).map_err(|e| self.tag(e))?;
            out.mesh = Some(mesh);
        }
        for child in self.children() {
            match child {
                Node::D2(c) => {
                    out.append(c.triangulate(twosided)?);
                }
                other => {
                    out.append(other.copy());
                }
            }
        }
        Ok(out)
    }

    // Queries

    pub fn bounds(&self) -> Option<BoundingBox> {
        let bbox = BoundingBox::from_points(self.vertex_list().into_iter().map(Point3::from));
        (!bbox.is_empty()).then_some(bbox)
    }

    pub fn centroid(&self) -> Option<[f64; 2]> {
        let shape = if self.geom.is_empty() {
            self.subtree_shape()
        } else {
            self.geom.clone()
        };
        shape.centroid().map(|p| [p.x(), p.y()])
    }

    pub fn area(&self) -> f64 {
        self.geom.area()
    }

    pub fn length(&self) -> f64 {
        self.geom.length()
    }

    /// No geometry here nor in any descendant
    pub fn is_empty(&self) -> bool {
        self.geom.is_empty() && self.children().iter().all(Node::is_empty)
    }

    pub fn contains(&self, other: &Node2) -> bool {
        ops2d::boolean::contains(&self.subtree_shape(), &other.subtree_shape())
    }

    pub fn intersects(&self, other: &Node2) -> bool {
        ops2d::boolean::intersects(&self.subtree_shape(), &other.subtree_shape())
    }

    pub fn distance(&self, other: &Node2) -> f64 {
        ops2d::boolean::distance(&self.subtree_shape(), &other.subtree_shape())
    }

    /// Coordinates of this node with their heights
    pub fn vertices(&self) -> Vec<[f64; 3]> {
        self.geom
            .coords()
            .into_iter()
            .zip(self.heights())
            .map(|(c, z)| [c[0], c[1], z])
            .collect()
    }

    /// Coordinates of this node followed by its descendants
    pub fn vertex_list(&self) -> Vec<[f64; 3]> {
        let mut out = self.vertices();
        for child in self.children() {
            out.extend(child.vertex_list());
        }
        out
    }

    /// Planar coordinates of the planar subtree
    pub fn coords_iterator(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.planar_nodes().into_iter().flat_map(|n| n.geom.coords())
    }

    /// Planar child closest to `p`, with its distance
    pub fn closest(&self, p: [f64; 2]) -> Option<(&Node2, f64)> {
        let target = Shape2::Point(geo::Point::new(p[0], p[1]));
        self.children()
            .iter()
            .filter_map(Node::as_2d)
            .map(|c| (c, ops2d::boolean::distance(&c.subtree_shape(), &target)))
            .filter(|(_, d)| d.is_finite())
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    // Structure

    /// Group holding every node of the subtree as a direct child
    pub fn flatten(&self) -> Node2 {
        let mut out = self.derived(self.geom.clone());
        fn collect(node: &Node, out: &mut Node2) {
            let mut copy = node.clone();
            copy.renew_ids();
            copy.children_mut().clear();
            out.append(copy);
            for child in node.children() {
                collect(child, out);
            }
        }
        for child in self.children() {
            collect(child, &mut out);
        }
        out
    }

    /// Single node carrying every geometry of the planar subtree
    pub fn combine(&self) -> Node2 {
        self.derived(self.subtree_shape())
    }

    /// Log and swallow a recoverable error, returning an empty node
    pub fn or_empty(&self, result: Result<Node2>) -> Result<Node2> {
        match result {
            Err(e) if e.is_recoverable() => {
                warn!(node = %self.label(), error = %e, "Geometry operation failed, using empty node");
                Ok(self.derived(Shape2::Empty).with("ddd:empty", true))
            }
            other => other,
        }
    }
}

/// Hash key of a planar coordinate; both zeros share a key
fn coord_key(c: [f64; 2]) -> [u64; 2] {
    [(c[0] + 0.0).to_bits(), (c[1] + 0.0).to_bits()]
}

fn line_shape(points: &[Point2<f64>]) -> Shape2 {
    if points.len() < 2 {
        return Shape2::Empty;
    }
    Shape2::Line(LineString::from(points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>()))
}

impl SceneNode for Node2 {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn kind_name(&self) -> &'static str {
        "Node2"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;
    use approx::assert_relative_eq;

    #[test]
    fn test_union_keeps_left_metadata() {
        let a = shapes::rect([[0.0, 0.0], [1.0, 1.0]]).named("left").with("k", 1);
        let b = shapes::rect([[1.0, 0.0], [2.0, 1.0]]).named("right");
        let u = a.union(&b).unwrap();
        assert_eq!(u.name(), Some("left"));
        assert_eq!(u.get_f64("k"), Some(1.0));
        assert_ne!(u.id(), a.id());
        assert_relative_eq!(u.area(), 2.0, epsilon = 1e-9);
        let cleaned = u.clean(1e-8).unwrap();
        assert_eq!(cleaned.geom.coords().len(), 5);
    }

    #[test]
    fn test_operations_do_not_mutate() {
        let mut a = shapes::rect([[0.0, 0.0], [2.0, 2.0]]);
        a.append(shapes::disc([5.0, 5.0], 1.0, 4));
        let before = a.vertex_list();
        let _ = a.buffer(1.0).unwrap();
        let _ = a.translate([3.0, 3.0]);
        let _ = a.subtract(&shapes::rect([[1.0, 1.0], [3.0, 3.0]])).unwrap();
        let _ = a.extrude(2.0).unwrap();
        assert_eq!(a.vertex_list(), before);
        assert_eq!(a.children().len(), 1);
    }

    #[test]
    fn test_subtract_applies_to_children() {
        let mut a = shapes::rect([[0.0, 0.0], [2.0, 2.0]]);
        a.append(shapes::rect([[0.0, 3.0], [2.0, 5.0]]));
        let cut = shapes::rect([[1.0, -1.0], [3.0, 6.0]]);
        let r = a.subtract(&cut).unwrap();
        assert_relative_eq!(r.area(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(r.children()[0].as_2d().unwrap().area(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_individualize_and_combine() {
        let a = shapes::rect([[0.0, 0.0], [1.0, 1.0]]);
        let two = a.union(&shapes::rect([[3.0, 0.0], [4.0, 1.0]])).unwrap();
        let group = two.individualize();
        assert!(group.geom.is_empty());
        assert_eq!(group.children().len(), 2);
        assert_relative_eq!(group.combine().area(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_closest_segment_reports_owner() {
        let mut root = Node2::group().named("root");
        root.append(shapes::line(&[[0.0, 0.0], [10.0, 0.0]]).unwrap().named("road"));
        root.append(shapes::line(&[[0.0, 5.0], [10.0, 5.0]]).unwrap().named("river"));
        let hit = root.closest_segment([3.0, 4.0]).unwrap();
        assert_eq!(hit.object.name(), Some("river"));
        assert_relative_eq!(hit.distance, 1.0);
        assert_eq!(hit.point, [3.0, 5.0]);
        assert_eq!(hit.segment_index, 0);
    }

    #[test]
    fn test_line_referencing() {
        let line = shapes::line(&[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0]]).unwrap();
        let pos = line.interpolate_segment(15.0).unwrap();
        assert_eq!(pos.segment_index, 1);
        assert_relative_eq!(pos.point.y, 5.0);
        let sub = line.substring(5.0, 15.0);
        assert_relative_eq!(sub.length(), 10.0);
        let perp = line.perpendicular(5.0, 2.0, true).unwrap();
        assert_eq!(perp.geom.coords(), vec![[5.0, -1.0], [5.0, 1.0]]);
        let left = line.parallel_offset(1.0, Side::Left);
        assert_eq!(left.geom.coords()[0], [0.0, 1.0]);
    }

    #[test]
    fn test_extrude_recurses_into_children() {
        let mut a = shapes::rect([[0.0, 0.0], [1.0, 1.0]]).named("a");
        a.append(shapes::rect([[2.0, 0.0], [3.0, 1.0]]).named("b"));
        let solid = a.extrude(2.0).unwrap();
        assert_eq!(solid.name(), Some("a"));
        assert_eq!(solid.children()[0].name(), Some("b"));
        assert!(solid.children()[0].as_3d().unwrap().mesh.is_some());
    }

    #[test]
    fn test_triangulate_and_copy3() {
        let r = shapes::rect([[0.0, 0.0], [2.0, 1.0]]).with("ddd:layer", "0");
        let flat = r.triangulate(false).unwrap();
        assert_eq!(flat.mesh.as_ref().unwrap().triangle_count(), 2);
        assert_eq!(flat.get_str("ddd:layer"), Some("0"));
        let empty = r.copy3();
        assert!(empty.mesh.is_none());
    }

    #[test]
    fn test_closest_child_and_predicates() {
        let mut root = Node2::group();
        root.append(shapes::rect([[0.0, 0.0], [1.0, 1.0]]).named("near"));
        root.append(shapes::rect([[10.0, 0.0], [11.0, 1.0]]).named("far"));
        let (node, d) = root.closest([2.0, 0.5]).unwrap();
        assert_eq!(node.name(), Some("near"));
        assert_relative_eq!(d, 1.0);
        let big = shapes::rect([[-1.0, -1.0], [20.0, 20.0]]);
        assert!(big.contains(&root));
        assert!(root.intersects(&big));
    }

    #[test]
    fn test_or_empty_tags_failures() {
        let a = shapes::rect([[0.0, 0.0], [1.0, 1.0]]).named("bad");
        let failed = a.or_empty(Err(DddError::geometry_msg("x", "boom"))).unwrap();
        assert!(failed.geom.is_empty());
        assert_eq!(failed.get("ddd:empty").and_then(|v| v.as_bool()), Some(true));
    }
}
