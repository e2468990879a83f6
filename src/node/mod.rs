// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scene tree nodes
//!
//! A scene is a tree of [`Node`]s. Each node is a planar [`Node2`], a mesh
//! [`Node3`] or an [`Instance`] of a catalog prototype. Children are owned
//! exclusively by their parent; materials and prototypes are shared.

mod base;
mod instance;
mod material;
mod node2;
mod node3;
mod transform;
mod value;

pub use base::{NodeBase, NodeId, SceneNode, SetMode};
pub use instance::Instance;
pub use material::{parse_hex_color, AtlasDescriptor, Material};
pub use node2::{ClosestSegment, Node2};
pub use node3::{ExtrusionState, Node3};
pub use transform::Transform;
pub use value::Value;

use crate::geometry::BoundingBox;
use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};

/// A node of any variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    #[serde(rename = "node2")]
    D2(Node2),
    #[serde(rename = "node3")]
    D3(Node3),
    Instance(Instance),
}

impl Node {
    /// Empty planar group
    pub fn group2(name: impl Into<String>) -> Node {
        Node::D2(Node2::group().named(name))
    }

    /// Empty mesh group
    pub fn group3(name: impl Into<String>) -> Node {
        Node::D3(Node3::group().named(name))
    }

    pub fn as_2d(&self) -> Option<&Node2> {
        match self {
            Node::D2(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_2d_mut(&mut self) -> Option<&mut Node2> {
        match self {
            Node::D2(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_3d(&self) -> Option<&Node3> {
        match self {
            Node::D3(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_3d_mut(&mut self) -> Option<&mut Node3> {
        match self {
            Node::D3(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Node::Instance(n) => Some(n),
            _ => None,
        }
    }

    pub fn is_2d(&self) -> bool {
        matches!(self, Node::D2(_))
    }

    pub fn is_3d(&self) -> bool {
        matches!(self, Node::D3(_))
    }

    /// No geometry on this node or any descendant
    pub fn is_empty(&self) -> bool {
        match self {
            Node::D2(n) => n.is_empty(),
            Node::D3(n) => n.is_empty(),
            Node::Instance(_) => false,
        }
    }

    /// Vertices of this node and its descendants, in local coordinates
    pub fn vertex_list(&self) -> Vec<[f64; 3]> {
        match self {
            Node::D2(n) => n.vertex_list(),
            Node::D3(n) => n.vertex_list(),
            Node::Instance(_) => Vec::new(),
        }
    }

    pub fn vertex_iterator(&self) -> impl Iterator<Item = [f64; 3]> {
        self.vertex_list().into_iter()
    }

    /// Bounds of the subtree in the coordinate frame of this node's parent
    pub fn bounds(&self) -> Option<BoundingBox> {
        self.bounds_with(&Matrix4::identity())
    }

    pub(crate) fn bounds_with(&self, parent: &Matrix4<f64>) -> Option<BoundingBox> {
        let bbox = match self {
            Node::D2(n) => {
                let mut bbox = BoundingBox::empty();
                for v in n.vertex_list() {
                    bbox.expand_to_include(&parent.transform_point(&Point3::from(v)));
                }
                bbox
            }
            Node::D3(n) => n.bounds_with(parent).unwrap_or_else(BoundingBox::empty),
            Node::Instance(inst) => inst
                .prototype()
                .and_then(|proto| proto.bounds_with(&(parent * inst.transform.to_matrix())))
                .unwrap_or_else(BoundingBox::empty),
        };
        (!bbox.is_empty()).then_some(bbox)
    }

    pub fn centroid(&self) -> Option<[f64; 3]> {
        match self {
            Node::D2(n) => n.centroid().map(|c| [c[0], c[1], 0.0]),
            _ => self.bounds().map(|b| {
                let c = b.center();
                [c.x, c.y, c.z]
            }),
        }
    }

    /// Depth-first visit of this node and its descendants, with their depth
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Node, usize)) {
        fn visit<'a>(node: &'a Node, depth: usize, f: &mut dyn FnMut(&'a Node, usize)) {
            f(node, depth);
            for child in node.children() {
                visit(child, depth + 1, f);
            }
        }
        visit(self, 0, f);
    }

    /// Number of nodes in the subtree, this one included
    pub fn count(&self) -> usize {
        1 + self.children().iter().map(Node::count).sum::<usize>()
    }
}

impl SceneNode for Node {
    fn base(&self) -> &NodeBase {
        match self {
            Node::D2(n) => &n.base,
            Node::D3(n) => &n.base,
            Node::Instance(n) => &n.base,
        }
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        match self {
            Node::D2(n) => &mut n.base,
            Node::D3(n) => &mut n.base,
            Node::Instance(n) => &mut n.base,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Node::D2(n) => n.kind_name(),
            Node::D3(n) => n.kind_name(),
            Node::Instance(n) => n.kind_name(),
        }
    }
}

impl From<Node2> for Node {
    fn from(n: Node2) -> Self {
        Node::D2(n)
    }
}

impl From<Node3> for Node {
    fn from(n: Node3) -> Self {
        Node::D3(n)
    }
}

impl From<Instance> for Node {
    fn from(n: Instance) -> Self {
        Node::Instance(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;

    fn sample_tree() -> Node {
        let mut root = Node::group2("Features");
        root.append(shapes::rect([[0.0, 0.0], [1.0, 1.0]]).named("a"));
        let mut b = shapes::rect([[2.0, 0.0], [3.0, 1.0]]).named("b");
        b.append(shapes::point([5.0, 5.0]).named("b1"));
        root.append(b);
        root
    }

    #[test]
    fn test_set_default_and_children() {
        let mut root = sample_tree();
        root.set_with(
            "ddd:height",
            2.0,
            SetMode {
                default: false,
                children: true,
            },
        );
        assert!(root.descendants().iter().all(|n| n.get_f64("ddd:height") == Some(2.0)));

        root.set_with(
            "ddd:height",
            5.0,
            SetMode {
                default: true,
                children: true,
            },
        );
        assert_eq!(root.get_f64("ddd:height"), Some(2.0));
        assert_eq!(root.get_or("missing", 1), Value::Int(1));
    }

    #[test]
    fn test_remove_and_replace() {
        let mut root = sample_tree();
        let b1 = root.descendants()[2].id();
        let removed = root.remove_descendant(b1).unwrap();
        assert_eq!(removed.name(), Some("b1"));
        assert_eq!(root.count(), 3);

        let a = root.children()[0].id();
        let old = root
            .replace_descendant(a, shapes::point([0.0, 0.0]).named("p").into())
            .unwrap();
        assert_eq!(old.name(), Some("a"));
        assert_eq!(root.children()[0].name(), Some("p"));
    }

    #[test]
    fn test_copy_renews_ids() {
        let root = sample_tree();
        let copy = root.copy();
        assert_ne!(copy.id(), root.id());
        assert_ne!(copy.children()[0].id(), root.children()[0].id());
        assert_eq!(copy.vertex_list(), root.vertex_list());
    }

    #[test]
    fn test_label_and_material() {
        let anonymous: Node = shapes::point([0.0, 0.0]).into();
        assert!(anonymous.label().starts_with("Node2#"));
        let mat = Material::new("grass").shared();
        let root = sample_tree().material(Some(mat.clone()), true);
        assert!(root
            .descendants()
            .iter()
            .all(|n| n.get_material().map(|m| m.name.as_str()) == Some("grass")));
        let shallow = sample_tree().material(Some(mat), false);
        assert!(shallow.children()[0].get_material().is_none());
    }

    #[test]
    fn test_bounds_and_serde() {
        let root = sample_tree();
        let bbox = root.bounds().unwrap();
        assert_eq!(bbox.max.x, 5.0);
        let json = serde_json::to_string(&root).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), root.id());
        assert_eq!(back.count(), 4);
        assert_eq!(back.vertex_list(), root.vertex_list());
    }
}
