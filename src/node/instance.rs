// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Instances of catalog prototypes

use super::{Node, Node3, NodeBase, SceneNode, Transform};
use crate::catalog::Catalog;
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};

/// Attribute holding the catalog key, used to re-link after a cache load
pub const CATALOG_KEY: &str = "ddd:catalog:key";

/// Reference to a shared prototype placed with its own transform.
/// The prototype is kept alive by the catalog, not by the instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Instance {
    pub base: NodeBase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip)]
    prototype: Weak<Node>,
    #[serde(default, skip_serializing_if = "Transform::is_identity")]
    pub transform: Transform,
}

impl Instance {
    pub fn new(prototype: &Arc<Node>) -> Self {
        Self {
            base: NodeBase::named(prototype.name().map(str::to_string)),
            key: None,
            prototype: Arc::downgrade(prototype),
            transform: Transform::identity(),
        }
    }

    /// Record the catalog key the prototype was registered under
    pub fn keyed(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.set(CATALOG_KEY, key.as_str());
        self.key = Some(key);
        self
    }

    /// The prototype, if it is still alive
    pub fn prototype(&self) -> Option<Arc<Node>> {
        self.prototype.upgrade()
    }

    /// Point back at the catalog entry after deserialization
    pub fn relink(&mut self, catalog: &Catalog) -> bool {
        let key = self.key.clone().or_else(|| self.get_str(CATALOG_KEY).map(str::to_string));
        match key.and_then(|k| catalog.get(&k)) {
            Some(proto) => {
                self.prototype = Arc::downgrade(&proto);
                true
            }
            None => false,
        }
    }

    /// Mesh group holding this instance's transform and a private copy of
    /// the prototype
    pub fn expand(&self) -> Option<Node3> {
        let proto = self.prototype()?;
        let mut group = Node3 {
            base: self.base.metadata_copy(),
            transform: self.transform,
            ..Node3::group()
        };
        group.append(proto.copy());
        Some(group)
    }

    pub fn translate(&self, v: [f64; 3]) -> Instance {
        let mut out = self.copy();
        out.transform.translate(Vector3::from(v));
        out
    }

    pub fn rotate(&self, euler: [f64; 3]) -> Instance {
        let mut out = self.copy();
        out.transform.rotate_euler(Vector3::from(euler));
        out
    }

    pub fn rotate_quat(&self, q: UnitQuaternion<f64>) -> Instance {
        let mut out = self.copy();
        out.transform.rotate(q);
        out
    }

    pub fn scale(&self, s: [f64; 3]) -> Instance {
        let mut out = self.copy();
        out.transform.scale_by(Vector3::from(s));
        out
    }
}

impl SceneNode for Instance {
    fn base(&self) -> &NodeBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut NodeBase {
        &mut self.base
    }

    fn kind_name(&self) -> &'static str {
        "Instance"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;
    use approx::assert_relative_eq;

    #[test]
    fn test_instance_bounds_follow_prototype() {
        let proto: Arc<Node> = Arc::new(shapes::cuboid([0.0, 0.0, 0.0], [1.0, 1.0, 2.0]).named("bollard").into());
        let inst = Instance::new(&proto).translate([10.0, 0.0, 0.0]);
        assert_eq!(inst.name(), Some("bollard"));
        let node: Node = inst.clone().into();
        let bounds = node.bounds().unwrap();
        assert_relative_eq!(bounds.min.x, 10.0);
        assert_relative_eq!(bounds.max.z, 2.0);

        let expanded = inst.expand().unwrap();
        assert_relative_eq!(expanded.volume(), 2.0, epsilon = 1e-9);
        assert_ne!(expanded.children()[0].id(), proto.id());
    }

    #[test]
    fn test_weak_prototype_and_relink() {
        let mut catalog = Catalog::new();
        let proto = catalog
            .add("tree", shapes::cuboid([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]).into())
            .unwrap();
        let inst = Instance::new(&proto).keyed("tree");
        assert_eq!(inst.get_str(CATALOG_KEY), Some("tree"));

        let json = serde_json::to_string(&Node::from(inst)).unwrap();
        let mut back: Node = serde_json::from_str(&json).unwrap();
        let Node::Instance(back) = &mut back else {
            panic!("expected an instance");
        };
        assert!(back.prototype().is_none());
        assert!(back.relink(&catalog));
        assert!(back.prototype().is_some());

        let orphan = {
            let short_lived = Arc::new(Node::from(Node3::group()));
            Instance::new(&short_lived)
        };
        assert!(orphan.prototype().is_none());
        assert!(orphan.expand().is_none());
    }
}
