// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Shared prototype and material stores, owned by a pipeline run

use crate::error::{DddError, Result};
use crate::node::{Instance, Material, Node, SceneNode};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Prototype nodes keyed by string. Entries are immutable once registered.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: BTreeMap<String, Arc<Node>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prototype; a key can only be registered once
    pub fn add(&mut self, key: impl Into<String>, node: Node) -> Result<Arc<Node>> {
        let key = key.into();
        if self.entries.contains_key(&key) {
            return Err(DddError::Catalog { key });
        }
        debug!(key = %key, node = %node.label(), "Catalog entry registered");
        let shared = Arc::new(node);
        self.entries.insert(key, shared.clone());
        Ok(shared)
    }

    pub fn get(&self, key: &str) -> Option<Arc<Node>> {
        self.entries.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// New instance of a registered prototype
    pub fn instance(&self, key: &str) -> Option<Instance> {
        self.entries.get(key).map(|proto| Instance::new(proto).keyed(key))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-link every instance in the tree; returns how many were linked
    pub fn relink_all(&self, root: &mut Node) -> usize {
        let mut linked = 0;
        if let Node::Instance(i) = root {
            if i.prototype().is_none() && i.relink(self) {
                linked += 1;
            }
        }
        for child in root.children_mut() {
            linked += self.relink_all(child);
        }
        linked
    }
}

/// Named materials shared across nodes
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    materials: BTreeMap<String, Arc<Material>>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a material under its name; names can only be used once
    pub fn register(&mut self, material: Material) -> Result<Arc<Material>> {
        if self.materials.contains_key(&material.name) {
            return Err(DddError::Catalog {
                key: format!("material:{}", material.name),
            });
        }
        let shared = material.shared();
        self.materials.insert(shared.name.clone(), shared.clone());
        Ok(shared)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Material>> {
        self.materials.get(name).cloned()
    }

    /// Registered material, or a new one with the given name
    pub fn get_or_register(&mut self, name: &str) -> Arc<Material> {
        self.materials
            .entry(name.to_string())
            .or_insert_with(|| Material::new(name).shared())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node3;

    #[test]
    fn test_refuses_reregistration() {
        let mut catalog = Catalog::new();
        catalog.add("lamp", Node3::group().into()).unwrap();
        let err = catalog.add("lamp", Node3::group().into()).unwrap_err();
        assert!(matches!(err, DddError::Catalog { ref key } if key == "lamp"));
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_relink_all_after_reload() {
        let mut catalog = Catalog::new();
        catalog.add("lamp", Node3::group().named("lamp").into()).unwrap();
        let mut root = Node::group3("root");
        root.append(catalog.instance("lamp").unwrap());
        root.append(catalog.instance("lamp").unwrap());

        let json = serde_json::to_string(&root).unwrap();
        let mut back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(catalog.relink_all(&mut back), 2);
        assert_eq!(catalog.relink_all(&mut back), 0);
    }

    #[test]
    fn test_materials() {
        let mut registry = MaterialRegistry::new();
        let grass = registry.register(Material::new("grass")).unwrap();
        assert!(registry.register(Material::new("grass")).is_err());
        assert!(Arc::ptr_eq(&grass, &registry.get_or_register("grass")));
        registry.get_or_register("asphalt");
        assert_eq!(registry.len(), 2);
    }
}
