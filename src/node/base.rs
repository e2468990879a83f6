// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Node identity, shared node state and the common node interface

use super::{Material, Node, Value};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique node identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    pub fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::fresh()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = u64::deserialize(deserializer)?;
        // Ids loaded from a cache must never be handed out again
        NEXT_NODE_ID.fetch_max(raw + 1, Ordering::Relaxed);
        Ok(NodeId(raw))
    }
}

/// State shared by every node variant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeBase {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Arc<Material>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl NodeBase {
    pub fn named(name: Option<String>) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Same metadata, fresh id, no children
    pub fn metadata_copy(&self) -> Self {
        Self {
            id: NodeId::fresh(),
            name: self.name.clone(),
            attrs: self.attrs.clone(),
            material: self.material.clone(),
            children: Vec::new(),
        }
    }
}

/// Options for [`SceneNode::set_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetMode {
    /// Only set when the key is absent
    pub default: bool,
    /// Also set on every descendant
    pub children: bool,
}

/// Interface shared by 2D nodes, 3D nodes, instances and [`Node`] itself
pub trait SceneNode {
    fn base(&self) -> &NodeBase;
    fn base_mut(&mut self) -> &mut NodeBase;
    fn kind_name(&self) -> &'static str;

    fn id(&self) -> NodeId {
        self.base().id
    }

    fn name(&self) -> Option<&str> {
        self.base().name.as_deref()
    }

    fn set_name(&mut self, name: impl Into<String>)
    where
        Self: Sized,
    {
        self.base_mut().name = Some(name.into());
    }

    /// Builder form of [`SceneNode::set_name`]
    fn named(mut self, name: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.set_name(name);
        self
    }

    /// Name, or kind and id for anonymous nodes
    fn label(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("{}#{}", self.kind_name(), self.id()),
        }
    }

    fn children(&self) -> &[Node] {
        &self.base().children
    }

    fn children_mut(&mut self) -> &mut Vec<Node> {
        &mut self.base_mut().children
    }

    fn attrs(&self) -> &BTreeMap<String, Value> {
        &self.base().attrs
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.base().attrs.get(key)
    }

    fn get_or(&self, key: &str, default: impl Into<Value>) -> Value
    where
        Self: Sized,
    {
        self.get(key).cloned().unwrap_or_else(|| default.into())
    }

    fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn has(&self, key: &str) -> bool {
        self.base().attrs.contains_key(key)
    }

    fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self
    where
        Self: Sized,
    {
        self.set_with(key, value, SetMode::default())
    }

    fn set_with(&mut self, key: &str, value: impl Into<Value>, mode: SetMode) -> &mut Self
    where
        Self: Sized,
    {
        let value = value.into();
        set_recursive(self.base_mut(), key, &value, mode);
        self
    }

    /// Builder form of [`SceneNode::set`]
    fn with(mut self, key: &str, value: impl Into<Value>) -> Self
    where
        Self: Sized,
    {
        self.set(key, value);
        self
    }

    fn unset(&mut self, key: &str) -> Option<Value> {
        self.base_mut().attrs.remove(key)
    }

    /// Set on this node and on every descendant
    fn prop_set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self
    where
        Self: Sized,
    {
        self.set_with(
            key,
            value,
            SetMode {
                default: false,
                children: true,
            },
        )
    }

    /// Copy name, attributes and material from another node
    fn copy_from(&mut self, other: &dyn SceneNode) -> &mut Self
    where
        Self: Sized,
    {
        let src = other.base();
        let base = self.base_mut();
        base.name = src.name.clone();
        base.attrs = src.attrs.clone();
        base.material = src.material.clone();
        self
    }

    fn get_material(&self) -> Option<&Arc<Material>> {
        self.base().material.as_ref()
    }

    fn set_material(&mut self, material: Option<Arc<Material>>, include_children: bool) {
        set_material_recursive(self.base_mut(), &material, include_children);
    }

    /// Copy with the material assigned, recursively unless restricted
    fn material(&self, material: Option<Arc<Material>>, include_children: bool) -> Self
    where
        Self: Sized + Clone,
    {
        let mut out = self.copy();
        out.set_material(material, include_children);
        out
    }

    fn append(&mut self, child: impl Into<Node>) -> &mut Self
    where
        Self: Sized,
    {
        self.base_mut().children.push(child.into());
        self
    }

    /// Builder form of [`SceneNode::append`]
    fn with_child(mut self, child: impl Into<Node>) -> Self
    where
        Self: Sized,
    {
        self.append(child);
        self
    }

    /// Detach a direct child
    fn remove(&mut self, id: NodeId) -> Option<Node> {
        let children = &mut self.base_mut().children;
        let index = children.iter().position(|c| c.id() == id)?;
        Some(children.remove(index))
    }

    /// Detach a node anywhere below this one
    fn remove_descendant(&mut self, id: NodeId) -> Option<Node> {
        if let Some(node) = self.remove(id) {
            return Some(node);
        }
        self.base_mut()
            .children
            .iter_mut()
            .find_map(|c| c.remove_descendant(id))
    }

    /// Swap the node with the given id for `replacement`, returning the old node
    fn replace_descendant(&mut self, id: NodeId, replacement: Node) -> Option<Node> {
        let path = self.index_path(id)?;
        let (last, parents) = path.split_last()?;
        let mut children = &mut self.base_mut().children;
        for &i in parents {
            children = &mut children[i].base_mut().children;
        }
        Some(std::mem::replace(&mut children[*last], replacement))
    }

    /// Child indices leading from this node to the descendant with `id`
    fn index_path(&self, id: NodeId) -> Option<Vec<usize>> {
        for (i, child) in self.children().iter().enumerate() {
            if child.id() == id {
                return Some(vec![i]);
            }
            if let Some(mut rest) = child.index_path(id) {
                rest.insert(0, i);
                return Some(rest);
            }
        }
        None
    }

    fn find_by_id(&self, id: NodeId) -> Option<&Node> {
        self.children().iter().find_map(|c| {
            if c.id() == id {
                Some(c)
            } else {
                c.find_by_id(id)
            }
        })
    }

    fn find_by_id_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let path = self.index_path(id)?;
        let mut children = &mut self.base_mut().children;
        let (last, parents) = path.split_last()?;
        for &i in parents {
            children = &mut children[i].base_mut().children;
        }
        children.get_mut(*last)
    }

    /// Descendants in pre-order, excluding this node
    fn descendants(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        for child in self.children() {
            out.push(child);
            out.extend(child.descendants());
        }
        out
    }

    /// Assign fresh ids to this node and all descendants
    fn renew_ids(&mut self) {
        let base = self.base_mut();
        base.id = NodeId::fresh();
        for child in &mut base.children {
            child.renew_ids();
        }
    }

    /// Independent copy with fresh identities
    fn copy(&self) -> Self
    where
        Self: Sized + Clone,
    {
        let mut out = self.clone();
        out.renew_ids();
        out
    }
}

fn set_recursive(base: &mut NodeBase, key: &str, value: &Value, mode: SetMode) {
    if !(mode.default && base.attrs.contains_key(key)) {
        base.attrs.insert(key.to_string(), value.clone());
    }
    if mode.children {
        for child in &mut base.children {
            set_recursive(child.base_mut(), key, value, mode);
        }
    }
}

fn set_material_recursive(base: &mut NodeBase, material: &Option<Arc<Material>>, children: bool) {
    base.material = material.clone();
    if children {
        for child in &mut base.children {
            set_material_recursive(child.base_mut(), material, children);
        }
    }
}
