// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! State shared between pipeline tasks

use crate::node::{NodeId, Value};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named values read and written by tasks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataStore(BTreeMap<String, Value>);

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Insert only when the key is not set yet
    pub fn set_default(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Undirected relations between nodes (way connections, building
/// contacts) kept outside the tree
#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    edges: AHashMap<NodeId, Vec<NodeId>>,
}

impl Adjacency {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the relation already existed
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> bool {
        if a == b || self.connected(a, b) {
            return false;
        }
        self.edges.entry(a).or_default().push(b);
        self.edges.entry(b).or_default().push(a);
        true
    }

    pub fn disconnect(&mut self, a: NodeId, b: NodeId) -> bool {
        let mut removed = false;
        for (from, to) in [(a, b), (b, a)] {
            if let Some(list) = self.edges.get_mut(&from) {
                let before = list.len();
                list.retain(|n| *n != to);
                removed |= list.len() != before;
            }
        }
        removed
    }

    pub fn connected(&self, a: NodeId, b: NodeId) -> bool {
        self.edges.get(&a).is_some_and(|l| l.contains(&b))
    }

    /// Neighbours in ascending id order
    pub fn neighbours(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = self.edges.get(&id).cloned().unwrap_or_default();
        out.sort();
        out
    }

    /// Drop every relation involving `id`
    pub fn forget(&mut self, id: NodeId) {
        if let Some(list) = self.edges.remove(&id) {
            for other in list {
                if let Some(back) = self.edges.get_mut(&other) {
                    back.retain(|n| *n != id);
                }
            }
        }
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(Vec::len).sum::<usize>() / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_store_defaults() {
        let mut data = DataStore::new();
        data.set("ddd:way:width", 4.0);
        data.set_default("ddd:way:width", 8.0);
        data.set_default("ddd:way:lanes", 2);
        assert_eq!(data.get_f64("ddd:way:width"), Some(4.0));
        assert_eq!(data.get_f64("ddd:way:lanes"), Some(2.0));
        assert!(data.get_str("missing").is_none());
    }

    #[test]
    fn test_adjacency() {
        let (a, b, c) = (NodeId::fresh(), NodeId::fresh(), NodeId::fresh());
        let mut adj = Adjacency::new();
        assert!(adj.connect(a, b));
        assert!(!adj.connect(b, a));
        assert!(adj.connect(a, c));
        assert_eq!(adj.neighbours(a), vec![b, c]);
        assert_eq!(adj.edge_count(), 2);
        adj.forget(a);
        assert!(adj.neighbours(b).is_empty());
        assert_eq!(adj.edge_count(), 0);
    }
}
