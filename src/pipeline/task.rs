// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pipeline tasks

use super::data::{Adjacency, DataStore};
use crate::catalog::{Catalog, MaterialRegistry};
use crate::config::DddConfig;
use crate::node::{Node, Value};
use crate::select::NodeFilter;
use anyhow::anyhow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// What happens to a match after the task ran on it
#[derive(Debug, Clone, Default)]
pub enum Outcome {
    /// Keep the match, including any change made through `obj`
    #[default]
    Keep,
    /// Put this node where the match was
    Replace(Node),
    /// Detach the match from its parent
    Remove,
}

impl From<Node> for Outcome {
    fn from(node: Node) -> Self {
        Outcome::Replace(node)
    }
}

impl From<bool> for Outcome {
    fn from(keep: bool) -> Self {
        if keep {
            Outcome::Keep
        } else {
            Outcome::Remove
        }
    }
}

/// Everything a task callable can reach
pub struct TaskContext<'a> {
    pub task: &'a str,
    pub root: &'a mut Node,
    /// The current match, for tasks with a selection
    pub obj: Option<&'a mut Node>,
    pub data: &'a mut DataStore,
    pub catalog: &'a mut Catalog,
    pub materials: &'a mut MaterialRegistry,
    pub adjacency: &'a mut Adjacency,
    pub config: &'a DddConfig,
}

impl TaskContext<'_> {
    /// The current match; an error for tasks without a selection
    pub fn obj(&mut self) -> anyhow::Result<&mut Node> {
        let task = self.task;
        self.obj
            .as_deref_mut()
            .ok_or_else(|| anyhow!("task '{task}' has no selection, so no current object"))
    }
}

pub type TaskFn = Arc<dyn Fn(&mut TaskContext<'_>) -> anyhow::Result<Outcome> + Send + Sync>;

/// Cache file base name computed from the pipeline data
pub type CacheKeyFn = Arc<dyn Fn(&DataStore) -> String + Send + Sync>;

/// Callable plus its registration annotations
#[derive(Clone)]
pub struct Task {
    pub name: String,
    pub order: Option<String>,
    pub path: Option<String>,
    pub select: Option<String>,
    pub filter: Option<NodeFilter>,
    pub recurse: bool,
    pub parent: Option<String>,
    pub before: Vec<String>,
    pub after: Vec<String>,
    pub log: Option<String>,
    pub cache: Option<CacheKeyFn>,
    /// Defaults written into the pipeline data at registration
    pub params: BTreeMap<String, Value>,
    pub(crate) func: TaskFn,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("path", &self.path)
            .field("select", &self.select)
            .field("parent", &self.parent)
            .field("before", &self.before)
            .field("after", &self.after)
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        func: impl Fn(&mut TaskContext<'_>) -> anyhow::Result<Outcome> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            order: None,
            path: None,
            select: None,
            filter: None,
            recurse: true,
            parent: None,
            before: Vec::new(),
            after: Vec::new(),
            log: None,
            cache: None,
            params: BTreeMap::new(),
            func: Arc::new(func),
        }
    }

    pub fn order(mut self, key: impl Into<String>) -> Self {
        self.order = Some(key.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn select(mut self, predicates: impl Into<String>) -> Self {
        self.select = Some(predicates.into());
        self
    }

    pub fn filter(mut self, filter: impl Fn(&Node) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn parent(mut self, task: impl Into<String>) -> Self {
        self.parent = Some(task.into());
        self
    }

    pub fn before(mut self, task: impl Into<String>) -> Self {
        self.before.push(task.into());
        self
    }

    pub fn after(mut self, task: impl Into<String>) -> Self {
        self.after.push(task.into());
        self
    }

    pub fn log(mut self, message: impl Into<String>) -> Self {
        self.log = Some(message.into());
        self
    }

    pub fn cache(mut self, key: impl Fn(&DataStore) -> String + Send + Sync + 'static) -> Self {
        self.cache = Some(Arc::new(key));
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Selector expression made of the path followed by the predicates
    pub fn expression(&self) -> Option<String> {
        if self.path.is_none() && self.select.is_none() && self.filter.is_none() {
            return None;
        }
        Some(format!(
            "{}{}",
            self.path.as_deref().unwrap_or_default(),
            self.select.as_deref().unwrap_or_default()
        ))
    }

    /// Dependencies that must run first
    pub fn prerequisites(&self) -> Vec<String> {
        self.parent.iter().chain(&self.after).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_expression() {
        let task = Task::new("heights", |_| Ok(Outcome::Keep))
            .order("10.+")
            .path("/Features/*")
            .select("[kind = house]")
            .parent("setup")
            .after("load")
            .param("ddd:height", 3.0);
        assert_eq!(task.expression().as_deref(), Some("/Features/*[kind = house]"));
        assert_eq!(task.prerequisites(), vec!["setup", "load"]);
        assert_eq!(task.params.len(), 1);
        assert!(Task::new("once", |_| Ok(Outcome::Keep)).expression().is_none());
    }

    #[test]
    fn test_outcome_conversions() {
        assert!(matches!(Outcome::from(false), Outcome::Remove));
        assert!(matches!(Outcome::from(true), Outcome::Keep));
    }
}
