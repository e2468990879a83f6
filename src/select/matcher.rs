// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

use super::Selector;
use crate::error::Result;
use crate::node::{Node, NodeId, SceneNode};
use std::fmt;
use std::sync::Arc;

/// Programmatic condition added to a selection
pub type NodeFilter = Arc<dyn Fn(&Node) -> bool + Send + Sync>;

/// Selector plus traversal options
#[derive(Clone)]
pub struct Selection {
    pub selector: Selector,
    /// When false only direct children of the starting node are considered
    pub recurse: bool,
    pub filter: Option<NodeFilter>,
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("selector", &self.selector.expression())
            .field("recurse", &self.recurse)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

impl Selection {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            recurse: true,
            filter: None,
        }
    }

    pub fn parse(expression: &str) -> Result<Self> {
        Ok(Self::new(Selector::parse(expression)?))
    }

    pub fn recurse(mut self, recurse: bool) -> Self {
        self.recurse = recurse;
        self
    }

    pub fn filter(mut self, filter: impl Fn(&Node) -> bool + Send + Sync + 'static) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    fn accepts(&self, node: &Node, names: &[&str]) -> bool {
        self.selector.matches(node, names) && self.filter.as_ref().map_or(true, |f| f(node))
    }

    /// Matches below `root` in pre-order
    pub fn select<'a>(&self, root: &'a dyn SceneNode) -> Vec<&'a Node> {
        let mut out = Vec::new();
        let mut names = Vec::new();
        for child in root.children() {
            self.visit(child, &mut names, &mut out);
        }
        out
    }

    fn visit<'a>(&self, node: &'a Node, names: &mut Vec<&'a str>, out: &mut Vec<&'a Node>) {
        names.push(node.name().unwrap_or(""));
        if self.accepts(node, names) {
            out.push(node);
        }
        if self.recurse {
            for child in node.children() {
                self.visit(child, names, out);
            }
        }
        names.pop();
    }

    pub fn select_ids(&self, root: &dyn SceneNode) -> Vec<NodeId> {
        self.select(root).into_iter().map(|n| n.id()).collect()
    }
}

/// Selection queries on any node
pub trait Query: SceneNode {
    /// Nodes below this one matching `expression`, in pre-order
    fn select(&self, expression: &str) -> Result<Vec<&Node>>
    where
        Self: Sized,
    {
        Ok(Selection::parse(expression)?.select(self))
    }

    /// First node at `path`, e.g. `/Features/house`
    fn find(&self, path: &str) -> Option<&Node>
    where
        Self: Sized,
    {
        let selection = Selection::parse(path).ok()?;
        selection.select(self).into_iter().next()
    }

    fn find_mut(&mut self, path: &str) -> Option<&mut Node>
    where
        Self: Sized,
    {
        let id = self.find(path)?.id();
        self.find_by_id_mut(id)
    }
}

impl<T: SceneNode> Query for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;

    fn tree() -> Node {
        let mut root = Node::group2("root");
        let mut features = Node::group2("Features");
        let mut house = shapes::rect([[0.0, 0.0], [1.0, 1.0]]).named("house").with("ddd:height", 2);
        house.append(shapes::point([0.5, 0.5]).named("door").with("kind", "door"));
        features.append(house);
        features.append(shapes::rect([[2.0, 0.0], [3.0, 1.0]]).named("shed"));
        root.append(features);
        root.append(Node::group3("Features3"));
        root
    }

    #[test]
    fn test_select_pre_order() {
        let root = tree();
        let all = Selection::new(Selector::all()).select(&root);
        let names: Vec<_> = all.iter().map(|n| n.name().unwrap()).collect();
        assert_eq!(names, vec!["Features", "house", "door", "shed", "Features3"]);

        let direct = Selection::new(Selector::all()).recurse(false).select(&root);
        assert_eq!(direct.len(), 2);
    }

    #[test]
    fn test_path_predicate_and_filter() {
        let root = tree();
        let children = root.select("/Features/*").unwrap();
        assert_eq!(children.len(), 2);
        let tall = root.select(r#"/Features/*["ddd:height" = 2]"#).unwrap();
        assert_eq!(tall.len(), 1);
        assert_eq!(tall[0].name(), Some("house"));

        let filtered = Selection::parse("**/*")
            .unwrap()
            .filter(|n| n.as_2d().is_some_and(|n| n.area() > 0.0))
            .select(&root);
        assert_eq!(filtered.len(), 2);

        assert_eq!(root.find("/Features/house/door").map(|n| n.get_str("kind")), Some(Some("door")));
        assert!(root.find("/Nope").is_none());
    }

    #[test]
    fn test_selection_is_stable() {
        let root = tree();
        let selection = Selection::parse("**/*[!missing]").unwrap();
        assert_eq!(selection.select_ids(&root), selection.select_ids(&root));
    }

    #[test]
    fn test_find_mut_edits_in_place() {
        let mut root = tree();
        root.find_mut("/Features/shed").unwrap().set("ddd:height", 4);
        assert_eq!(root.find("/Features/shed").unwrap().get_f64("ddd:height"), Some(4.0));
    }
}
