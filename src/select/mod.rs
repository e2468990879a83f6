// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Path and predicate queries over the node tree
//!
//! A selector is an optional path followed by bracketed predicates:
//!
//! ```text
//! /Features/*["ddd:height" = 2][!hidden][kind ~ "^road"]
//! ```
//!
//! Paths are anchored at the node the selection starts from, which is itself
//! never part of the result. `*` matches one level, `**` any number of levels,
//! and a segment containing `*` is a name glob. Predicates are ANDed.

mod matcher;
mod parser;

pub use matcher::{NodeFilter, Query, Selection};
pub use parser::parse_selector;

use crate::node::{Node, SceneNode, Value};
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// One component of a selector path
#[derive(Debug, Clone)]
pub enum PathSegment {
    /// Exact node name
    Name(String),
    /// Name glob such as `Building*`
    Glob(Regex),
    /// Exactly one level
    Any,
    /// Zero or more levels
    Deep,
}

impl PathSegment {
    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Name(n) => n == name,
            Self::Glob(r) => r.is_match(name),
            Self::Any | Self::Deep => true,
        }
    }
}

/// Attribute condition
#[derive(Debug, Clone)]
pub enum Predicate {
    Eq(String, Value),
    /// Also true when the attribute is missing
    Ne(String, Value),
    Matches(String, Regex),
    Present(String),
    Absent(String),
}

impl Predicate {
    pub fn test(&self, node: &dyn SceneNode) -> bool {
        match self {
            Self::Eq(key, value) => node.get(key).is_some_and(|v| v.loose_eq(value)),
            Self::Ne(key, value) => !node.get(key).is_some_and(|v| v.loose_eq(value)),
            Self::Matches(key, regex) => node.get(key).is_some_and(|v| match v {
                Value::String(s) => regex.is_match(s),
                other => regex.is_match(&other.to_string()),
            }),
            Self::Present(key) => node.has(key),
            Self::Absent(key) => !node.has(key),
        }
    }
}

/// Parsed selector expression
#[derive(Debug, Clone)]
pub struct Selector {
    expression: String,
    path: Option<Vec<PathSegment>>,
    predicates: Vec<Predicate>,
}

impl Selector {
    pub fn parse(expression: &str) -> crate::Result<Self> {
        parse_selector(expression)
    }

    /// Selector that matches every node
    pub fn all() -> Self {
        Self {
            expression: String::new(),
            path: None,
            predicates: Vec::new(),
        }
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn has_path(&self) -> bool {
        self.path.is_some()
    }

    /// Whether the names leading to the node, from below the selection root,
    /// satisfy the path
    pub fn path_matches(&self, names: &[&str]) -> bool {
        self.path.as_deref().map_or(true, |segments| match_path(segments, names))
    }

    pub fn predicates_match(&self, node: &Node) -> bool {
        self.predicates.iter().all(|p| p.test(node))
    }

    pub fn matches(&self, node: &Node, names: &[&str]) -> bool {
        self.path_matches(names) && self.predicates_match(node)
    }
}

impl FromStr for Selector {
    type Err = crate::DddError;

    fn from_str(s: &str) -> crate::Result<Self> {
        parse_selector(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

fn match_path(segments: &[PathSegment], names: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return names.is_empty();
    };
    match first {
        PathSegment::Deep => {
            match_path(rest, names) || (!names.is_empty() && match_path(segments, &names[1..]))
        }
        seg => names
            .split_first()
            .is_some_and(|(name, tail)| seg.matches(name) && match_path(rest, tail)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matching() {
        let s = Selector::parse("/Features/*").unwrap();
        assert!(s.path_matches(&["Features", "house"]));
        assert!(!s.path_matches(&["Features"]));
        assert!(!s.path_matches(&["Features", "house", "door"]));

        let deep = Selector::parse("**/door").unwrap();
        assert!(deep.path_matches(&["door"]));
        assert!(deep.path_matches(&["Features", "house", "door"]));
        assert!(!deep.path_matches(&["Features", "door", "knob"]));

        assert!(Selector::all().path_matches(&["anything", "at", "all"]));
    }

    #[test]
    fn test_predicates_on_missing_keys() {
        let node: Node = crate::shapes::point([0.0, 0.0]).with("kind", "tree").into();
        let yes = |e: &str| Selector::parse(e).unwrap().predicates_match(&node);
        assert!(yes("[kind = tree]"));
        assert!(yes("[height != 3]"));
        assert!(!yes("[height = 3]"));
        assert!(!yes("[height ~ '.*']"));
        assert!(yes("[!height]"));
        assert!(!yes("[height]"));
        assert!(yes("[kind ~ '^tr']"));
    }
}
