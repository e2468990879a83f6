// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Selector expression parser using pest

use super::{PathSegment, Predicate, Selector};
use crate::error::{DddError, Result};
use crate::node::Value;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use regex::Regex;

#[derive(Parser)]
#[grammar = "select/selector.pest"]
struct SelectorParser;

/// Parse a selector expression such as `/Features/*["ddd:height" = 2][!hidden]`
pub fn parse_selector(expression: &str) -> Result<Selector> {
    let fail = |message: String| DddError::selector(expression, message);

    let mut pairs = SelectorParser::parse(Rule::selector, expression).map_err(|e| fail(e.to_string()))?;
    let root = pairs.next().ok_or_else(|| fail("empty parse".into()))?;

    let mut path = None;
    let mut predicates = Vec::new();
    for pair in root.into_inner() {
        match pair.as_rule() {
            Rule::path => path = Some(parse_path(pair).map_err(&fail)?),
            Rule::predicate => predicates.push(parse_predicate(pair).map_err(&fail)?),
            _ => {}
        }
    }

    Ok(Selector {
        expression: expression.to_string(),
        path,
        predicates,
    })
}

fn parse_path(pair: Pair<Rule>) -> std::result::Result<Vec<PathSegment>, String> {
    pair.into_inner()
        .filter(|p| p.as_rule() == Rule::segment)
        .map(|p| segment(p.as_str()))
        .collect()
}

fn segment(text: &str) -> std::result::Result<PathSegment, String> {
    match text {
        "**" => Ok(PathSegment::Deep),
        "*" => Ok(PathSegment::Any),
        _ if text.contains('*') => {
            let pattern = text.split('*').map(regex::escape).collect::<Vec<_>>().join(".*");
            Regex::new(&format!("^{pattern}$"))
                .map(PathSegment::Glob)
                .map_err(|e| e.to_string())
        }
        _ => Ok(PathSegment::Name(text.to_string())),
    }
}

fn parse_predicate(pair: Pair<Rule>) -> std::result::Result<Predicate, String> {
    let inner = pair.into_inner().next().ok_or("empty predicate")?;
    match inner.as_rule() {
        Rule::absent => {
            let key = inner.into_inner().next().ok_or("missing key")?;
            Ok(Predicate::Absent(key_text(key)))
        }
        Rule::present => {
            let key = inner.into_inner().next().ok_or("missing key")?;
            Ok(Predicate::Present(key_text(key)))
        }
        Rule::test => {
            let mut parts = inner.into_inner();
            let (Some(key), Some(op), Some(value)) = (parts.next(), parts.next(), parts.next()) else {
                return Err("incomplete comparison".into());
            };
            let key = key_text(key);
            match op.as_str() {
                "=" => Ok(Predicate::Eq(key, value_literal(value))),
                "!=" => Ok(Predicate::Ne(key, value_literal(value))),
                _ => {
                    let pattern = value_text(value);
                    let regex = Regex::new(&pattern).map_err(|e| format!("bad regex '{pattern}': {e}"))?;
                    Ok(Predicate::Matches(key, regex))
                }
            }
        }
        rule => Err(format!("unexpected {rule:?}")),
    }
}

/// Key text with quotes removed
fn key_text(pair: Pair<Rule>) -> String {
    value_text(pair)
}

fn value_text(pair: Pair<Rule>) -> String {
    match pair.into_inner().next() {
        Some(inner) if inner.as_rule() == Rule::quoted => {
            inner.into_inner().next().map(|s| s.as_str().to_string()).unwrap_or_default()
        }
        Some(inner) => inner.as_str().trim().to_string(),
        None => String::new(),
    }
}

/// Quoted values are always strings; bare ones go through literal parsing
fn value_literal(pair: Pair<Rule>) -> Value {
    match pair.into_inner().next() {
        Some(inner) if inner.as_rule() == Rule::quoted => Value::String(
            inner.into_inner().next().map(|s| s.as_str().to_string()).unwrap_or_default(),
        ),
        Some(inner) => Value::parse_literal(inner.as_str()),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_and_predicates() {
        let s = parse_selector(r#"/Features/*["ddd:height" = 2][!hidden][kind ~ "^road"]"#).unwrap();
        let path = s.path.as_ref().unwrap();
        assert_eq!(path.len(), 2);
        assert!(matches!(&path[0], PathSegment::Name(n) if n == "Features"));
        assert!(matches!(path[1], PathSegment::Any));
        assert_eq!(s.predicates.len(), 3);
        assert!(matches!(&s.predicates[0], Predicate::Eq(k, Value::Int(2)) if k == "ddd:height"));
        assert!(matches!(&s.predicates[1], Predicate::Absent(k) if k == "hidden"));
        assert!(matches!(&s.predicates[2], Predicate::Matches(k, _) if k == "kind"));
    }

    #[test]
    fn test_literals() {
        let s = parse_selector(r#"["test:bool:true" = True][name != 'x'][flag][b=false]"#).unwrap();
        assert!(s.path.is_none());
        assert!(matches!(&s.predicates[0], Predicate::Eq(_, Value::Bool(true))));
        assert!(matches!(&s.predicates[1], Predicate::Ne(_, Value::String(v)) if v == "x"));
        assert!(matches!(&s.predicates[2], Predicate::Present(k) if k == "flag"));
        assert!(matches!(&s.predicates[3], Predicate::Eq(_, Value::Bool(false))));
    }

    #[test]
    fn test_deep_and_glob_segments() {
        let s = parse_selector("**/Build*").unwrap();
        let path = s.path.unwrap();
        assert!(matches!(path[0], PathSegment::Deep));
        assert!(matches!(&path[1], PathSegment::Glob(r) if r.is_match("Building_1") && !r.is_match("Tree")));
    }

    #[test]
    fn test_malformed_expressions() {
        for bad in ["[key = ", "/a[", "[]", "[k ~ \"(\"]", "/a/[x]"] {
            let err = parse_selector(bad).unwrap_err();
            assert!(matches!(err, DddError::Selector { .. }), "{bad} should fail");
        }
    }
}
