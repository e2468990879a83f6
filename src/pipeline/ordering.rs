// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Task order keys and dependency scheduling

use crate::error::PipelineError;
use ahash::AHashMap;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

/// Dotted numeric order key such as `30.50.1`. Shorter keys sort before
/// the keys they prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct OrderKey(Vec<u32>);

impl OrderKey {
    /// Resolve a key as written on a task. A `+` component copies the
    /// previous task's component at that position, or increments it when
    /// it is the last one. Tasks without a key follow the previous one.
    pub fn resolve(text: Option<&str>, previous: Option<&OrderKey>, task: &str) -> Result<OrderKey, PipelineError> {
        let invalid = || PipelineError::InvalidOrder {
            task: task.to_string(),
            key: text.unwrap_or_default().to_string(),
        };
        let Some(text) = text.map(str::trim) else {
            return Ok(match previous {
                Some(prev) => prev.next(),
                None => OrderKey(vec![0]),
            });
        };
        if text.is_empty() {
            return Err(invalid());
        }

        let parts: Vec<&str> = text.split('.').collect();
        let last = parts.len() - 1;
        let mut out = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let value = if *part == "+" {
                let prev = previous.and_then(|p| p.0.get(i)).copied();
                if i == last {
                    prev.map_or(1, |v| v + 1)
                } else {
                    prev.unwrap_or(0)
                }
            } else {
                part.trim().parse::<u32>().map_err(|_| invalid())?
            };
            out.push(value);
        }
        Ok(OrderKey(out))
    }

    fn next(&self) -> OrderKey {
        let mut parts = self.0.clone();
        if let Some(last) = parts.last_mut() {
            *last += 1;
        }
        OrderKey(parts)
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// Scheduling facts for one registered task
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub name: String,
    pub order: OrderKey,
    /// Tasks that must run first (`after` and `parent`)
    pub after: Vec<String>,
    /// Tasks that must run later
    pub before: Vec<String>,
}

/// Precedence graph between tasks
#[derive(Debug, Default)]
pub struct TaskGraph {
    successors: AHashMap<usize, Vec<usize>>,
    indegree: Vec<usize>,
}

impl TaskGraph {
    pub fn build(tasks: &[TaskNode]) -> Result<Self, PipelineError> {
        let index: AHashMap<&str, usize> = tasks.iter().enumerate().map(|(i, t)| (t.name.as_str(), i)).collect();
        let lookup = |task: &TaskNode, name: &str| {
            index.get(name).copied().ok_or_else(|| PipelineError::UnknownDependency {
                task: task.name.clone(),
                dependency: name.to_string(),
            })
        };

        let mut graph = TaskGraph {
            successors: AHashMap::new(),
            indegree: vec![0; tasks.len()],
        };
        for (i, task) in tasks.iter().enumerate() {
            for name in &task.after {
                graph.link(lookup(task, name)?, i);
            }
            for name in &task.before {
                graph.link(i, lookup(task, name)?);
            }
        }
        Ok(graph)
    }

    fn link(&mut self, from: usize, to: usize) {
        let list = self.successors.entry(from).or_default();
        if !list.contains(&to) {
            list.push(to);
            self.indegree[to] += 1;
        }
    }
}

/// Execution order: dependencies first, then ascending order key, then
/// registration order
pub fn schedule(tasks: &[TaskNode]) -> Result<Vec<usize>, PipelineError> {
    let mut graph = TaskGraph::build(tasks)?;
    let mut ready: BinaryHeap<Reverse<(&OrderKey, usize)>> = graph
        .indegree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| Reverse((&tasks[i].order, i)))
        .collect();

    let mut out = Vec::with_capacity(tasks.len());
    while let Some(Reverse((_, i))) = ready.pop() {
        out.push(i);
        for &next in graph.successors.get(&i).map(Vec::as_slice).unwrap_or_default() {
            graph.indegree[next] -= 1;
            if graph.indegree[next] == 0 {
                ready.push(Reverse((&tasks[next].order, next)));
            }
        }
    }

    if out.len() < tasks.len() {
        let stuck = (0..tasks.len())
            .filter(|i| graph.indegree[*i] > 0)
            .map(|i| tasks[i].name.clone())
            .collect();
        return Err(PipelineError::Cycle(stuck));
    }
    Ok(out)
}
