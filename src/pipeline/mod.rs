// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Ordered, selector-driven task pipeline
//!
//! A pipeline owns the scene root, the shared data store, the catalog and
//! material registry, and the adjacency store. Tasks are registered with an
//! order key and optional dependencies; `run` schedules them once and
//! executes them one after the other on the calling thread.

pub mod cache;
mod data;
mod ordering;
mod report;
pub mod script;
mod task;

pub use data::{Adjacency, DataStore};
pub use ordering::{schedule, OrderKey, TaskNode};
pub use report::{RunReport, TaskFailure, TaskRun};
pub use task::{CacheKeyFn, Outcome, Task, TaskContext, TaskFn};

use crate::catalog::{Catalog, MaterialRegistry};
use crate::config::{DddConfig, ErrorPolicy};
use crate::error::{DddError, PipelineError, Result};
use crate::node::{Node, SceneNode};
use crate::select::Selection;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn, Level};

struct Registered {
    task: Task,
    order: OrderKey,
    selection: Option<Selection>,
}

/// Task runner holding the scene and everything tasks share
pub struct Pipeline {
    pub root: Node,
    pub data: DataStore,
    pub catalog: Catalog,
    pub materials: MaterialRegistry,
    pub adjacency: Adjacency,
    pub config: DddConfig,
    tasks: Vec<Registered>,
}

impl Pipeline {
    pub fn new(config: DddConfig) -> Self {
        Self::with_root(Node::group2("root"), config)
    }

    pub fn with_root(root: Node, config: DddConfig) -> Self {
        Self {
            root,
            data: DataStore::new(),
            catalog: Catalog::new(),
            materials: MaterialRegistry::new(),
            adjacency: Adjacency::new(),
            config,
            tasks: Vec::new(),
        }
    }

    /// Add a task. Names must be unique; selectors and order keys are
    /// validated here, so a malformed task never reaches `run`.
    pub fn register(&mut self, task: Task) -> Result<()> {
        if self.tasks.iter().any(|r| r.task.name == task.name) {
            return Err(PipelineError::DuplicateTask(task.name).into());
        }
        let order = OrderKey::resolve(task.order.as_deref(), self.tasks.last().map(|r| &r.order), &task.name)?;
        let selection = match task.expression() {
            Some(expression) => {
                let mut selection = Selection::parse(&expression)?.recurse(task.recurse);
                selection.filter = task.filter.clone();
                Some(selection)
            }
            None => None,
        };
        for (key, value) in &task.params {
            self.data.set_default(key.clone(), value.clone());
        }
        debug!(task = %task.name, order = %order, "Task registered");
        self.tasks.push(Registered { task, order, selection });
        Ok(())
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    fn task_nodes(&self) -> Vec<TaskNode> {
        self.tasks
            .iter()
            .map(|r| TaskNode {
                name: r.task.name.clone(),
                order: r.order.clone(),
                after: r.task.prerequisites(),
                before: r.task.before.clone(),
            })
            .collect()
    }

    /// Names and resolved order keys in execution order
    pub fn plan(&self) -> Result<Vec<(String, OrderKey)>> {
        let order = schedule(&self.task_nodes())?;
        Ok(order
            .into_iter()
            .map(|i| (self.tasks[i].task.name.clone(), self.tasks[i].order.clone()))
            .collect())
    }

    pub fn run(&mut self) -> Result<RunReport> {
        self.run_with(&mut |_, _, _| {})
    }

    /// Run every task, calling `progress(step, total, name)` before each one
    pub fn run_with(&mut self, progress: &mut dyn FnMut(usize, usize, &str)) -> Result<RunReport> {
        let order = schedule(&self.task_nodes())?;
        let tasks = std::mem::take(&mut self.tasks);
        let result = self.execute(&tasks, &order, progress);
        self.tasks = tasks;
        result
    }

    fn execute(
        &mut self,
        tasks: &[Registered],
        order: &[usize],
        progress: &mut dyn FnMut(usize, usize, &str),
    ) -> Result<RunReport> {
        let started = Instant::now();
        let mut report = RunReport::default();
        let resume = self.restore_cache(tasks, order);

        for (step, &i) in order.iter().enumerate() {
            let reg = &tasks[i];
            progress(step, order.len(), &reg.task.name);
            if resume.is_some_and(|last| step <= last) {
                report.tasks.push(TaskRun {
                    name: reg.task.name.clone(),
                    order: reg.order.to_string(),
                    matches: 0,
                    replaced: 0,
                    removed: 0,
                    cached: true,
                    elapsed: Default::default(),
                });
                continue;
            }

            let _span = tracing::span!(Level::INFO, "task", name = %reg.task.name, order = %reg.order).entered();
            if let Some(message) = &reg.task.log {
                info!("{message}");
            }
            let run = self.run_task(reg, &mut report)?;
            debug!(matches = run.matches, replaced = run.replaced, removed = run.removed, "Task done");
            report.tasks.push(run);

            if let Some(path) = self.cache_file(reg, step) {
                if let Err(e) = cache::save(&path, &self.root, &self.data) {
                    warn!(path = %path.display(), error = %e, "Could not write cache");
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            tasks = report.tasks_run(),
            cached = report.cached_skipped(),
            failures = report.failures.len(),
            "Pipeline finished in {:.1} ms",
            report.elapsed.as_secs_f64() * 1000.0
        );
        Ok(report)
    }

    fn cache_file(&self, reg: &Registered, step: usize) -> Option<PathBuf> {
        let key = reg.task.cache.as_ref()?;
        Some(cache::cache_path(&self.config.cache_dir, &key(&self.data), step))
    }

    /// Load the latest fresh cache, returning the step it was written after
    fn restore_cache(&mut self, tasks: &[Registered], order: &[usize]) -> Option<usize> {
        let max_age = self.config.cache_max_age();
        let (step, path) = order
            .iter()
            .enumerate()
            .filter_map(|(step, &i)| self.cache_file(&tasks[i], step).map(|p| (step, p)))
            .filter(|(_, path)| cache::is_fresh(path, max_age))
            .last()?;
        match cache::load(&path) {
            Ok((root, data)) => {
                self.root = root;
                self.data = data;
                let relinked = self.catalog.relink_all(&mut self.root);
                info!(path = %path.display(), step, relinked, "Resumed from cache");
                Some(step)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable cache ignored");
                None
            }
        }
    }

    fn run_task(&mut self, reg: &Registered, report: &mut RunReport) -> Result<TaskRun> {
        let started = Instant::now();
        let mut run = TaskRun {
            name: reg.task.name.clone(),
            order: reg.order.to_string(),
            matches: 0,
            replaced: 0,
            removed: 0,
            cached: false,
            elapsed: Default::default(),
        };

        match &reg.selection {
            None => {
                let mut ctx = TaskContext {
                    task: &reg.task.name,
                    root: &mut self.root,
                    obj: None,
                    data: &mut self.data,
                    catalog: &mut self.catalog,
                    materials: &mut self.materials,
                    adjacency: &mut self.adjacency,
                    config: &self.config,
                };
                match (reg.task.func)(&mut ctx) {
                    Ok(Outcome::Replace(node)) => {
                        self.root = node;
                        run.replaced += 1;
                    }
                    Ok(_) => {}
                    Err(e) => self.record_failure(&reg.task.name, None, e, report)?,
                }
            }
            Some(selection) => {
                let ids = selection.select_ids(&self.root);
                run.matches = ids.len();
                for id in ids {
                    // Earlier matches may have removed this one
                    let Some(mut obj) = self.root.find_by_id(id).cloned() else {
                        continue;
                    };
                    let label = obj.label();
                    let result = {
                        let mut ctx = TaskContext {
                            task: &reg.task.name,
                            root: &mut self.root,
                            obj: Some(&mut obj),
                            data: &mut self.data,
                            catalog: &mut self.catalog,
                            materials: &mut self.materials,
                            adjacency: &mut self.adjacency,
                            config: &self.config,
                        };
                        (reg.task.func)(&mut ctx)
                    };
                    match result {
                        Ok(Outcome::Keep) => {
                            self.root.replace_descendant(id, obj);
                        }
                        Ok(Outcome::Replace(node)) => {
                            self.root.replace_descendant(id, node);
                            run.replaced += 1;
                        }
                        Ok(Outcome::Remove) => {
                            self.root.remove_descendant(id);
                            self.adjacency.forget(id);
                            run.removed += 1;
                        }
                        Err(e) => self.record_failure(&reg.task.name, Some(label), e, report)?,
                    }
                }
            }
        }

        run.elapsed = started.elapsed();
        Ok(run)
    }

    /// Log and record a task error, then apply the error policy
    fn record_failure(
        &self,
        task: &str,
        label: Option<String>,
        error: anyhow::Error,
        report: &mut RunReport,
    ) -> Result<()> {
        let node = error
            .downcast_ref::<DddError>()
            .and_then(|e| e.node_label().map(str::to_string))
            .or(label);
        let message = format!("{error:#}");
        warn!(task, node = node.as_deref().unwrap_or("-"), error = %message, "Task failed");
        report.failures.push(TaskFailure {
            task: task.to_string(),
            node,
            message: message.clone(),
        });
        match self.config.error_policy {
            ErrorPolicy::Abort => Err(PipelineError::TaskFailed {
                task: task.to_string(),
                message,
            }
            .into()),
            ErrorPolicy::Continue => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::Query;
    use crate::shapes;
    use anyhow::Context;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn city() -> Pipeline {
        let mut features = Node::group2("Features");
        for i in 0..3 {
            let x = i as f64 * 2.0;
            features.append(shapes::rect([[x, 0.0], [x + 1.0, 1.0]]).named(format!("lot{i}")));
        }
        let mut root = Node::group2("root");
        root.append(features);
        root.append(Node::group3("Features3"));
        Pipeline::with_root(root, DddConfig::default())
    }

    fn height_tasks(p: &mut Pipeline) {
        p.register(
            Task::new("heights", |ctx| {
                ctx.obj()?.set("ddd:height", 2);
                Ok(Outcome::Keep)
            })
            .order("10")
            .path("/Features/*"),
        )
        .unwrap();
        p.register(
            Task::new("extrude", |ctx| {
                let obj = ctx.obj()?;
                let footprint = obj.as_2d().context("not planar")?;
                let h = footprint.get_f64("ddd:height").unwrap_or(1.0);
                let solid = footprint.extrude(h)?;
                ctx.root.find_mut("/Features3").context("no /Features3")?.append(solid);
                Ok(Outcome::Keep)
            })
            .order("20")
            .select(r#"["ddd:height" = 2]"#),
        )
        .unwrap();
    }

    #[test]
    fn test_ordered_tasks_extrude_features() {
        let mut p = city();
        // Registered out of order on purpose
        p.register(Task::new("report", |ctx| {
            let n = ctx.root.select("/Features3/*")?.len();
            ctx.data.set("solids", n);
            Ok(Outcome::Keep)
        }).order("30")).unwrap();
        height_tasks(&mut p);

        let report = p.run().unwrap();
        assert!(report.is_success());
        assert_eq!(report.tasks.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(), vec!["heights", "extrude", "report"]);
        assert_eq!(report.tasks[1].matches, 3);

        let features = p.root.select("/Features/*").unwrap().len();
        let solids = p.root.select("/Features3/*").unwrap();
        assert_eq!(solids.len(), features);
        assert!(solids.iter().all(|n| n.is_3d()));
        assert_eq!(p.data.get_f64("solids"), Some(3.0));
    }

    #[test]
    fn test_replace_and_remove() {
        let mut p = city();
        p.register(
            Task::new("drop_first", |ctx| Ok((ctx.obj()?.name() != Some("lot0")).into())).path("/Features/*"),
        )
        .unwrap();
        p.register(
            Task::new("grow", |ctx| {
                let grown = ctx.obj()?.as_2d().context("not planar")?.buffer(0.5)?;
                Ok(Outcome::Replace(grown.into()))
            })
            .path("/Features/lot1"),
        )
        .unwrap();
        let report = p.run().unwrap();
        assert_eq!(report.tasks[0].removed, 1);
        assert_eq!(report.tasks[1].replaced, 1);
        let lots = p.root.select("/Features/*").unwrap();
        assert_eq!(lots.len(), 2);
        assert!(lots[0].as_2d().unwrap().area() > 1.0);
    }

    #[test]
    fn test_registration_errors() {
        let mut p = city();
        p.register(Task::new("a", |_| Ok(Outcome::Keep))).unwrap();
        assert!(matches!(
            p.register(Task::new("a", |_| Ok(Outcome::Keep))),
            Err(DddError::Pipeline(PipelineError::DuplicateTask(_)))
        ));
        assert!(matches!(
            p.register(Task::new("b", |_| Ok(Outcome::Keep)).select("[broken")),
            Err(DddError::Selector { .. })
        ));
        assert_eq!(p.task_count(), 1);
    }

    #[test]
    fn test_unknown_dependency_fails_before_running() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut p = city();
        p.register(Task::new("a", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Outcome::Keep)
        }))
        .unwrap();
        p.register(Task::new("b", |_| Ok(Outcome::Keep)).after("ghost")).unwrap();
        assert!(matches!(
            p.run(),
            Err(DddError::Pipeline(PipelineError::UnknownDependency { .. }))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_error_policy() {
        let failing = || {
            Task::new("fail_on_lot1", |ctx| {
                let obj = ctx.obj()?;
                if obj.name() == Some("lot1") {
                    anyhow::bail!("cannot style lot1");
                }
                obj.set("styled", true);
                Ok(Outcome::Keep)
            })
            .path("/Features/*")
        };

        let mut p = city();
        p.register(failing()).unwrap();
        assert!(matches!(
            p.run(),
            Err(DddError::Pipeline(PipelineError::TaskFailed { .. }))
        ));

        let mut p = city();
        p.config.error_policy = ErrorPolicy::Continue;
        p.register(failing()).unwrap();
        let report = p.run().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].node.as_deref(), Some("lot1"));
        assert_eq!(p.root.select("/Features/*[styled]").unwrap().len(), 2);
    }

    #[test]
    fn test_params_and_cache_resume() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let build = |calls: Arc<AtomicUsize>| {
            let mut p = city();
            p.config.cache_dir = dir.path().to_path_buf();
            p.register(
                Task::new("heights", move |ctx| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let h = ctx.data.get_f64("default_height").unwrap_or(0.0);
                    ctx.obj()?.set("ddd:height", h);
                    Ok(Outcome::Keep)
                })
                .path("/Features/*")
                .param("default_height", 5.0)
                .cache(|_| "city".to_string()),
            )
            .unwrap();
            p
        };

        let mut first = build(calls.clone());
        first.run().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(dir.path().join("city.s0.cache").exists());

        let mut second = build(calls.clone());
        let report = second.run().unwrap();
        assert_eq!(report.cached_skipped(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(second.root.select(r#"/Features/*["ddd:height" = 5]"#).unwrap().len(), 3);
    }
}
