// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

use serde::Serialize;
use std::time::Duration;

/// Error recorded while the pipeline carried on
#[derive(Debug, Clone, Serialize)]
pub struct TaskFailure {
    pub task: String,
    /// Label of the match or of the node carried by the error
    pub node: Option<String>,
    pub message: String,
}

/// Per-task outcome
#[derive(Debug, Clone, Serialize)]
pub struct TaskRun {
    pub name: String,
    pub order: String,
    pub matches: usize,
    pub replaced: usize,
    pub removed: usize,
    pub cached: bool,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

/// Summary returned by a pipeline run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub tasks: Vec<TaskRun>,
    pub failures: Vec<TaskFailure>,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

impl RunReport {
    pub fn tasks_run(&self) -> usize {
        self.tasks.iter().filter(|t| !t.cached).count()
    }

    pub fn cached_skipped(&self) -> usize {
        self.tasks.iter().filter(|t| t.cached).count()
    }

    pub fn matches(&self) -> usize {
        self.tasks.iter().map(|t| t.matches).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64() * 1000.0)
    }
}
