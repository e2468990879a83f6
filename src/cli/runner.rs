// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Script execution for the `ddd` binary

use crate::config::DddConfig;
use crate::io::{self, ExportFormat};
use crate::node::{Node, Value};
use crate::pipeline::script::Script;
use crate::pipeline::{OrderKey, Pipeline, RunReport};
use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Result of running a script
pub struct RunOutcome {
    pub report: RunReport,
    pub root: Node,
    pub plan: Vec<(String, OrderKey)>,
    pub export: Option<(PathBuf, ExportFormat)>,
    pub duration: Duration,
}

/// Loads scripts, applies parameters and runs the pipeline
pub struct Runner {
    config: DddConfig,
    params: Vec<(String, Value)>,
    progress: bool,
}

impl Runner {
    pub fn new(config: DddConfig) -> Self {
        Self {
            config,
            params: Vec::new(),
            progress: false,
        }
    }

    /// Parameters written over the script's own defaults
    pub fn with_params(mut self, params: Vec<(String, Value)>) -> Self {
        self.params = params;
        self
    }

    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Pipeline for a script with parameters applied, not yet run
    pub fn prepare(&self, script: &Path) -> Result<Pipeline> {
        let parsed = Script::load(script)
            .with_context(|| format!("Failed to load script {}", script.display()))?;
        let mut pipeline = parsed
            .build(self.config.clone())
            .with_context(|| format!("Failed to build pipeline from {}", script.display()))?;
        for (key, value) in &self.params {
            pipeline.data.set(key.clone(), value.clone());
        }
        Ok(pipeline)
    }

    pub fn run_script(&self, script: &Path, output: Option<&Path>) -> Result<RunOutcome> {
        let start = Instant::now();
        let mut pipeline = self.prepare(script)?;
        let plan = pipeline.plan()?;

        let report = if self.progress {
            let bar = ProgressBar::new(plan.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .context("Invalid progress template")?
                    .progress_chars("#>-"),
            );
            let report = pipeline.run_with(&mut |step, _, name| {
                bar.set_position(step as u64);
                bar.set_message(name.to_string());
            });
            bar.finish_and_clear();
            report?
        } else {
            pipeline.run()?
        };

        let export = match output {
            Some(path) => {
                if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("Failed to create {}", dir.display()))?;
                }
                let format = io::export(&pipeline.root, path)
                    .with_context(|| format!("Failed to export {}", path.display()))?;
                Some((path.to_path_buf(), format))
            }
            None => None,
        };

        Ok(RunOutcome {
            report,
            root: pipeline.root,
            plan,
            export,
            duration: start.elapsed(),
        })
    }
}

/// Parse a `key=value` command-line parameter
pub fn parse_param(text: &str) -> Result<(String, Value)> {
    let (key, value) = text
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{text}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("empty parameter name in '{text}'"));
    }
    Ok((key.to_string(), Value::parse_literal(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SceneNode;
    use crate::select::Query;
    use tempfile::tempdir;

    const SCRIPT: &str = r#"
[params]
floors = 2

[[features]]
name = "lot"
shape = "rect"
points = [[0, 0], [2, 2]]

[[tasks]]
name = "solid"
order = "10"
path = "/Features/lot"
action = "extrude"
height = 3
target = "/Features3"
"#;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("floors=3").unwrap(), ("floors".to_string(), Value::Int(3)));
        assert_eq!(
            parse_param("name = 'north'").unwrap(),
            ("name".to_string(), Value::String("north".into()))
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=3").is_err());
    }

    #[test]
    fn test_run_script_and_export() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("scene.toml");
        std::fs::write(&script, SCRIPT).unwrap();
        let output = dir.path().join("out/scene.json");

        let runner = Runner::new(DddConfig::default()).with_params(vec![("floors".into(), Value::Int(5))]);
        let pipeline = runner.prepare(&script).unwrap();
        assert_eq!(pipeline.data.get_f64("floors"), Some(5.0));

        let outcome = runner.run_script(&script, Some(&output)).unwrap();
        assert!(outcome.report.is_success());
        assert_eq!(outcome.plan.len(), 1);
        assert_eq!(outcome.export.as_ref().map(|(_, f)| *f), Some(ExportFormat::Json));
        assert!(output.exists());
        let solids = outcome.root.find("/Features3").unwrap();
        assert_eq!(solids.children().len(), 1);
    }

    #[test]
    fn test_missing_script_has_context() {
        let runner = Runner::new(DddConfig::default());
        let err = runner.run_script(Path::new("/nonexistent/scene.toml"), None).err().unwrap();
        assert!(format!("{err:#}").contains("Failed to load script"));
    }
}
