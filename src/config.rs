// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Kernel and pipeline configuration

use crate::error::{DddError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "ddd.toml";

/// What the pipeline does when a task fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    #[default]
    Abort,
    Continue,
}

impl FromStr for ErrorPolicy {
    type Err = DddError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(DddError::Config(format!("unknown error policy '{other}'"))),
        }
    }
}

impl fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Abort => "abort",
            Self::Continue => "continue",
        })
    }
}

/// Runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DddConfig {
    pub error_policy: ErrorPolicy,
    /// Directory for per-task cache files
    pub cache_dir: PathBuf,
    /// Cache files older than this are ignored; 0 disables expiry
    pub cache_max_age_secs: u64,
    /// Default tolerance for `clean`
    pub eps: f64,
    /// Default number of segments per quarter circle for discs
    pub default_resolution: usize,
    /// Extrusion failures return an error instead of an empty node
    pub extrusion_raise: bool,
    pub debug: bool,
}

impl Default for DddConfig {
    fn default() -> Self {
        Self {
            error_policy: ErrorPolicy::Abort,
            cache_dir: PathBuf::from(".ddd-cache"),
            cache_max_age_secs: 0,
            eps: 1e-8,
            default_resolution: 4,
            extrusion_raise: false,
            debug: false,
        }
    }
}

impl DddConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| DddError::Config(format!("{}: {e}", path.display())))
    }

    /// `ddd.toml` when present, otherwise defaults, then environment overrides
    pub fn load() -> Result<Self> {
        let mut config = if Path::new(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `DDD_CACHE_DIR`, `DDD_ERROR_POLICY` and `DDD_DEBUG` overrides
    /// read through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(dir) = lookup("DDD_CACHE_DIR") {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Some(policy) = lookup("DDD_ERROR_POLICY") {
            self.error_policy = policy.parse()?;
        }
        if let Some(debug) = lookup("DDD_DEBUG") {
            self.debug = matches!(debug.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| DddError::Config(e.to_string()))?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }

    pub fn cache_max_age(&self) -> Option<Duration> {
        (self.cache_max_age_secs > 0).then(|| Duration::from_secs(self.cache_max_age_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_env_overrides() {
        let mut config = DddConfig::default();
        config
            .apply_env(|key| match key {
                "DDD_CACHE_DIR" => Some("/tmp/ddd".into()),
                "DDD_ERROR_POLICY" => Some("Continue".into()),
                "DDD_DEBUG" => Some("1".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/ddd"));
        assert_eq!(config.error_policy, ErrorPolicy::Continue);
        assert!(config.debug);

        let err = config.apply_env(|key| (key == "DDD_ERROR_POLICY").then(|| "maybe".into()));
        assert!(matches!(err, Err(DddError::Config(_))));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ddd.toml");
        let config = DddConfig {
            eps: 1e-6,
            error_policy: ErrorPolicy::Continue,
            ..DddConfig::default()
        };
        config.save(&path).unwrap();
        assert_eq!(DddConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ddd.toml");
        std::fs::write(&path, "error_policy = \"continue\"\n").unwrap();
        let config = DddConfig::from_file(&path).unwrap();
        assert_eq!(config.error_policy, ErrorPolicy::Continue);
        assert_eq!(config.default_resolution, 4);
        assert!(config.cache_max_age().is_none());
    }
}
