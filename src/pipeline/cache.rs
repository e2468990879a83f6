// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Per-task snapshots of the tree, stored as `<base>.s<step>.cache`

use super::data::DataStore;
use crate::error::Result;
use crate::node::Node;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    root: Node,
    data: DataStore,
}

pub fn cache_path(dir: &Path, base: &str, step: usize) -> PathBuf {
    dir.join(format!("{base}.s{step}.cache"))
}

/// Whether `path` exists and is younger than `max_age`
pub fn is_fresh(path: &Path, max_age: Option<Duration>) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    match max_age {
        None => true,
        Some(max_age) => meta
            .modified()
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok())
            .is_some_and(|age| age <= max_age),
    }
}

pub fn save(path: &Path, root: &Node, data: &DataStore) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let snapshot = SnapshotRef { root, data };
    std::fs::write(path, serde_json::to_vec(&snapshot)?)?;
    debug!(path = %path.display(), "Cache written");
    Ok(())
}

pub fn load(path: &Path) -> Result<(Node, DataStore)> {
    let bytes = std::fs::read(path)?;
    let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
    Ok((snapshot.root, snapshot.data))
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    root: &'a Node,
    data: &'a DataStore,
}
