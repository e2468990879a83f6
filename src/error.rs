// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types shared by the kernel

use crate::node::{Node, SceneNode};
use thiserror::Error;

/// Result alias used throughout the kernel
pub type Result<T> = std::result::Result<T, DddError>;

/// Kernel error
#[derive(Debug, Error)]
pub enum DddError {
    /// An operation could not produce a valid planar or mesh geometry.
    /// Carries a copy of the offending node when one is available.
    #[error("geometry error on '{label}': {message}")]
    Geometry {
        label: String,
        message: String,
        node: Option<Box<Node>>,
    },

    #[error("extrusion error on '{label}': {message}")]
    Extrusion {
        label: String,
        message: String,
        node: Option<Box<Node>>,
    },

    #[error("invalid selector '{expression}': {message}")]
    Selector { expression: String, message: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("catalog key already registered: {key}")]
    Catalog { key: String },

    #[error("export error: {0}")]
    Export(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl DddError {
    /// Geometry error tagged with the node that caused it
    pub fn geometry(node: impl Into<Node>, message: impl Into<String>) -> Self {
        let node: Node = node.into();
        Self::Geometry {
            label: node.label(),
            message: message.into(),
            node: Some(Box::new(node)),
        }
    }

    /// Geometry error without a node attached
    pub fn geometry_msg(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Geometry {
            label: label.into(),
            message: message.into(),
            node: None,
        }
    }

    pub fn extrusion(node: impl Into<Node>, message: impl Into<String>) -> Self {
        let node: Node = node.into();
        Self::Extrusion {
            label: node.label(),
            message: message.into(),
            node: Some(Box::new(node)),
        }
    }

    pub fn selector(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Selector {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// The node carried by geometry and extrusion errors
    pub fn node(&self) -> Option<&Node> {
        match self {
            Self::Geometry { node, .. } | Self::Extrusion { node, .. } => node.as_deref(),
            _ => None,
        }
    }

    /// Label of the offending node, if the error refers to one
    pub fn node_label(&self) -> Option<&str> {
        match self {
            Self::Geometry { label, .. } | Self::Extrusion { label, .. } => Some(label),
            _ => None,
        }
    }

    /// Whether a caller may skip the failing item and carry on
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Geometry { .. } | Self::Extrusion { .. })
    }
}

/// Errors raised while registering or ordering pipeline tasks
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("cyclic task ordering involving: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("task registered twice: {0}")]
    DuplicateTask(String),

    #[error("invalid order key '{key}' on task '{task}'")]
    InvalidOrder { task: String, key: String },

    #[error("task '{task}' failed: {message}")]
    TaskFailed { task: String, message: String },
}
