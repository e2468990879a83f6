// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! ddd scene kernel
//!
//! Procedural 2D/3D scene modelling: planar nodes built from primitives and
//! set operations, extruded and stepped into meshes, organised in a node tree
//! and rewritten by an ordered pipeline of selector-driven tasks.
//!
//! ```no_run
//! use ddd::prelude::*;
//!
//! let house = ddd::shapes::rect([[0.0, 0.0], [4.0, 7.0]]).extrude(3.0)?;
//! assert!((house.volume() - 84.0).abs() < 1e-9);
//! # Ok::<(), ddd::DddError>(())
//! ```

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod extrude;
pub mod geometry;
pub mod io;
pub mod meshops;
pub mod node;
pub mod ops2d;
pub mod pipeline;
pub mod select;
pub mod shapes;
pub mod utils;

pub use catalog::{Catalog, MaterialRegistry};
pub use config::{DddConfig, ErrorPolicy};
pub use error::{DddError, PipelineError, Result};
pub use extrude::{ExtrusionMethod, StepOptions};
pub use geometry::{BoundingBox, Mesh, Path2, Shape2};
pub use node::{Instance, Material, Node, Node2, Node3, NodeId, SceneNode, Transform, Value};
pub use pipeline::{DataStore, Outcome, Pipeline, RunReport, Task, TaskContext};
pub use select::{Query, Selection};
pub use utils::DddRandom;

/// Traits and types most scripts need
pub mod prelude {
    pub use crate::meshops::uv::UvMap;
    pub use crate::node::{Node, Node2, Node3, SceneNode, Value};
    pub use crate::pipeline::{Outcome, Pipeline, Task, TaskContext};
    pub use crate::select::Query;
    pub use crate::shapes;
}
