// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Extrusion engine
//!
//! Planar footprints are lifted into closed meshes one ring at a time. A
//! straight extrusion is a single step from a shape to itself; an extrude
//! step stitches the last ring of a partial extrusion to a new shape, which
//! may be scaled, shifted or degenerate down to a line or a point.

mod align;
mod step;
mod straight;
mod sweep;

pub use align::{ring_from_line, vertex_order_align_snap};
pub use step::{extrude_step, initial_state};
pub use straight::{extrude, extrude_lines};
pub use sweep::{sweep, SweepOptions};

use crate::geometry::Shape2;
use serde::{Deserialize, Serialize};

/// Stitching strategy between two consecutive rings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtrusionMethod {
    /// Pair ring vertices by normalized perimeter position
    #[default]
    Correspondence,
    /// Vertical walls of the new shape plus a flat ledge covering the
    /// difference between both shapes
    Subtract,
}

/// Options of an extrude step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepOptions {
    pub method: ExtrusionMethod,
    /// Emit the bottom face on the first step
    pub base: bool,
    /// Emit the top face; it is replaced when another step follows
    pub cap: bool,
    /// Fail instead of returning an empty-tagged node on invalid input
    pub raise: bool,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            method: ExtrusionMethod::Correspondence,
            base: true,
            cap: true,
            raise: false,
        }
    }
}

impl StepOptions {
    pub fn with_method(mut self, method: ExtrusionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_base(mut self, base: bool) -> Self {
        self.base = base;
        self
    }

    pub fn with_cap(mut self, cap: bool) -> Self {
        self.cap = cap;
        self
    }

    pub fn raising(mut self, raise: bool) -> Self {
        self.raise = raise;
        self
    }
}

/// Book-keeping of a partially built extrusion, kept on the produced node
/// so further steps can chain from it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtrusionState {
    /// Steps applied so far
    pub steps: usize,
    /// Planar shape the extrusion started from
    pub footprint: Shape2,
    /// Shape of the current top ring
    pub last_shape: Shape2,
    /// Height of the current top ring
    pub last_z: f64,
    /// Faces of the current top cap, removed when the next step is stitched
    pub cap_faces: Vec<usize>,
}
