// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CLI subsystem for the `ddd` binary

pub mod reporter;
pub mod runner;

pub use reporter::{format_tree, Reporter};
pub use runner::{parse_param, RunOutcome, Runner};

use tracing_subscriber::EnvFilter;

/// Install the global subscriber; `RUST_LOG` wins over `debug`
pub fn init_logging(debug: bool) {
    let default = if debug { "ddd=debug" } else { "ddd=info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_target(debug)
        .try_init();
}
