// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Shared utilities

pub mod math;
pub mod random;

pub use random::DddRandom;
