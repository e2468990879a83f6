// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Planar operations on [`Shape2`](crate::geometry::Shape2) values
//!
//! These are the free functions behind the [`Node2`](crate::node::Node2)
//! operation surface: set algebra, offsetting, cleaning and triangulation.

pub mod boolean;
pub mod buffer;
pub mod clean;
pub mod triangulate;

pub use boolean::{apply as boolean, union_all, BooleanOp};
pub use buffer::{buffer, circle, BufferOptions, CapStyle, JoinStyle};
pub use clean::{clean, convex_hull, remove_colinear, simplify};
pub use triangulate::{triangulate, triangulate_polygon, PlanarTriangulation};
