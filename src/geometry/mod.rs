// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - planar shapes, paths, meshes and mesh operations

pub mod analytics;
mod bbox;
pub mod csg;
mod mesh;
pub mod mesh_utils;
pub mod path;
mod primitives;
pub mod shape2;

pub use analytics::{analyze, SceneStats};
pub use bbox::BoundingBox;
pub use mesh::{Mesh, Triangle, Vertex};
pub use path::{Path2, PathSegment, SegmentPosition, SegmentProjection, Side};
pub use primitives::Primitive;
pub use shape2::{Shape2, ShapeKind};
