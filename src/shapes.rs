// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Primitive constructors for planar and mesh nodes
//!
//! Planar constructors accept 2D or 3D coordinates. Z is kept as a vertex
//! height on the node. Solid exteriors are wound counter-clockwise.

use crate::error::{DddError, Result};
use crate::geometry::shape2::close_ring;
use crate::geometry::{Primitive, Shape2};
use crate::node::{Node2, Node3};
use crate::ops2d::circle;
use geo::{LineString, Point, Polygon};
use nalgebra::{Point2, Vector3};
use std::f64::consts::TAU;

/// Coordinate accepted by the planar constructors
pub trait IntoXY {
    fn xy(&self) -> [f64; 2];

    fn z(&self) -> f64 {
        0.0
    }
}

impl IntoXY for [f64; 2] {
    fn xy(&self) -> [f64; 2] {
        *self
    }
}

impl IntoXY for [f64; 3] {
    fn xy(&self) -> [f64; 2] {
        [self[0], self[1]]
    }

    fn z(&self) -> f64 {
        self[2]
    }
}

impl IntoXY for (f64, f64) {
    fn xy(&self) -> [f64; 2] {
        [self.0, self.1]
    }
}

impl IntoXY for (f64, f64, f64) {
    fn xy(&self) -> [f64; 2] {
        [self.0, self.1]
    }

    fn z(&self) -> f64 {
        self.2
    }
}

impl IntoXY for Point2<f64> {
    fn xy(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

fn heights<P: IntoXY>(points: &[P]) -> Vec<([f64; 2], f64)> {
    points.iter().map(|p| (p.xy(), p.z())).collect()
}

pub fn point(p: impl IntoXY) -> Node2 {
    let [x, y] = p.xy();
    Node2::new(Shape2::Point(Point::new(x, y))).with_heights([([x, y], p.z())])
}

/// Line string; at least two vertices
pub fn line<P: IntoXY>(points: &[P]) -> Result<Node2> {
    if points.len() < 2 {
        return Err(DddError::geometry_msg(
            "line",
            format!("a line needs at least 2 vertices, got {}", points.len()),
        ));
    }
    let coords: Vec<(f64, f64)> = points.iter().map(|p| p.xy()).map(|[x, y]| (x, y)).collect();
    Ok(Node2::new(Shape2::Line(LineString::from(coords))).with_heights(heights(points)))
}

/// Polygon from an exterior ring, closed automatically and wound CCW
pub fn polygon<P: IntoXY>(points: &[P]) -> Result<Node2> {
    let mut ring: Vec<Point2<f64>> = points
        .iter()
        .map(|p| {
            let [x, y] = p.xy();
            Point2::new(x, y)
        })
        .collect();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        return Err(DddError::geometry_msg(
            "polygon",
            format!("a polygon needs at least 3 vertices, got {}", ring.len()),
        ));
    }
    let shape = Shape2::Polygon(Polygon::new(close_ring(&ring), Vec::new()));
    Ok(Node2::new(shape.oriented()).with_heights(heights(points)))
}

/// Axis-aligned rectangle from two opposite corners
pub fn rect(bounds: [[f64; 2]; 2]) -> Node2 {
    let [[x0, y0], [x1, y1]] = bounds;
    let (min_x, max_x) = (x0.min(x1), x0.max(x1));
    let (min_y, max_y) = (y0.min(y1), y0.max(y1));
    let ring = [
        Point2::new(min_x, min_y),
        Point2::new(max_x, min_y),
        Point2::new(max_x, max_y),
        Point2::new(min_x, max_y),
    ];
    Node2::new(Shape2::Polygon(Polygon::new(close_ring(&ring), Vec::new())))
}

/// Rectangle of the given size with a corner on the origin
pub fn rect_size(size: [f64; 2]) -> Node2 {
    rect([[0.0, 0.0], size])
}

/// Circle approximation with `4 * resolution` vertices
pub fn disc(center: impl IntoXY, r: f64, resolution: usize) -> Node2 {
    let [x, y] = center.xy();
    Node2::new(Shape2::Polygon(circle(Point2::new(x, y), r, resolution)))
}

/// Regular polygon centred on the origin, first vertex on +X
pub fn regular_polygon(sides: usize, r: f64) -> Node2 {
    let n = sides.max(3);
    let ring: Vec<Point2<f64>> = (0..n)
        .map(|i| {
            let a = TAU * i as f64 / n as f64;
            Point2::new(r * a.cos(), r * a.sin())
        })
        .collect();
    Node2::new(Shape2::Polygon(Polygon::new(close_ring(&ring), Vec::new())))
}

// Meshes

/// Axis-aligned box between two corners
pub fn cuboid(min: [f64; 3], max: [f64; 3]) -> Node3 {
    let (min, max) = (Vector3::from(min), Vector3::from(max));
    let mut mesh = Primitive::cube(max - min, false).to_mesh();
    mesh.translate(&min);
    Node3::new(mesh)
}

/// UV sphere centred on the origin
pub fn sphere(r: f64, segments: u32) -> Node3 {
    Node3::new(Primitive::sphere(r, segments).to_mesh())
}

/// Cylinder standing on z = 0
pub fn cylinder(h: f64, r: f64, segments: u32) -> Node3 {
    Node3::new(Primitive::cylinder(h, r, segments).to_mesh())
}

/// Cone standing on z = 0 with its apex at z = h
pub fn cone(h: f64, r: f64, segments: u32) -> Node3 {
    Node3::new(Primitive::cone(h, r, 0.0, segments).to_mesh())
}
