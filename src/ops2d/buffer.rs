// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Offsetting (buffer) of planar shapes
//!
//! The buffer of a shape is assembled from simple pieces unioned together:
//! a strip around every segment, a join wedge at every convex vertex and a
//! cap at every open line end. Positive distances union the pieces with the
//! shape; negative distances subtract them.

use super::boolean::union_polygons;
use super::clean::remove_colinear;
use crate::error::Result;
use crate::geometry::shape2::{close_ring, open_ring, to_point2};
use crate::geometry::Shape2;
use geo::{BooleanOps, LineString, MultiPolygon, Polygon};
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapStyle {
    #[default]
    Round,
    Flat,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinStyle {
    #[default]
    Round,
    Mitre,
    Bevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BufferOptions {
    /// Segments per quarter circle
    pub resolution: usize,
    pub cap_style: CapStyle,
    pub join_style: JoinStyle,
    /// Longest allowed mitre, as a multiple of the distance
    pub mitre_limit: f64,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            resolution: 8,
            cap_style: CapStyle::Round,
            join_style: JoinStyle::Round,
            mitre_limit: 5.0,
        }
    }
}

impl BufferOptions {
    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution.max(1);
        self
    }

    pub fn with_cap(mut self, cap_style: CapStyle) -> Self {
        self.cap_style = cap_style;
        self
    }

    pub fn with_join(mut self, join_style: JoinStyle) -> Self {
        self.join_style = join_style;
        self
    }
}

fn polygon_from(points: &[Point2<f64>]) -> Polygon<f64> {
    Polygon::new(close_ring(points), vec![])
}

fn mp(poly: Polygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(vec![poly])
}

/// Regular polygon approximating a circle
pub fn circle(center: Point2<f64>, radius: f64, resolution: usize) -> Polygon<f64> {
    let n = 4 * resolution.max(1);
    let points: Vec<Point2<f64>> = (0..n)
        .map(|i| {
            let a = std::f64::consts::TAU * i as f64 / n as f64;
            center + Vector2::new(a.cos(), a.sin()) * radius
        })
        .collect();
    polygon_from(&points)
}

fn left_normal(a: &Point2<f64>, b: &Point2<f64>) -> Option<Vector2<f64>> {
    let d = b - a;
    let len = d.norm();
    (len > 1e-12).then(|| Vector2::new(-d.y, d.x) / len)
}

/// Rectangle covering every point within `d` of segment `ab`, ends excluded
fn strip(a: &Point2<f64>, b: &Point2<f64>, d: f64) -> Option<Polygon<f64>> {
    let n = left_normal(a, b)? * d;
    Some(polygon_from(&[a - n, b - n, b + n, a + n]))
}

/// Piece filling the gap between the strips of two consecutive segments
fn join(
    prev: &Point2<f64>,
    v: &Point2<f64>,
    next: &Point2<f64>,
    d: f64,
    opts: &BufferOptions,
) -> Option<Polygon<f64>> {
    let n1 = left_normal(prev, v)?;
    let n2 = left_normal(v, next)?;
    let turn = (v - prev).perp(&(next - v));
    let dot = n1.dot(&n2);
    if turn.abs() < 1e-12 && dot > 0.0 {
        // Straight continuation
        return None;
    }
    if opts.join_style == JoinStyle::Round {
        return Some(circle(*v, d, opts.resolution));
    }
    // The gap opens on the side away from the turn
    let side = if turn > 0.0 { -1.0 } else { 1.0 };
    let (o1, o2) = (n1 * side, n2 * side);
    let bevel = polygon_from(&[*v, v + o1 * d, v + o2 * d]);
    if opts.join_style == JoinStyle::Bevel {
        return Some(bevel);
    }
    let denom = 1.0 + o1.dot(&o2);
    if denom < 1e-9 {
        return Some(bevel);
    }
    let mitre = (o1 + o2) * (d / denom);
    if mitre.norm() > opts.mitre_limit * d {
        return Some(bevel);
    }
    Some(polygon_from(&[*v, v + o1 * d, v + mitre, v + o2 * d]))
}

/// End cap at `end`, for a line arriving from `from`
fn cap(from: &Point2<f64>, end: &Point2<f64>, d: f64, opts: &BufferOptions) -> Option<Polygon<f64>> {
    match opts.cap_style {
        CapStyle::Flat => None,
        CapStyle::Round => Some(circle(*end, d, opts.resolution)),
        CapStyle::Square => {
            let n = left_normal(from, end)? * d;
            let t = Vector2::new(n.y, -n.x);
            Some(polygon_from(&[end - n, end - n + t, end + n + t, end + n]))
        }
    }
}

/// Pieces around a closed ring
fn ring_pieces(points: &[Point2<f64>], d: f64, opts: &BufferOptions, out: &mut Vec<MultiPolygon<f64>>) {
    let n = points.len();
    if n < 2 {
        return;
    }
    for i in 0..n {
        let (a, b) = (&points[i], &points[(i + 1) % n]);
        if let Some(s) = strip(a, b, d) {
            out.push(mp(s));
        }
        let prev = &points[(i + n - 1) % n];
        if let Some(j) = join(prev, a, b, d, opts) {
            out.push(mp(j));
        }
    }
}

/// Pieces around an open line
fn line_pieces(points: &[Point2<f64>], d: f64, opts: &BufferOptions, out: &mut Vec<MultiPolygon<f64>>) {
    let mut pts: Vec<Point2<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if pts.last().map_or(true, |q: &Point2<f64>| (p - q).norm() > 1e-12) {
            pts.push(*p);
        }
    }
    if pts.len() < 2 {
        if let Some(p) = pts.first() {
            out.extend(point_piece(p, d, opts).map(mp));
        }
        return;
    }
    if pts.len() > 2 && pts.first() == pts.last() {
        pts.pop();
        ring_pieces(&pts, d, opts, out);
        return;
    }
    for w in pts.windows(2) {
        out.extend(strip(&w[0], &w[1], d).map(mp));
    }
    for w in pts.windows(3) {
        out.extend(join(&w[0], &w[1], &w[2], d, opts).map(mp));
    }
    let last = pts.len() - 1;
    out.extend(cap(&pts[1], &pts[0], d, opts).map(mp));
    out.extend(cap(&pts[last - 1], &pts[last], d, opts).map(mp));
}

fn point_piece(p: &Point2<f64>, d: f64, opts: &BufferOptions) -> Option<Polygon<f64>> {
    match opts.cap_style {
        CapStyle::Round => Some(circle(*p, d, opts.resolution)),
        CapStyle::Square => {
            let (dx, dy) = (Vector2::new(d, 0.0), Vector2::new(0.0, d));
            Some(polygon_from(&[p - dx - dy, p + dx - dy, p + dx + dy, p - dx + dy]))
        }
        CapStyle::Flat => None,
    }
}

fn boundary_pieces(shape: &Shape2, d: f64, opts: &BufferOptions) -> Vec<MultiPolygon<f64>> {
    let mut pieces = Vec::new();
    for poly in shape.polygons() {
        for ring in std::iter::once(poly.exterior()).chain(poly.interiors()) {
            ring_pieces(&open_ring(ring), d, opts, &mut pieces);
        }
    }
    for line in shape.lines() {
        let pts: Vec<Point2<f64>> = line.0.iter().map(|c| to_point2(*c)).collect();
        line_pieces(&pts, d, opts, &mut pieces);
    }
    for p in shape.points() {
        pieces.extend(point_piece(&to_point2(p.0), d, opts).map(mp));
    }
    pieces
}

/// Offset a shape by `distance`. Lines and points only grow; a negative
/// distance on them gives an empty shape, as does shrinking a polygon past
/// its inradius.
pub fn buffer(shape: &Shape2, distance: f64, opts: &BufferOptions) -> Result<Shape2> {
    if shape.is_empty() {
        return Ok(Shape2::Empty);
    }
    let area = shape.to_multipolygon();
    let result = if distance > 0.0 {
        let mut pieces = boundary_pieces(shape, distance, opts);
        pieces.push(area);
        union_polygons(pieces)
    } else if distance < 0.0 {
        if area.0.is_empty() {
            return Ok(Shape2::Empty);
        }
        let polygonal = Shape2::from_multipolygon(area.clone());
        let eroded = union_polygons(boundary_pieces(&polygonal, -distance, opts));
        area.difference(&eroded)
    } else {
        area.union(&MultiPolygon::new(Vec::new()))
    };
    Ok(simplify_rings(Shape2::from_multipolygon(result)))
}

fn simplify_rings(shape: Shape2) -> Shape2 {
    let tidy = |ring: &LineString<f64>| -> Option<LineString<f64>> {
        let pts = remove_colinear(&open_ring(ring), 1e-9);
        (pts.len() >= 3).then(|| close_ring(&pts))
    };
    let polys: Vec<Polygon<f64>> = shape
        .polygons()
        .iter()
        .filter_map(|p| {
            let exterior = tidy(p.exterior())?;
            Some(Polygon::new(exterior, p.interiors().iter().filter_map(tidy).collect()))
        })
        .collect();
    Shape2::from_multipolygon(MultiPolygon::new(polys)).oriented()
}

/// Quarter-circle segment count that keeps the chord error below `tolerance`
pub fn resolution_for(radius: f64, tolerance: f64) -> usize {
    if radius <= tolerance || tolerance <= 0.0 {
        return 1;
    }
    let step = 2.0 * (1.0 - tolerance / radius).acos();
    ((FRAC_PI_2 / step).ceil() as usize).max(1)
}
