// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Paths with curved segments and linear referencing over polylines

use crate::utils::math::project_on_segment;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Position along a polyline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPosition {
    pub point: Point2<f64>,
    /// Index of the flattened segment containing `point`
    pub segment_index: usize,
    pub a: Point2<f64>,
    pub b: Point2<f64>,
}

/// Closest point on a polyline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    pub point: Point2<f64>,
    pub segment_index: usize,
    pub a: Point2<f64>,
    pub b: Point2<f64>,
    pub distance: f64,
    /// Distance along the polyline up to `point`
    pub offset: f64,
}

pub fn polyline_length(points: &[Point2<f64>]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

/// Point at distance `d` along a polyline, clamped to its ends
pub fn interpolate(points: &[Point2<f64>], d: f64) -> Option<SegmentPosition> {
    if points.len() < 2 {
        return points.first().map(|p| SegmentPosition {
            point: *p,
            segment_index: 0,
            a: *p,
            b: *p,
        });
    }
    let mut remaining = d.max(0.0);
    let last = points.len() - 2;
    for (i, w) in points.windows(2).enumerate() {
        let len = (w[1] - w[0]).norm();
        if remaining <= len || i == last {
            let t = if len > 0.0 { (remaining / len).min(1.0) } else { 0.0 };
            return Some(SegmentPosition {
                point: w[0] + (w[1] - w[0]) * t,
                segment_index: i,
                a: w[0],
                b: w[1],
            });
        }
        remaining -= len;
    }
    None
}

/// Closest segment of a polyline to `p`
pub fn closest_segment(points: &[Point2<f64>], p: &Point2<f64>) -> Option<SegmentProjection> {
    let mut best: Option<SegmentProjection> = None;
    let mut offset = 0.0;
    for (i, w) in points.windows(2).enumerate() {
        let (proj, t) = project_on_segment(p, &w[0], &w[1]);
        let distance = (proj - p).norm();
        let len = (w[1] - w[0]).norm();
        if best.map_or(true, |b| distance < b.distance) {
            best = Some(SegmentProjection {
                point: proj,
                segment_index: i,
                a: w[0],
                b: w[1],
                distance,
                offset: offset + len * t,
            });
        }
        offset += len;
    }
    best
}

/// Unit normal to the left of the segment direction at distance `d`
pub fn normal_at(points: &[Point2<f64>], d: f64) -> Option<Vector2<f64>> {
    let pos = interpolate(points, d)?;
    let dir = pos.b - pos.a;
    if dir.norm() == 0.0 {
        return None;
    }
    let dir = dir.normalize();
    Some(Vector2::new(-dir.y, dir.x))
}

/// Perpendicular segment of total `length` at distance `d`.
/// With `double` the segment is centered on the line, otherwise it extends to the left only.
pub fn perpendicular(
    points: &[Point2<f64>],
    d: f64,
    length: f64,
    double: bool,
) -> Option<[Point2<f64>; 2]> {
    let pos = interpolate(points, d)?;
    let n = normal_at(points, d)?;
    if double {
        Some([pos.point - n * (length / 2.0), pos.point + n * (length / 2.0)])
    } else {
        Some([pos.point, pos.point + n * length])
    }
}

/// Portion of a polyline between two distances
pub fn substring(points: &[Point2<f64>], start: f64, end: f64) -> Vec<Point2<f64>> {
    let total = polyline_length(points);
    let (start, end) = (start.clamp(0.0, total), end.clamp(0.0, total));
    let (lo, hi, reversed) = if start <= end {
        (start, end, false)
    } else {
        (end, start, true)
    };
    let (Some(a), Some(b)) = (interpolate(points, lo), interpolate(points, hi)) else {
        return Vec::new();
    };
    let mut out = vec![a.point];
    for p in &points[a.segment_index + 1..=b.segment_index] {
        if (p - out[out.len() - 1]).norm() > 0.0 {
            out.push(*p);
        }
    }
    if (b.point - out[out.len() - 1]).norm() > 0.0 || out.len() == 1 {
        out.push(b.point);
    }
    if reversed {
        out.reverse();
    }
    out
}

/// Offset a polyline sideways by `distance`, mitring interior joints.
/// Positive distances offset to the left of the direction of travel.
pub fn offset_polyline(points: &[Point2<f64>], distance: f64) -> Vec<Point2<f64>> {
    let normals: Vec<Vector2<f64>> = points
        .windows(2)
        .filter_map(|w| {
            let d = w[1] - w[0];
            (d.norm() > 0.0).then(|| {
                let d = d.normalize();
                Vector2::new(-d.y, d.x)
            })
        })
        .collect();
    if normals.is_empty() {
        return points.to_vec();
    }
    let mut out = Vec::with_capacity(points.len());
    out.push(points[0] + normals[0] * distance);
    for i in 1..points.len() - 1 {
        let n1 = normals[(i - 1).min(normals.len() - 1)];
        let n2 = normals[i.min(normals.len() - 1)];
        let denom = 1.0 + n1.dot(&n2);
        let offset = if denom > 1e-6 {
            (n1 + n2) * (distance / denom)
        } else {
            n1 * distance
        };
        out.push(points[i] + offset);
    }
    let last = points.len() - 1;
    out.push(points[last] + normals[normals.len() - 1] * distance);
    out
}

/// Side of a parallel offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// A path segment, starting where the previous one ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathSegment {
    Line {
        to: [f64; 2],
    },
    /// Circular arc around `center` ending at `to`
    Arc {
        center: [f64; 2],
        to: [f64; 2],
        ccw: bool,
    },
    /// Cubic Bezier
    Bezier {
        c1: [f64; 2],
        c2: [f64; 2],
        to: [f64; 2],
    },
    /// Uniform cubic B-spline through the given control points, clamped at both ends
    BSpline {
        controls: Vec<[f64; 2]>,
        to: [f64; 2],
    },
}

impl PathSegment {
    pub fn end(&self) -> [f64; 2] {
        match self {
            Self::Line { to }
            | Self::Arc { to, .. }
            | Self::Bezier { to, .. }
            | Self::BSpline { to, .. } => *to,
        }
    }

    fn flatten(&self, from: Point2<f64>, resolution: usize) -> Vec<Point2<f64>> {
        let steps = resolution.max(1) * 4;
        let to = Point2::from(self.end());
        match self {
            Self::Line { .. } => vec![to],
            Self::Arc { center, ccw, .. } => {
                let c = Point2::from(*center);
                let r = (from - c).norm();
                let a0 = (from.y - c.y).atan2(from.x - c.x);
                let a1 = (to.y - c.y).atan2(to.x - c.x);
                let mut sweep = a1 - a0;
                if *ccw && sweep <= 0.0 {
                    sweep += TAU;
                } else if !*ccw && sweep >= 0.0 {
                    sweep -= TAU;
                }
                let n = ((sweep.abs() / TAU) * steps as f64 * 4.0).ceil().max(1.0) as usize;
                let mut pts: Vec<Point2<f64>> = (1..n)
                    .map(|i| {
                        let a = a0 + sweep * i as f64 / n as f64;
                        Point2::new(c.x + r * a.cos(), c.y + r * a.sin())
                    })
                    .collect();
                pts.push(to);
                pts
            }
            Self::Bezier { c1, c2, .. } => {
                let (p1, p2) = (Point2::from(*c1), Point2::from(*c2));
                (1..=steps)
                    .map(|i| {
                        let t = i as f64 / steps as f64;
                        let u = 1.0 - t;
                        let v = from.coords * (u * u * u)
                            + p1.coords * (3.0 * u * u * t)
                            + p2.coords * (3.0 * u * t * t)
                            + to.coords * (t * t * t);
                        Point2::from(v)
                    })
                    .collect()
            }
            Self::BSpline { controls, .. } => {
                let mut cps: Vec<Point2<f64>> = vec![from, from, from];
                cps.extend(controls.iter().map(|c| Point2::from(*c)));
                cps.extend([to, to, to]);
                let mut pts = Vec::new();
                for w in cps.windows(4) {
                    for i in 1..=steps {
                        let t = i as f64 / steps as f64;
                        let b0 = (1.0 - t).powi(3) / 6.0;
                        let b1 = (3.0 * t.powi(3) - 6.0 * t * t + 4.0) / 6.0;
                        let b2 = (-3.0 * t.powi(3) + 3.0 * t * t + 3.0 * t + 1.0) / 6.0;
                        let b3 = t.powi(3) / 6.0;
                        pts.push(Point2::from(
                            w[0].coords * b0 + w[1].coords * b1 + w[2].coords * b2 + w[3].coords * b3,
                        ));
                    }
                }
                pts
            }
        }
    }
}

/// A curve made of tagged segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path2 {
    pub start: [f64; 2],
    pub segments: Vec<PathSegment>,
    /// Flattening resolution (points per quarter turn)
    pub resolution: usize,
}

impl Path2 {
    pub fn new(start: [f64; 2]) -> Self {
        Self {
            start,
            segments: Vec::new(),
            resolution: 4,
        }
    }

    /// Straight polyline path
    pub fn from_points(points: &[[f64; 2]]) -> Self {
        let mut path = Self::new(points.first().copied().unwrap_or([0.0, 0.0]));
        for p in points.iter().skip(1) {
            path = path.line_to(*p);
        }
        path
    }

    pub fn with_resolution(mut self, resolution: usize) -> Self {
        self.resolution = resolution.max(1);
        self
    }

    pub fn line_to(mut self, to: [f64; 2]) -> Self {
        self.segments.push(PathSegment::Line { to });
        self
    }

    pub fn arc_to(mut self, center: [f64; 2], to: [f64; 2], ccw: bool) -> Self {
        self.segments.push(PathSegment::Arc { center, to, ccw });
        self
    }

    pub fn bezier_to(mut self, c1: [f64; 2], c2: [f64; 2], to: [f64; 2]) -> Self {
        self.segments.push(PathSegment::Bezier { c1, c2, to });
        self
    }

    pub fn bspline_to(mut self, controls: Vec<[f64; 2]>, to: [f64; 2]) -> Self {
        self.segments.push(PathSegment::BSpline { controls, to });
        self
    }

    /// Flattened points, each tagged with the path segment that produced it
    pub fn flatten_tagged(&self) -> Vec<(Point2<f64>, usize)> {
        let mut out = vec![(Point2::from(self.start), 0)];
        let mut cursor = Point2::from(self.start);
        for (i, segment) in self.segments.iter().enumerate() {
            for p in segment.flatten(cursor, self.resolution) {
                out.push((p, i));
            }
            cursor = Point2::from(segment.end());
        }
        out
    }

    /// Flattened polyline
    pub fn linearize(&self) -> Vec<Point2<f64>> {
        self.flatten_tagged().into_iter().map(|(p, _)| p).collect()
    }

    pub fn length(&self) -> f64 {
        polyline_length(&self.linearize())
    }

    /// Point at distance `d`; `segment_index` refers to the path segment
    pub fn interpolate(&self, d: f64) -> Option<SegmentPosition> {
        let tagged = self.flatten_tagged();
        let points: Vec<Point2<f64>> = tagged.iter().map(|(p, _)| *p).collect();
        let mut pos = interpolate(&points, d)?;
        pos.segment_index = tagged.get(pos.segment_index + 1).map_or(0, |(_, s)| *s);
        Some(pos)
    }

    pub fn perpendicular(&self, d: f64, length: f64, double: bool) -> Option<[Point2<f64>; 2]> {
        perpendicular(&self.linearize(), d, length, double)
    }

    pub fn closest_segment(&self, p: [f64; 2]) -> Option<SegmentProjection> {
        let tagged = self.flatten_tagged();
        let points: Vec<Point2<f64>> = tagged.iter().map(|(p, _)| *p).collect();
        let mut proj = closest_segment(&points, &Point2::from(p))?;
        proj.segment_index = tagged.get(proj.segment_index + 1).map_or(0, |(_, s)| *s);
        Some(proj)
    }

    /// Straight-segment path between two distances
    pub fn substring(&self, start: f64, end: f64) -> Path2 {
        let pts: Vec<[f64; 2]> = substring(&self.linearize(), start, end)
            .into_iter()
            .map(|p| [p.x, p.y])
            .collect();
        Path2::from_points(&pts).with_resolution(self.resolution)
    }

    pub fn parallel_offset(&self, distance: f64, side: Side) -> Path2 {
        let d = match side {
            Side::Left => distance,
            Side::Right => -distance,
        };
        let pts: Vec<[f64; 2]> = offset_polyline(&self.linearize(), d)
            .into_iter()
            .map(|p| [p.x, p.y])
            .collect();
        Path2::from_points(&pts).with_resolution(self.resolution)
    }
}
