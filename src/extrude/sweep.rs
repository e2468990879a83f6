// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Extrusion of a profile along a path

use super::step::{push_triangle, stitch};
use crate::error::{DddError, Result};
use crate::geometry::shape2::open_ring;
use crate::geometry::{Mesh, Shape2};
use crate::ops2d::triangulate_polygon;
use nalgebra::{Point2, Point3, Vector2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepOptions {
    pub cap_start: bool,
    pub cap_end: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            cap_start: true,
            cap_end: true,
        }
    }
}

/// Frame of the path at one vertex: position, left direction and the
/// stretch applied to lateral offsets so mitred joints keep the width
struct Frame {
    origin: Point2<f64>,
    left: Vector2<f64>,
    stretch: f64,
}

fn left_of(t: &Vector2<f64>) -> Vector2<f64> {
    Vector2::new(-t.y, t.x)
}

fn frames(path: &[Point2<f64>]) -> Vec<Frame> {
    let n = path.len();
    let dir = |i: usize| (path[i + 1] - path[i]).normalize();
    (0..n)
        .map(|i| {
            let (t, incoming) = if i == 0 {
                (dir(0), dir(0))
            } else if i == n - 1 {
                (dir(n - 2), dir(n - 2))
            } else {
                let (t_in, t_out) = (dir(i - 1), dir(i));
                let bisector = t_in + t_out;
                if bisector.norm() < 1e-9 {
                    (t_in, t_in)
                } else {
                    (bisector.normalize(), t_in)
                }
            };
            let left = left_of(&t);
            let cos = left.dot(&left_of(&incoming)).max(0.1);
            Frame {
                origin: path[i],
                left,
                stretch: 1.0 / cos,
            }
        })
        .collect()
}

/// Profile point `(u, v)` placed at a frame: `u` lateral (left positive),
/// `v` vertical
fn place(frame: &Frame, p: &Point2<f64>) -> Point3<f64> {
    let q = frame.origin + frame.left * (p.x * frame.stretch);
    Point3::new(q.x, q.y, p.y)
}

/// Sweep the polygons of `profile` along a planar path. Consecutive path
/// vertices closer than 1e-12 are merged; paths need two distinct points.
pub fn sweep(profile: &Shape2, path: &[Point2<f64>], opts: &SweepOptions) -> Result<Mesh> {
    let mut pts: Vec<Point2<f64>> = Vec::with_capacity(path.len());
    for p in path {
        if pts.last().map_or(true, |q: &Point2<f64>| (p - q).norm() > 1e-12) {
            pts.push(*p);
        }
    }
    if pts.len() < 2 {
        return Err(DddError::geometry_msg("sweep", "path needs at least two distinct points"));
    }
    let frames = frames(&pts);
    let profile = profile.oriented();
    let mut mesh = Mesh::new();

    for polygon in profile.polygons() {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            let ring = open_ring(ring);
            if ring.len() < 3 {
                continue;
            }
            let placed: Vec<Vec<Point3<f64>>> = frames
                .iter()
                .map(|f| ring.iter().map(|p| place(f, p)).collect())
                .collect();
            for pair in placed.windows(2) {
                stitch(&mut mesh, &pair[0], &pair[1], false);
            }
        }

        let tri = triangulate_polygon(&polygon)?;
        let (first, last) = (&frames[0], &frames[frames.len() - 1]);
        for f in &tri.faces {
            let [a, b, c] = (*f).map(|i| tri.points[i]);
            if opts.cap_start {
                push_triangle(&mut mesh, place(first, &a), place(first, &c), place(first, &b));
            }
            if opts.cap_end {
                push_triangle(&mut mesh, place(last, &a), place(last, &b), place(last, &c));
            }
        }
    }

    mesh.merge_vertices();
    mesh.recompute_normals();
    Ok(mesh)
}
