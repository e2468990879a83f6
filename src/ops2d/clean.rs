// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Cleaning and simplification of planar shapes

use super::buffer::{buffer, BufferOptions, JoinStyle};
use crate::error::Result;
use crate::geometry::shape2::{close_ring, open_ring, to_point2};
use crate::geometry::Shape2;
use geo::{BooleanOps, ConvexHull, LineString, MultiPolygon, Polygon, Simplify};
use nalgebra::Point2;

/// Drop consecutive vertices closer than `eps` (ring is open)
pub fn remove_duplicates(points: &[Point2<f64>], eps: f64) -> Vec<Point2<f64>> {
    let mut out: Vec<Point2<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map_or(true, |q| (p - q).norm() > eps) {
            out.push(*p);
        }
    }
    while out.len() > 1 && (out[0] - out[out.len() - 1]).norm() <= eps {
        out.pop();
    }
    out
}

/// Drop vertices lying within `eps` of the segment joining their neighbours
/// (ring is open). Spikes folding back onto themselves are dropped too.
pub fn remove_colinear(points: &[Point2<f64>], eps: f64) -> Vec<Point2<f64>> {
    let mut pts = remove_duplicates(points, eps);
    loop {
        let n = pts.len();
        if n < 3 {
            return pts;
        }
        let mut removed = false;
        let mut i = 0;
        while i < pts.len() && pts.len() >= 3 {
            let n = pts.len();
            let prev = pts[(i + n - 1) % n];
            let next = pts[(i + 1) % n];
            let p = pts[i];
            let base = next - prev;
            let len = base.norm();
            let deviation = if len > 0.0 {
                base.perp(&(p - prev)).abs() / len
            } else {
                (p - prev).norm()
            };
            if deviation <= eps {
                pts.remove(i);
                removed = true;
            } else {
                i += 1;
            }
        }
        if !removed {
            return pts;
        }
    }
}

fn clean_ring(ring: &LineString<f64>, eps: f64) -> Option<LineString<f64>> {
    let pts = remove_colinear(&open_ring(ring), eps);
    (pts.len() >= 3).then(|| close_ring(&pts))
}

fn clean_line(line: &LineString<f64>, eps: f64) -> Option<LineString<f64>> {
    let pts: Vec<Point2<f64>> = line.0.iter().map(|c| to_point2(*c)).collect();
    let mut out: Vec<Point2<f64>> = Vec::with_capacity(pts.len());
    for p in pts {
        if out.last().map_or(true, |q| (p - q).norm() > eps) {
            out.push(p);
        }
    }
    // Interior colinear points only; the ends stay
    let mut i = 1;
    while out.len() > 2 && i + 1 < out.len() {
        let (a, p, b) = (out[i - 1], out[i], out[i + 1]);
        let base = b - a;
        let len = base.norm();
        let on_segment = len > 0.0
            && base.perp(&(p - a)).abs() / len <= eps
            && (p - a).dot(&base) >= 0.0
            && (p - b).dot(&(-base)) >= 0.0;
        if on_segment {
            out.remove(i);
        } else {
            i += 1;
        }
    }
    (out.len() >= 2).then(|| close_ring_if_needed(&out, line))
}

fn close_ring_if_needed(points: &[Point2<f64>], original: &LineString<f64>) -> LineString<f64> {
    let ls: LineString<f64> = points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>().into();
    if original.is_closed() && !ls.is_closed() {
        close_ring(points)
    } else {
        ls
    }
}

fn clean_polygons(polys: &[Polygon<f64>], eps: f64) -> MultiPolygon<f64> {
    let tidied: Vec<Polygon<f64>> = polys
        .iter()
        .filter_map(|p| {
            let exterior = clean_ring(p.exterior(), eps)?;
            let holes = p.interiors().iter().filter_map(|h| clean_ring(h, eps)).collect();
            Some(Polygon::new(exterior, holes))
        })
        .collect();
    // Self-union resolves overlaps and self-intersections
    let valid = MultiPolygon::new(tidied).union(&MultiPolygon::new(Vec::new()));
    let min_area = eps * eps;
    let polys: Vec<Polygon<f64>> = valid
        .0
        .into_iter()
        .filter_map(|p| {
            let exterior = clean_ring(p.exterior(), eps)?;
            let holes = p.interiors().iter().filter_map(|h| clean_ring(h, eps)).collect();
            let poly = Polygon::new(exterior, holes);
            (geo::Area::unsigned_area(&poly) > min_area).then_some(poly)
        })
        .collect();
    MultiPolygon::new(polys)
}

/// Smallest tolerance for which `clean` applies the buffer round trip
const MORPHOLOGY_MIN_EPS: f64 = 1e-6;

/// Remove duplicate and colinear vertices within `eps`, resolve
/// self-intersections and drop degenerate parts.
///
/// Polygonal shapes are also buffered by `eps` and back by `-eps`. A
/// positive `eps` closes gaps narrower than `2 * eps`; a negative one opens
/// the shape, removing slivers. Vertices moved less than `|eps|` by the
/// round trip are snapped back onto the input.
pub fn clean(shape: &Shape2, eps: f64) -> Result<Shape2> {
    let shape = if eps.abs() >= MORPHOLOGY_MIN_EPS && shape.is_polygonal() {
        let opts = BufferOptions::default().with_join(JoinStyle::Mitre);
        let there = buffer(shape, eps, &opts)?;
        let back = buffer(&there, -eps, &opts)?;
        snap_to_vertices(&back, &shape.coords(), eps.abs())
    } else {
        shape.clone()
    };
    let eps = eps.abs().max(1e-12);
    Ok(clean_shape(&shape, eps))
}

/// Move every vertex within `tolerance` of an anchor onto the nearest anchor
pub fn snap_to_vertices(shape: &Shape2, anchors: &[[f64; 2]], tolerance: f64) -> Shape2 {
    shape.map_coords(&|c: [f64; 2]| {
        anchors
            .iter()
            .map(|a| (a, (a[0] - c[0]).hypot(a[1] - c[1])))
            .filter(|(_, d)| *d <= tolerance)
            .min_by(|x, y| x.1.total_cmp(&y.1))
            .map_or(c, |(a, _)| *a)
    })
}

fn clean_shape(shape: &Shape2, eps: f64) -> Shape2 {
    match shape {
        Shape2::Empty | Shape2::Point(_) => shape.clone(),
        Shape2::Line(l) => clean_line(l, eps).map_or(Shape2::Empty, Shape2::Line),
        Shape2::MultiLine(ml) => Shape2::from_multiline(geo::MultiLineString::new(
            ml.0.iter().filter_map(|l| clean_line(l, eps)).collect(),
        )),
        Shape2::Polygon(_) | Shape2::MultiPolygon(_) => {
            Shape2::from_multipolygon(clean_polygons(&shape.polygons(), eps)).oriented()
        }
        Shape2::Collection(items) => {
            Shape2::from_parts(items.iter().map(|s| clean_shape(s, eps)).collect())
        }
    }
}

/// Ramer-Douglas-Peucker simplification
pub fn simplify(shape: &Shape2, distance: f64) -> Shape2 {
    match shape {
        Shape2::Line(l) => Shape2::Line(l.simplify(&distance)),
        Shape2::MultiLine(ml) => Shape2::MultiLine(ml.simplify(&distance)),
        Shape2::Polygon(p) => Shape2::from_multipolygon(MultiPolygon::new(vec![p.simplify(&distance)])),
        Shape2::MultiPolygon(mp) => Shape2::from_multipolygon(mp.simplify(&distance)),
        Shape2::Collection(items) => {
            Shape2::from_parts(items.iter().map(|s| simplify(s, distance)).collect())
        }
        other => other.clone(),
    }
}

/// Convex hull of every vertex of the shape
pub fn convex_hull(shape: &Shape2) -> Shape2 {
    let points = shape.multipoint();
    match points.0.len() {
        0 => Shape2::Empty,
        1 => Shape2::Point(points.0[0]),
        _ => {
            let hull = points.convex_hull();
            if geo::Area::unsigned_area(&hull) > 0.0 {
                Shape2::Polygon(hull).oriented()
            } else {
                let pts: Vec<Point2<f64>> = hull.exterior().0.iter().map(|c| to_point2(*c)).collect();
                let line: LineString<f64> = pts.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>().into();
                Shape2::Line(line)
            }
        }
    }
}
