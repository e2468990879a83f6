// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Set operations on planar shapes

use crate::error::{DddError, Result};
use crate::geometry::{Shape2, ShapeKind};
use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{BooleanOps, Intersects, Line, MultiLineString, MultiPolygon, Point, Relate};

/// Planar set operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Intersection,
    Difference,
    SymmetricDifference,
}

fn check_finite(shape: &Shape2) -> Result<()> {
    if shape.coords().iter().all(|c| c[0].is_finite() && c[1].is_finite()) {
        Ok(())
    } else {
        Err(DddError::geometry_msg(
            shape.kind().to_string(),
            "non-finite coordinates",
        ))
    }
}

/// Apply a set operation. Empty operands short-circuit the way the
/// algebra requires; polygonal parts go through the overlay engine, linear
/// parts are clipped and points are tested for containment.
pub fn apply(a: &Shape2, b: &Shape2, op: BooleanOp) -> Result<Shape2> {
    check_finite(a)?;
    check_finite(b)?;

    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ok(Shape2::Empty),
        (true, false) => {
            return Ok(match op {
                BooleanOp::Union | BooleanOp::SymmetricDifference => b.clone(),
                _ => Shape2::Empty,
            })
        }
        (false, true) => {
            return Ok(match op {
                BooleanOp::Intersection => Shape2::Empty,
                _ => a.clone(),
            })
        }
        _ => {}
    }

    let (pa, pb) = (a.to_multipolygon(), b.to_multipolygon());
    let polygons = match op {
        BooleanOp::Union => pa.union(&pb),
        BooleanOp::Intersection => pa.intersection(&pb),
        BooleanOp::Difference => pa.difference(&pb),
        BooleanOp::SymmetricDifference => pa.xor(&pb),
    };

    let la = MultiLineString::new(a.lines());
    let lb = MultiLineString::new(b.lines());
    let lines = match op {
        BooleanOp::Union | BooleanOp::SymmetricDifference => {
            // Lines swallowed by the other side's area disappear
            let mut kept = pb.clip(&la, true).0;
            kept.extend(pa.clip(&lb, true).0);
            kept
        }
        BooleanOp::Intersection => {
            let mut kept = pb.clip(&la, false).0;
            kept.extend(pa.clip(&lb, false).0);
            kept
        }
        BooleanOp::Difference => pb.clip(&la, true).0,
    };

    let mut points = point_parts(a, b, &pa, &pb, op);
    if op == BooleanOp::Intersection {
        points.extend(line_crossings(&la, &lb));
    }

    let mut parts = vec![Shape2::from_multipolygon(polygons)];
    parts.push(Shape2::from_multiline(MultiLineString::new(lines)));
    parts.extend(points.into_iter().map(Shape2::Point));
    Ok(Shape2::from_parts(parts))
}

fn point_parts(
    a: &Shape2,
    b: &Shape2,
    pa: &MultiPolygon<f64>,
    pb: &MultiPolygon<f64>,
    op: BooleanOp,
) -> Vec<Point<f64>> {
    let touches = |p: &Point<f64>, shape: &Shape2, area: &MultiPolygon<f64>| {
        area.intersects(p) || shape.lines().iter().any(|l| l.intersects(p)) || shape.points().contains(p)
    };
    let mut out = Vec::new();
    for p in a.points() {
        let hit = touches(&p, b, pb);
        let keep = match op {
            BooleanOp::Union => true,
            BooleanOp::Intersection => hit,
            BooleanOp::Difference | BooleanOp::SymmetricDifference => !hit,
        };
        if keep {
            out.push(p);
        }
    }
    if matches!(op, BooleanOp::Union | BooleanOp::SymmetricDifference) {
        for p in b.points() {
            if op == BooleanOp::Union && !touches(&p, a, pa) && !out.contains(&p) {
                out.push(p);
            } else if op == BooleanOp::SymmetricDifference && !touches(&p, a, pa) {
                out.push(p);
            }
        }
    }
    out
}

fn line_crossings(la: &MultiLineString<f64>, lb: &MultiLineString<f64>) -> Vec<Point<f64>> {
    let mut out: Vec<Point<f64>> = Vec::new();
    for l1 in la.0.iter().flat_map(|l| l.lines()) {
        for l2 in lb.0.iter().flat_map(|l| l.lines()) {
            let hit = line_intersection(l1, l2);
            if let Some(LineIntersection::SinglePoint { intersection, .. }) = hit {
                let p = Point::from(intersection);
                if !out.contains(&p) {
                    out.push(p);
                }
            }
        }
    }
    out
}

/// Union of many shapes, merging pairwise so every overlay stays small
pub fn union_all(shapes: Vec<Shape2>) -> Result<Shape2> {
    let mut layer: Vec<Shape2> = shapes.into_iter().filter(|s| !s.is_empty()).collect();
    if layer.is_empty() {
        return Ok(Shape2::Empty);
    }
    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len() / 2 + 1);
        let mut iter = layer.into_iter();
        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) => next.push(apply(&first, &second, BooleanOp::Union)?),
                None => next.push(first),
            }
        }
        layer = next;
    }
    Ok(layer.pop().unwrap_or_default())
}

/// Union of polygon pieces without any line or point handling
pub(crate) fn union_polygons(pieces: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    let mut layer: Vec<MultiPolygon<f64>> = pieces.into_iter().filter(|p| !p.0.is_empty()).collect();
    if layer.is_empty() {
        return MultiPolygon::new(Vec::new());
    }
    while layer.len() > 1 {
        let mut next = Vec::with_capacity(layer.len() / 2 + 1);
        let mut iter = layer.into_iter();
        while let Some(first) = iter.next() {
            match iter.next() {
                Some(second) => next.push(first.union(&second)),
                None => next.push(first),
            }
        }
        layer = next;
    }
    layer.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

/// `a` fully contains `b`
pub fn contains(a: &Shape2, b: &Shape2) -> bool {
    match (a.to_geometry(), b.to_geometry()) {
        (Some(ga), Some(gb)) => ga.relate(&gb).is_contains(),
        _ => false,
    }
}

pub fn intersects(a: &Shape2, b: &Shape2) -> bool {
    match (a.to_geometry(), b.to_geometry()) {
        (Some(ga), Some(gb)) => ga.intersects(&gb),
        _ => false,
    }
}

/// Euclidean distance between two shapes (zero when they intersect)
pub fn distance(a: &Shape2, b: &Shape2) -> f64 {
    if intersects(a, b) {
        return 0.0;
    }
    let segments = |s: &Shape2| -> Vec<Line<f64>> {
        let mut out: Vec<Line<f64>> = s.paths().into_iter().flat_map(|l| l.lines()).collect();
        out.extend(s.points().into_iter().map(|p| Line::new(p.0, p.0)));
        out
    };
    let (sa, sb) = (segments(a), segments(b));
    let mut best = f64::INFINITY;
    for s1 in &sa {
        for s2 in &sb {
            best = best.min(segment_distance(s1, s2));
        }
    }
    best
}

fn segment_distance(a: &Line<f64>, b: &Line<f64>) -> f64 {
    use crate::geometry::shape2::to_point2;
    use crate::utils::math::project_on_segment;
    if a.intersects(b) {
        return 0.0;
    }
    let (a0, a1) = (to_point2(a.start), to_point2(a.end));
    let (b0, b1) = (to_point2(b.start), to_point2(b.end));
    [
        (project_on_segment(&a0, &b0, &b1).0 - a0).norm(),
        (project_on_segment(&a1, &b0, &b1).0 - a1).norm(),
        (project_on_segment(&b0, &a0, &a1).0 - b0).norm(),
        (project_on_segment(&b1, &a0, &a1).0 - b1).norm(),
    ]
    .into_iter()
    .fold(f64::INFINITY, f64::min)
}

pub fn is_polygonal_kind(kind: ShapeKind) -> bool {
    matches!(kind, ShapeKind::Polygon | ShapeKind::MultiPolygon)
}
