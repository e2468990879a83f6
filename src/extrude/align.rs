// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Ring alignment before stitching

use crate::utils::math::ring_signed_area;
use nalgebra::Point2;

const SNAP_DISTANCE: f64 = 1e-9;

/// Reorient `ring` to follow `reference`: same winding, starting at the
/// vertex closest to the first reference vertex, and with vertices lying on
/// reference vertices snapped onto them.
pub fn vertex_order_align_snap(reference: &[Point2<f64>], ring: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut out: Vec<Point2<f64>> = ring.to_vec();
    if out.is_empty() || reference.is_empty() {
        return out;
    }

    let (ref_area, ring_area) = (ring_signed_area(reference), ring_signed_area(&out));
    if ref_area * ring_area < 0.0 {
        out.reverse();
    }

    for p in &mut out {
        if let Some(q) = reference.iter().find(|q| (**q - *p).norm() <= SNAP_DISTANCE) {
            *p = *q;
        }
    }

    let start = reference[0];
    let best = out
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (**a - start)
                .norm_squared()
                .total_cmp(&(**b - start).norm_squared())
        })
        .map_or(0, |(i, _)| i);
    out.rotate_left(best);
    out
}

/// Degenerate ring walking a line forward and back, so a line can be
/// stitched like a ring (a ridge)
pub fn ring_from_line(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut ring = points.to_vec();
    if points.len() > 2 {
        ring.extend(points[1..points.len() - 1].iter().rev());
    }
    ring
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, size: f64) -> Vec<Point2<f64>> {
        vec![
            Point2::new(x0, x0),
            Point2::new(x0 + size, x0),
            Point2::new(x0 + size, x0 + size),
            Point2::new(x0, x0 + size),
        ]
    }

    #[test]
    fn test_rotates_to_closest_start() {
        let outer = square(0.0, 4.0);
        let mut inner = square(1.0, 2.0);
        inner.rotate_left(2);
        let aligned = vertex_order_align_snap(&outer, &inner);
        assert_eq!(aligned[0], Point2::new(1.0, 1.0));
        assert_eq!(aligned[1], Point2::new(3.0, 1.0));
    }

    #[test]
    fn test_reverses_opposite_winding() {
        let outer = square(0.0, 4.0);
        let mut inner = square(1.0, 2.0);
        inner.reverse();
        let aligned = vertex_order_align_snap(&outer, &inner);
        assert!(ring_signed_area(&aligned) > 0.0);
        assert_eq!(aligned[0], Point2::new(1.0, 1.0));
    }

    #[test]
    fn test_ring_from_line() {
        let line = [Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(2.0, 0.0)];
        let ring = ring_from_line(&line);
        assert_eq!(ring.len(), 4);
        assert_eq!(ring[3], Point2::new(1.0, 0.0));
    }
}
