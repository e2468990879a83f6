// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Math utilities

use nalgebra::{Point2, Point3, Vector3};

/// Default tolerance for planar and mesh comparisons
pub const EPSILON: f64 = 1e-9;

/// Calculate the unnormalized normal of a triangle (length is twice its area)
pub fn triangle_normal_raw(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Vector3<f64> {
    (p1 - p0).cross(&(p2 - p0))
}

/// Calculate the unit normal of a triangle, `None` when degenerate
pub fn triangle_normal(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Option<Vector3<f64>> {
    let n = triangle_normal_raw(p0, p1, p2);
    let len = n.norm();
    if len < EPSILON * EPSILON {
        None
    } else {
        Some(n / len)
    }
}

/// Area of a 3D triangle
pub fn triangle_area(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> f64 {
    triangle_normal_raw(p0, p1, p2).norm() * 0.5
}

/// Twice the signed area of the 2D triangle (a, b, c); positive when CCW
pub fn cross2(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Signed area of an open or closed ring; positive when CCW
pub fn ring_signed_area(ring: &[Point2<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let n = ring.len();
    let mut area = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        area += ring[i].x * ring[j].y - ring[j].x * ring[i].y;
    }
    area * 0.5
}

/// Project `p` on segment `a`-`b`; returns the projection and its parameter in [0, 1]
pub fn project_on_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> (Point2<f64>, f64) {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < EPSILON * EPSILON {
        return (*a, 0.0);
    }
    let t = clamp((p - a).dot(&ab) / len2, 0.0, 1.0);
    (a + ab * t, t)
}

/// Check if two floats are approximately equal
pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

/// Clamp a value between min and max
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}
