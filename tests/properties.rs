// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Invariants checked over seeded random shapes

use approx::assert_relative_eq;
use ddd::geometry::mesh_utils::is_closed;
use ddd::meshops::uv::{map_3d_from_2d, map_cubic};
use ddd::prelude::*;
use ddd::select::Selection;
use ddd::{DddRandom, StepOptions};

const EPS: f64 = 1e-6;

/// Convex and concave footprints, all at least 1 unit across
fn footprints(seed: u64) -> Vec<Node2> {
    let mut rng = DddRandom::new(seed);
    let mut out = Vec::new();
    for _ in 0..6 {
        let x = rng.uniform(-50.0, 50.0);
        let y = rng.uniform(-50.0, 50.0);
        let w = rng.uniform(1.0, 10.0);
        let h = rng.uniform(1.0, 10.0);
        out.push(shapes::rect([[x, y], [x + w, y + h]]));

        let sides = 3 + (rng.uniform(0.0, 6.0) as usize);
        let r = rng.uniform(1.0, 5.0);
        out.push(shapes::regular_polygon(sides, r).translate([x, y]));
    }
    out.push(
        shapes::polygon(&[[0.0, 0.0], [4.0, 0.0], [4.0, 1.0], [1.0, 1.0], [1.0, 3.0], [0.0, 3.0]])
            .unwrap(),
    );
    out
}

/// Rect corners grown by `d` on every side
fn grown(lo: [f64; 2], hi: [f64; 2], d: f64) -> [[f64; 2]; 2] {
    [[lo[0] - d, lo[1] - d], [hi[0] + d, hi[1] + d]]
}

/// Holed and multi-part footprints, each with its copy inset by 0.1
fn compound_footprints(seed: u64) -> Vec<(Node2, Node2)> {
    let mut rng = DddRandom::new(seed);
    let mut out = Vec::new();
    for _ in 0..4 {
        let (x, y) = (rng.uniform(-50.0, 50.0), rng.uniform(-50.0, 50.0));
        let (w, h) = (rng.uniform(2.0, 10.0), rng.uniform(2.0, 10.0));
        let (lo, hi) = ([x, y], [x + w, y + h]);
        let (hole_lo, hole_hi) = ([x + w / 4.0, y + h / 4.0], [x + 3.0 * w / 4.0, y + 3.0 * h / 4.0]);

        let court = |d: f64| {
            shapes::rect(grown(lo, hi, -d))
                .subtract(&shapes::rect(grown(hole_lo, hole_hi, d)))
                .unwrap()
        };
        out.push((court(0.0), court(0.1)));

        let gap = rng.uniform(1.0, 5.0);
        let pair = |d: f64| {
            let twin = [[lo[0] + w + gap, lo[1]], [hi[0] + w + gap, hi[1]]];
            shapes::rect(grown(lo, hi, -d))
                .union(&shapes::rect(grown(twin[0], twin[1], -d)))
                .unwrap()
        };
        out.push((pair(0.0), pair(0.1)));
    }
    out
}

/// Area of the symmetric difference, zero for geometrically equal shapes
fn difference_area(a: &Node2, b: &Node2) -> f64 {
    a.symmetric_difference(b).unwrap().area()
}

#[test]
fn copy_purity() {
    for a in footprints(1) {
        let mut a = a;
        a.append(shapes::disc([100.0, 100.0], 1.0, 2));
        let vertices = a.vertex_list();
        let children: Vec<_> = a.children().iter().map(|c| c.id()).collect();
        let other = shapes::rect([[0.0, 0.0], [3.0, 3.0]]);

        let _ = a.buffer(0.5).unwrap();
        let _ = a.union(&other).unwrap();
        let _ = a.subtract(&other).unwrap();
        let _ = a.intersection(&other).unwrap();
        let _ = a.translate([1.0, 2.0]);
        let _ = a.rotate(0.3);
        let _ = a.scale([2.0, 2.0]);
        let _ = a.simplify(0.1);
        let _ = a.convex_hull();
        let solid = a.extrude(2.0).unwrap();
        let _ = map_cubic(&a, 1.0, false);

        assert_eq!(a.vertex_list(), vertices);
        assert_eq!(a.children().iter().map(|c| c.id()).collect::<Vec<_>>(), children);

        let mesh_before = solid.vertex_list();
        let _ = solid.translate([0.0, 0.0, 1.0]);
        let _ = solid.smooth(0.5);
        let _ = map_cubic(&solid, 1.0, true);
        assert_eq!(solid.vertex_list(), mesh_before);
    }
}

#[test]
fn union_idempotence() {
    for a in footprints(2) {
        let u = a.union(&a).unwrap().clean(1e-8).unwrap();
        let c = a.clean(1e-8).unwrap();
        assert!(difference_area(&u, &c) < EPS);
    }
}

#[test]
fn subtract_union_law() {
    let shapes = footprints(3);
    for pair in shapes.windows(2) {
        let (a, b) = (&pair[0], &pair[1].translate([1.0, 1.0]));
        let rebuilt = a
            .subtract(b)
            .unwrap()
            .union(&a.intersection(b).unwrap())
            .unwrap()
            .clean(1e-8)
            .unwrap();
        assert!(difference_area(&rebuilt, &a.clean(1e-8).unwrap()) < EPS);
    }
}

#[test]
fn buffer_monotonicity() {
    for a in footprints(4) {
        for (d1, d2) in [(-0.2, 0.0), (0.0, 0.5), (0.5, 1.5)] {
            let small = a.buffer(d1).unwrap();
            let large = a.buffer(d2).unwrap();
            let outside = small.subtract(&large).unwrap().area();
            assert!(outside < EPS, "buffer({d1}) not inside buffer({d2}): {outside}");
        }
    }
}

#[test]
fn extrude_closure() {
    for a in footprints(5) {
        for h in [0.5, 3.0, 12.0] {
            let solid = a.extrude(h).unwrap();
            assert!(is_closed(solid.mesh.as_ref().unwrap()));
            let bounds = solid.bounds().unwrap();
            assert_relative_eq!(bounds.min.z, 0.0, epsilon = 1e-9);
            assert_relative_eq!(bounds.max.z, h, epsilon = 1e-9);
            assert_relative_eq!(solid.volume(), a.area() * h, epsilon = 1e-6, max_relative = 1e-9);
        }
    }
}

#[test]
fn extrude_step_volume_bounds() {
    // convex footprints only
    for a in footprints(6).into_iter().filter(|a| a.convex_hull().area() - a.area() < EPS) {
        let q = a.buffer(-0.1).unwrap();
        let dh = 2.0;
        let solid = a.extrude_step(&q, dh, &StepOptions::default()).unwrap();
        let (lo, hi) = (a.area().min(q.area()), a.area().max(q.area()));
        let v = solid.volume();
        assert!(v >= lo * dh - EPS && v <= hi * dh + EPS, "volume {v} outside [{}, {}]", lo * dh, hi * dh);
    }
}

#[test]
fn extrude_closure_with_holes_and_parts() {
    for (a, _) in compound_footprints(8) {
        let parts = a.geom.polygons();
        assert!(parts.len() == 2 || parts[0].interiors().len() == 1);
        for h in [0.5, 4.0] {
            let solid = a.extrude(h).unwrap();
            assert!(is_closed(solid.mesh.as_ref().unwrap()));
            assert_relative_eq!(solid.volume(), a.area() * h, epsilon = 1e-6, max_relative = 1e-9);
        }
    }
}

#[test]
fn extrude_step_with_holes_and_parts() {
    let dh = 2.0;
    for (a, inset) in compound_footprints(9) {
        let solid = a.extrude_step(&inset, dh, &StepOptions::default()).unwrap();
        assert!(is_closed(solid.mesh.as_ref().unwrap()), "{}", a.geom.to_wkt());
        let (lo, hi) = (inset.area(), a.area());
        let v = solid.volume();
        assert!(v >= lo * dh - EPS && v <= hi * dh + EPS, "volume {v} outside [{}, {}]", lo * dh, hi * dh);

        // Collapsing every ring to a point stays closed and below the prism
        let apex = shapes::point(a.centroid().unwrap());
        let cone = a.extrude_step(&apex, dh, &StepOptions::default()).unwrap();
        assert!(is_closed(cone.mesh.as_ref().unwrap()));
        assert!(cone.volume() > 0.0 && cone.volume() < a.area() * dh);
    }
}

#[test]
fn selector_stability() {
    let mut root = Node::group2("root");
    let mut rng = DddRandom::new(7);
    for (i, footprint) in footprints(7).into_iter().enumerate() {
        let kind = *rng.choice(&["house", "shed", "garage"]).unwrap();
        let mut lot = footprint.named(format!("lot{i}")).with("kind", kind);
        if i % 3 == 0 {
            lot.append(shapes::point([0.0, 0.0]).named("tree").with("kind", "tree"));
        }
        root.append(lot);
    }

    for expr in ["/*", "/**", "[kind = house]", "/*/tree", "/lot*[kind != shed]"] {
        let selection = Selection::parse(expr).unwrap();
        let first = selection.select_ids(&root);
        let second = selection.select_ids(&root);
        assert_eq!(first, second, "{expr}");
    }
}

#[test]
fn uv_round_trip_stays_in_unit_range() {
    let footprint = shapes::rect([[0.0, 0.0], [1.0, 1.0]]);
    let solid = map_cubic(&footprint.extrude(1.0).unwrap(), 1.0, false);
    let planar = map_cubic(&footprint, 1.0, false);
    let mapped = map_3d_from_2d(&solid, &planar);
    let mesh = mapped.mesh.as_ref().unwrap();
    assert!(mesh.has_uvs());
    for v in &mesh.vertices {
        let uv = v.uv.unwrap();
        assert!(uv.iter().all(|c| (-1e-9..=1.0 + 1e-9).contains(c)), "{uv:?}");
    }
}
