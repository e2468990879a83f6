// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Extrude-step: stitching the top ring of an extrusion to a new shape

use super::align::{ring_from_line, vertex_order_align_snap};
use super::{ExtrusionMethod, ExtrusionState, StepOptions};
use crate::error::{DddError, Result};
use crate::geometry::shape2::open_ring;
use crate::geometry::{Mesh, Shape2, Triangle, Vertex};
use crate::ops2d::triangulate_polygon;
use crate::utils::math::triangle_area;
use ahash::AHashSet;
use geo::{BooleanOps, MultiPolygon, Polygon};
use nalgebra::{Point2, Point3};
use tracing::debug;

const MIN_FACE_AREA: f64 = 1e-12;

/// A stitchable part of a shape: one ring with its holes
#[derive(Debug, Clone)]
struct Section {
    exterior: Vec<Point2<f64>>,
    holes: Vec<Vec<Point2<f64>>>,
}

impl Section {
    fn point(p: Point2<f64>) -> Self {
        Self {
            exterior: vec![p],
            holes: Vec::new(),
        }
    }

    fn centroid(&self) -> Point2<f64> {
        ring_centroid(&self.exterior)
    }
}

fn ring_centroid(ring: &[Point2<f64>]) -> Point2<f64> {
    if ring.is_empty() {
        return Point2::origin();
    }
    let sum = ring.iter().fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
    Point2::from(sum / ring.len() as f64)
}

fn sections(shape: &Shape2) -> Vec<Section> {
    let oriented = shape.oriented();
    let mut out: Vec<Section> = oriented
        .polygons()
        .iter()
        .filter_map(|p| {
            let exterior = open_ring(p.exterior());
            (exterior.len() >= 3).then(|| Section {
                exterior,
                holes: p
                    .interiors()
                    .iter()
                    .map(open_ring)
                    .filter(|h| h.len() >= 3)
                    .collect(),
            })
        })
        .collect();
    for line in oriented.lines() {
        let pts: Vec<Point2<f64>> = line.0.iter().map(|c| Point2::new(c.x, c.y)).collect();
        if !pts.is_empty() {
            out.push(Section {
                exterior: ring_from_line(&pts),
                holes: Vec::new(),
            });
        }
    }
    out.extend(oriented.points().iter().map(|p| Section::point(Point2::new(p.x(), p.y()))));
    out
}

/// State of an extrusion that has not been stitched yet
pub fn initial_state(footprint: &Shape2) -> ExtrusionState {
    ExtrusionState {
        steps: 0,
        footprint: footprint.clone(),
        last_shape: footprint.oriented(),
        last_z: 0.0,
        cap_faces: Vec::new(),
    }
}

fn lift(p: &Point2<f64>, z: f64) -> Point3<f64> {
    Point3::new(p.x, p.y, z)
}

/// Append a triangle with its own vertices; faces below the area
/// threshold are skipped. Returns whether the face was emitted.
pub(crate) fn push_triangle(mesh: &mut Mesh, a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> bool {
    if triangle_area(&a, &b, &c) <= MIN_FACE_AREA {
        return false;
    }
    let i = mesh.add_vertex(Vertex::at(a));
    let j = mesh.add_vertex(Vertex::at(b));
    let k = mesh.add_vertex(Vertex::at(c));
    mesh.add_triangle(Triangle::new([i, j, k]));
    true
}

fn ring_params(ring: &[Point3<f64>]) -> Vec<f64> {
    let n = ring.len();
    let lengths: Vec<f64> = (0..n).map(|i| (ring[(i + 1) % n] - ring[i]).norm()).collect();
    let perimeter: f64 = lengths.iter().sum();
    let mut params = Vec::with_capacity(n);
    let mut acc = 0.0;
    for (i, len) in lengths.iter().enumerate() {
        params.push(if perimeter > 1e-12 {
            acc / perimeter
        } else {
            i as f64 / n as f64
        });
        acc += len;
    }
    params
}

/// Stitch ring `a` to ring `b` by walking both with a cursor over their
/// normalized perimeters. Every vertex of either ring is visited once, so
/// the strip never crosses itself. Rings of one vertex produce a fan.
pub(crate) fn stitch(mesh: &mut Mesh, a: &[Point3<f64>], b: &[Point3<f64>], flip: bool) {
    let (n, m) = (a.len(), b.len());
    if n == 0 || m == 0 {
        return;
    }
    let (ta, tb) = (ring_params(a), ring_params(b));
    let next = |t: &[f64], i: usize, len: usize| {
        if i >= len {
            f64::INFINITY
        } else if i + 1 < len {
            t[i + 1]
        } else {
            1.0
        }
    };
    let mut emit = |p: Point3<f64>, q: Point3<f64>, r: Point3<f64>| {
        if flip {
            push_triangle(mesh, p, r, q);
        } else {
            push_triangle(mesh, p, q, r);
        }
    };

    let (mut i, mut j) = (0, 0);
    while i < n || j < m {
        let (na, nb) = (next(&ta, i, n), next(&tb, j, m));
        let (pa, pb) = (a[i % n], b[j % m]);
        // Ties advance `b` first so ridges pair with the matching wall
        if na < nb {
            emit(pa, a[(i + 1) % n], pb);
            i += 1;
        } else {
            emit(pa, b[(j + 1) % m], pb);
            j += 1;
        }
    }
}

/// Triangulated polygon faces at height `z`, facing +Z or -Z
fn emit_polygon(mesh: &mut Mesh, polygon: &Polygon<f64>, z: f64, up: bool) -> Result<()> {
    let tri = triangulate_polygon(polygon)?;
    for f in &tri.faces {
        let (a, b, c) = (lift(&tri.points[f[0]], z), lift(&tri.points[f[1]], z), lift(&tri.points[f[2]], z));
        if up {
            push_triangle(mesh, a, b, c);
        } else {
            push_triangle(mesh, a, c, b);
        }
    }
    Ok(())
}

fn emit_area(mesh: &mut Mesh, area: &MultiPolygon<f64>, z: f64, up: bool) -> Result<()> {
    for polygon in &area.0 {
        emit_polygon(mesh, polygon, z, up)?;
    }
    Ok(())
}

fn check_finite(shape: &Shape2, what: &str) -> Result<()> {
    if shape.coords().iter().flatten().all(|c| c.is_finite()) {
        Ok(())
    } else {
        Err(DddError::geometry_msg(what, "non-finite coordinates"))
    }
}

/// Pair every section of `from` with a section of `to`, by nearest centroid.
/// Unpaired sections of `from` collapse to their own centroid.
fn pair_sections(from: &[Section], to: &[Section]) -> (Vec<(Section, Section)>, Vec<Section>) {
    let mut used = vec![false; to.len()];
    let mut pairs = Vec::with_capacity(from.len());
    for a in from {
        let ca = a.centroid();
        let best = to
            .iter()
            .enumerate()
            .filter(|(k, _)| !used[*k])
            .min_by(|(_, x), (_, y)| {
                (x.centroid() - ca)
                    .norm_squared()
                    .total_cmp(&(y.centroid() - ca).norm_squared())
            })
            .map(|(k, _)| k);
        match best {
            Some(k) => {
                used[k] = true;
                pairs.push((a.clone(), to[k].clone()));
            }
            None => pairs.push((a.clone(), Section::point(ca))),
        }
    }
    let orphans = to
        .iter()
        .zip(used)
        .filter(|(_, u)| !u)
        .map(|(s, _)| s.clone())
        .collect();
    (pairs, orphans)
}

fn stitch_rings_2d(mesh: &mut Mesh, a: &[Point2<f64>], z0: f64, b: &[Point2<f64>], z1: f64, flip: bool) {
    let b = vertex_order_align_snap(a, b);
    let a3: Vec<Point3<f64>> = a.iter().map(|p| lift(p, z0)).collect();
    let b3: Vec<Point3<f64>> = b.iter().map(|p| lift(p, z1)).collect();
    stitch(mesh, &a3, &b3, flip);
}

fn stitch_sections(mesh: &mut Mesh, a: &Section, z0: f64, b: &Section, z1: f64, flip: bool) {
    stitch_rings_2d(mesh, &a.exterior, z0, &b.exterior, z1, flip);
    for (k, hole) in a.holes.iter().enumerate() {
        let target = match b.holes.get(k) {
            Some(h) => h.clone(),
            None => vec![ring_centroid(hole)],
        };
        stitch_rings_2d(mesh, hole, z0, &target, z1, flip);
    }
    for hole in b.holes.iter().skip(a.holes.len()) {
        stitch_rings_2d(mesh, &[ring_centroid(hole)], z0, hole, z1, flip);
    }
}

/// Stitch one more ring on top of an extrusion.
///
/// `mesh` and `state` describe the extrusion so far; the returned mesh and
/// state include the new step. The previous top cap is removed, the base is
/// only emitted on the first step, and a step that neither moves nor
/// changes the shape is suppressed.
pub fn extrude_step(
    mesh: &Mesh,
    state: &ExtrusionState,
    target: &Shape2,
    dh: f64,
    opts: &StepOptions,
) -> Result<(Mesh, ExtrusionState)> {
    check_finite(target, "extrude_step target")?;
    if !dh.is_finite() {
        return Err(DddError::geometry_msg("extrude_step", "non-finite step height"));
    }
    let from = sections(&state.last_shape);
    if from.is_empty() {
        return Err(DddError::geometry_msg("extrude_step", "no ring to extrude from"));
    }
    let target = target.oriented();
    if dh == 0.0 && target == state.last_shape {
        debug!("Suppressed degenerate extrude step");
        return Ok((mesh.clone(), state.clone()));
    }

    let (z0, z1) = (state.last_z, state.last_z + dh);
    let flip = dh < 0.0;

    let mut out = mesh.clone();
    if !state.cap_faces.is_empty() {
        let caps: AHashSet<usize> = state.cap_faces.iter().copied().collect();
        out.retain_faces(|i, _| !caps.contains(&i));
    }

    if state.steps == 0 && opts.base {
        for polygon in state.last_shape.polygons() {
            emit_polygon(&mut out, &polygon, z0, flip)?;
        }
    }

    match opts.method {
        ExtrusionMethod::Correspondence => {
            let to = sections(&target);
            let (pairs, orphans) = pair_sections(&from, &to);
            for (a, b) in &pairs {
                stitch_sections(&mut out, a, z0, b, z1, flip);
            }
            for b in &orphans {
                stitch_sections(&mut out, &Section::point(b.centroid()), z0, b, z1, flip);
            }
        }
        ExtrusionMethod::Subtract => {
            let (pa, pb) = (state.last_shape.to_multipolygon(), target.to_multipolygon());
            emit_area(&mut out, &pa.difference(&pb), z0, !flip)?;
            emit_area(&mut out, &pb.difference(&pa), z0, flip)?;
            for section in sections(&target) {
                stitch_sections(&mut out, &section, z0, &section, z1, flip);
            }
        }
    }

    let cap_start = out.triangles.len();
    if opts.cap {
        for polygon in target.polygons() {
            emit_polygon(&mut out, &polygon, z1, !flip)?;
        }
    }
    let cap_faces: Vec<usize> = (cap_start..out.triangles.len()).collect();

    out.merge_vertices();
    out.remove_orphaned_vertices();
    out.recompute_normals();

    let next = ExtrusionState {
        steps: state.steps + 1,
        footprint: state.footprint.clone(),
        last_shape: target,
        last_z: z1,
        cap_faces,
    };
    debug!(steps = next.steps, z = z1, faces = out.triangle_count(), "Extrude step");
    Ok((out, next))
}
