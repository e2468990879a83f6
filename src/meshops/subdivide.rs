// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Re-triangulation of faces against a regular grid

use crate::geometry::{Mesh, Triangle, Vertex};
use crate::node::Node3;
use crate::utils::math::triangle_normal_raw;
use nalgebra::{Point2, Point3, Vector3};
use tracing::debug;

const MIN_AREA: f64 = 1e-12;

/// Split every face so each resulting triangle fits in one cell of a grid
/// of `grid_size`, in this node and its mesh descendants
pub fn subdivide_to_grid(obj: &Node3, grid_size: f64) -> Node3 {
    obj.map_meshes(&|m: &Mesh| subdivide_mesh(m, grid_size))
}

/// Grid subdivision of one mesh. Each face is projected on the plane of its
/// dominant axis, clipped against the grid cells it covers, and the pieces
/// are lifted back onto the face plane. Zero-area source faces and pieces
/// are skipped.
pub fn subdivide_mesh(mesh: &Mesh, grid_size: f64) -> Mesh {
    if !(grid_size > 0.0) || !grid_size.is_finite() {
        return mesh.clone();
    }
    let mut out = Mesh::with_capacity(mesh.vertex_count(), mesh.triangle_count() * 4);
    let mut skipped = 0usize;

    for t in &mesh.triangles {
        let corners = t.indices.map(|i| mesh.vertices[i]);
        let [a, b, c] = corners.map(|v| v.position);
        let normal = triangle_normal_raw(&a, &b, &c);
        if normal.norm() * 0.5 <= MIN_AREA {
            skipped += 1;
            continue;
        }
        let (u, v) = plane_axes(&normal);
        let flat = corners.map(|vx| Point2::new(vx.position[u], vx.position[v]));

        let (min, max) = flat.iter().fold(
            (Point2::new(f64::INFINITY, f64::INFINITY), Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY)),
            |(lo, hi), p| (lo.inf(p), hi.sup(p)),
        );
        let (i0, i1) = cell_range(min.x, max.x, grid_size);
        let (j0, j1) = cell_range(min.y, max.y, grid_size);

        for i in i0..i1 {
            for j in j0..j1 {
                let cell_min = Point2::new(i as f64 * grid_size, j as f64 * grid_size);
                let cell_max = Point2::new(cell_min.x + grid_size, cell_min.y + grid_size);
                let piece = clip_to_cell(&flat, &cell_min, &cell_max);
                if piece.len() < 3 {
                    continue;
                }
                let lifted: Vec<Vertex> = piece.iter().map(|p| lift(&corners, &flat, p)).collect();
                for k in 1..lifted.len() - 1 {
                    let tri = [lifted[0], lifted[k], lifted[k + 1]];
                    let area = triangle_normal_raw(&tri[0].position, &tri[1].position, &tri[2].position).norm() * 0.5;
                    if area <= MIN_AREA {
                        continue;
                    }
                    let base = out.vertex_count();
                    for vx in tri {
                        out.add_vertex(vx);
                    }
                    out.add_triangle(Triangle::new([base, base + 1, base + 2]));
                }
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "Zero-area faces skipped during grid subdivision");
    }
    out.merge_vertices();
    out
}

/// Indices of the two coordinates kept when projecting along the dominant
/// axis of `normal`
fn plane_axes(normal: &Vector3<f64>) -> (usize, usize) {
    let n = normal.abs();
    if n.x >= n.y && n.x >= n.z {
        (1, 2)
    } else if n.y >= n.z {
        (0, 2)
    } else {
        (0, 1)
    }
}

fn cell_range(lo: f64, hi: f64, size: f64) -> (i64, i64) {
    let start = (lo / size).floor() as i64;
    let end = ((hi / size).ceil() as i64).max(start + 1);
    (start, end)
}

/// Sutherland-Hodgman clip of a convex polygon against an axis-aligned cell
fn clip_to_cell(polygon: &[Point2<f64>], min: &Point2<f64>, max: &Point2<f64>) -> Vec<Point2<f64>> {
    let mut out = polygon.to_vec();
    for axis in 0..2 {
        for (bound, keep_below) in [(min[axis], false), (max[axis], true)] {
            if out.is_empty() {
                return out;
            }
            let inside = |p: &Point2<f64>| if keep_below { p[axis] <= bound } else { p[axis] >= bound };
            let input = std::mem::take(&mut out);
            for k in 0..input.len() {
                let cur = input[k];
                let prev = input[(k + input.len() - 1) % input.len()];
                let (cur_in, prev_in) = (inside(&cur), inside(&prev));
                if cur_in != prev_in {
                    let t = (bound - prev[axis]) / (cur[axis] - prev[axis]);
                    out.push(prev + (cur - prev) * t);
                }
                if cur_in {
                    out.push(cur);
                }
            }
        }
    }
    out
}

/// Point of the source face whose projection is `p`, with interpolated
/// normal and texture coordinates
fn lift(corners: &[Vertex; 3], flat: &[Point2<f64>; 3], p: &Point2<f64>) -> Vertex {
    let [a, b, c] = flat;
    let det = (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y);
    let wb = ((p.x - a.x) * (c.y - a.y) - (c.x - a.x) * (p.y - a.y)) / det;
    let wc = ((b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y)) / det;
    let wa = 1.0 - wb - wc;
    let w = [wa, wb, wc];

    let position = Point3::from(
        corners
            .iter()
            .zip(w)
            .map(|(v, k)| v.position.coords * k)
            .sum::<Vector3<f64>>(),
    );
    let normal = corners.iter().zip(w).map(|(v, k)| v.normal * k).sum::<Vector3<f64>>();
    let normal = if normal.norm() > 0.0 { normal.normalize() } else { normal };
    let uv = match corners.map(|v| v.uv) {
        [Some(ua), Some(ub), Some(uc)] => Some([
            ua[0] * wa + ub[0] * wb + uc[0] * wc,
            ua[1] * wa + ub[1] * wb + uc[1] * wc,
        ]),
        _ => None,
    };
    Vertex { position, normal, uv }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::mesh_utils::is_closed;
    use crate::geometry::Primitive;

    #[test]
    fn test_pieces_fit_in_cells() {
        let square = Mesh::from_raw(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [0, 2, 3]],
        );
        let fine = subdivide_mesh(&square, 0.5);
        assert!(fine.triangle_count() > square.triangle_count());
        assert!((fine.area() - 1.0).abs() < 1e-9);
        for i in 0..fine.triangle_count() {
            let pts = fine.triangle_positions(i);
            let min_x = pts.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
            let max_x = pts.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
            assert!(max_x - min_x <= 0.5 + 1e-9);
            assert!(fine.face_normal(i).unwrap().z > 0.0);
        }
    }

    #[test]
    fn test_cube_stays_closed() {
        let cube = Primitive::cube(Vector3::new(1.0, 1.0, 1.0), false).to_mesh();
        let fine = subdivide_mesh(&cube, 0.5);
        assert!(is_closed(&fine));
        assert!((fine.volume() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_area_faces_are_dropped() {
        let sliver = Mesh::from_raw(
            &[Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)],
            &[[0, 1, 2]],
        );
        assert!(subdivide_mesh(&sliver, 0.5).is_empty());
    }
}
