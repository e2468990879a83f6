// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Ear-clipping triangulation of planar polygons

use crate::error::{DddError, Result};
use crate::geometry::shape2::open_ring;
use crate::geometry::{Mesh, Shape2, Triangle, Vertex};
use crate::utils::math::cross2;
use geo::Polygon;
use nalgebra::{Point2, Point3, Vector3};

/// Triangulated polygon: flat vertex list and counter-clockwise faces
#[derive(Debug, Clone, Default)]
pub struct PlanarTriangulation {
    pub points: Vec<Point2<f64>>,
    pub faces: Vec<[usize; 3]>,
}

/// Triangulate one polygon with holes. Faces are returned counter-clockwise;
/// zero-area ears are dropped.
pub fn triangulate_polygon(polygon: &Polygon<f64>) -> Result<PlanarTriangulation> {
    let mut points: Vec<Point2<f64>> = Vec::new();
    let mut holes: Vec<usize> = Vec::new();

    let exterior = open_ring(polygon.exterior());
    if exterior.len() < 3 {
        return Ok(PlanarTriangulation::default());
    }
    points.extend(exterior);
    for interior in polygon.interiors() {
        let ring = open_ring(interior);
        if ring.len() < 3 {
            continue;
        }
        holes.push(points.len());
        points.extend(ring);
    }

    let flat: Vec<f64> = points.iter().flat_map(|p| [p.x, p.y]).collect();
    let indices = earcutr::earcut(&flat, &holes, 2)
        .map_err(|e| DddError::geometry_msg("Polygon", format!("triangulation failed: {e}")))?;

    let faces = indices
        .chunks_exact(3)
        .filter_map(|t| {
            let area = cross2(&points[t[0]], &points[t[1]], &points[t[2]]);
            if area.abs() <= 1e-14 {
                None
            } else if area > 0.0 {
                Some([t[0], t[1], t[2]])
            } else {
                Some([t[0], t[2], t[1]])
            }
        })
        .collect();

    Ok(PlanarTriangulation { points, faces })
}

/// Triangulate every polygon of a shape into a flat mesh at `z`, facing +Z.
/// With `twosided`, a flipped copy with its own vertices faces -Z.
pub fn triangulate(shape: &Shape2, z: f64, twosided: bool) -> Result<Mesh> {
    let mut mesh = Mesh::new();
    let up = Vector3::z();
    for polygon in shape.polygons() {
        let tri = triangulate_polygon(&polygon)?;
        let sides: &[bool] = if twosided { &[false, true] } else { &[false] };
        for &back in sides {
            let normal = if back { -up } else { up };
            let offset = mesh.vertices.len();
            for p in &tri.points {
                mesh.add_vertex(Vertex::new(Point3::new(p.x, p.y, z), normal));
            }
            for f in &tri.faces {
                let t = Triangle::new([f[0] + offset, f[1] + offset, f[2] + offset]);
                mesh.add_triangle(if back { t.flipped() } else { t });
            }
        }
    }
    Ok(mesh)
}
