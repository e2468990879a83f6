// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Planar geometry carried by 2D nodes

use geo::{
    Area, Centroid, Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Orient, Point, Polygon,
};
use geo::orient::Direction;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Discriminant of a [`Shape2`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Empty,
    Point,
    Line,
    Polygon,
    MultiPolygon,
    MultiLine,
    Collection,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Empty => "Empty",
            Self::Point => "Point",
            Self::Line => "LineString",
            Self::Polygon => "Polygon",
            Self::MultiPolygon => "MultiPolygon",
            Self::MultiLine => "MultiLineString",
            Self::Collection => "GeometryCollection",
        };
        f.write_str(name)
    }
}

/// Tagged planar geometry
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "geometry")]
pub enum Shape2 {
    #[default]
    Empty,
    Point(Point<f64>),
    Line(LineString<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
    MultiLine(MultiLineString<f64>),
    Collection(Vec<Shape2>),
}

pub fn coord(p: [f64; 2]) -> Coord<f64> {
    Coord { x: p[0], y: p[1] }
}

pub fn to_point2(c: Coord<f64>) -> Point2<f64> {
    Point2::new(c.x, c.y)
}

pub fn from_point2(p: Point2<f64>) -> Coord<f64> {
    Coord { x: p.x, y: p.y }
}

/// Ring coordinates without the closing duplicate
pub fn open_ring(ring: &LineString<f64>) -> Vec<Point2<f64>> {
    let mut points: Vec<Point2<f64>> = ring.0.iter().map(|c| to_point2(*c)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

/// Closed ring from open coordinates
pub fn close_ring(points: &[Point2<f64>]) -> LineString<f64> {
    let mut coords: Vec<Coord<f64>> = points.iter().map(|p| from_point2(*p)).collect();
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    LineString::new(coords)
}

impl Shape2 {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Self::Empty => ShapeKind::Empty,
            Self::Point(_) => ShapeKind::Point,
            Self::Line(_) => ShapeKind::Line,
            Self::Polygon(_) => ShapeKind::Polygon,
            Self::MultiPolygon(_) => ShapeKind::MultiPolygon,
            Self::MultiLine(_) => ShapeKind::MultiLine,
            Self::Collection(_) => ShapeKind::Collection,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Point(_) => false,
            Self::Line(l) => l.0.len() < 2,
            Self::Polygon(p) => p.exterior().0.len() < 4,
            Self::MultiPolygon(mp) => mp.0.iter().all(|p| p.exterior().0.len() < 4),
            Self::MultiLine(ml) => ml.0.iter().all(|l| l.0.len() < 2),
            Self::Collection(items) => items.iter().all(Shape2::is_empty),
        }
    }

    pub fn is_polygonal(&self) -> bool {
        match self {
            Self::Polygon(_) | Self::MultiPolygon(_) => true,
            Self::Collection(items) => {
                !items.is_empty() && items.iter().all(|s| s.is_polygonal() || s.is_empty())
            }
            _ => false,
        }
    }

    pub fn is_linear(&self) -> bool {
        match self {
            Self::Line(_) | Self::MultiLine(_) => true,
            Self::Collection(items) => {
                !items.is_empty() && items.iter().all(|s| s.is_linear() || s.is_empty())
            }
            _ => false,
        }
    }

    /// Normalize a boolean result: nothing becomes `Empty`, one part becomes `Polygon`
    pub fn from_multipolygon(mut mp: MultiPolygon<f64>) -> Self {
        mp.0.retain(|p| p.exterior().0.len() >= 4);
        match mp.0.len() {
            0 => Self::Empty,
            1 => Self::Polygon(mp.0.remove(0)),
            _ => Self::MultiPolygon(mp),
        }
    }

    pub fn from_multiline(mut ml: MultiLineString<f64>) -> Self {
        ml.0.retain(|l| l.0.len() >= 2);
        match ml.0.len() {
            0 => Self::Empty,
            1 => Self::Line(ml.0.remove(0)),
            _ => Self::MultiLine(ml),
        }
    }

    /// Collapse a list of parts into the tightest variant
    pub fn from_parts(parts: Vec<Shape2>) -> Self {
        let mut parts: Vec<Shape2> = parts.into_iter().filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return Self::Empty;
        }
        if parts.len() == 1 {
            return parts.remove(0);
        }
        if parts.iter().all(Shape2::is_polygonal) {
            return Self::from_multipolygon(MultiPolygon::new(
                parts.iter().flat_map(Shape2::polygons).collect(),
            ));
        }
        if parts.iter().all(Shape2::is_linear) {
            return Self::from_multiline(MultiLineString::new(
                parts.iter().flat_map(Shape2::lines).collect(),
            ));
        }
        Self::Collection(parts)
    }

    pub fn from_geometry(geometry: Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(p) => Self::Point(p),
            Geometry::Line(l) => Self::Line(LineString::new(vec![l.start, l.end])),
            Geometry::LineString(l) => Self::Line(l),
            Geometry::Polygon(p) => Self::Polygon(p),
            Geometry::MultiPoint(mp) => Self::from_parts(mp.0.into_iter().map(Self::Point).collect()),
            Geometry::MultiLineString(ml) => Self::from_multiline(ml),
            Geometry::MultiPolygon(mp) => Self::from_multipolygon(mp),
            Geometry::GeometryCollection(gc) => {
                Self::from_parts(gc.0.into_iter().map(Self::from_geometry).collect())
            }
            Geometry::Rect(r) => Self::Polygon(r.to_polygon()),
            Geometry::Triangle(t) => Self::Polygon(t.to_polygon()),
        }
    }

    pub fn to_geometry(&self) -> Option<Geometry<f64>> {
        match self {
            Self::Empty => None,
            Self::Point(p) => Some(Geometry::Point(*p)),
            Self::Line(l) => Some(Geometry::LineString(l.clone())),
            Self::Polygon(p) => Some(Geometry::Polygon(p.clone())),
            Self::MultiPolygon(mp) => Some(Geometry::MultiPolygon(mp.clone())),
            Self::MultiLine(ml) => Some(Geometry::MultiLineString(ml.clone())),
            Self::Collection(items) => Some(Geometry::GeometryCollection(GeometryCollection::new_from(
                items.iter().filter_map(Shape2::to_geometry).collect(),
            ))),
        }
    }

    /// Polygonal parts, flattened
    pub fn polygons(&self) -> Vec<Polygon<f64>> {
        match self {
            Self::Polygon(p) => vec![p.clone()],
            Self::MultiPolygon(mp) => mp.0.clone(),
            Self::Collection(items) => items.iter().flat_map(Shape2::polygons).collect(),
            _ => Vec::new(),
        }
    }

    pub fn to_multipolygon(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(self.polygons())
    }

    /// Linear parts, flattened
    pub fn lines(&self) -> Vec<LineString<f64>> {
        match self {
            Self::Line(l) => vec![l.clone()],
            Self::MultiLine(ml) => ml.0.clone(),
            Self::Collection(items) => items.iter().flat_map(Shape2::lines).collect(),
            _ => Vec::new(),
        }
    }

    pub fn points(&self) -> Vec<Point<f64>> {
        match self {
            Self::Point(p) => vec![*p],
            Self::Collection(items) => items.iter().flat_map(Shape2::points).collect(),
            _ => Vec::new(),
        }
    }

    /// Every ring and line of the shape as coordinate sequences
    pub fn paths(&self) -> Vec<&LineString<f64>> {
        match self {
            Self::Line(l) => vec![l],
            Self::MultiLine(ml) => ml.0.iter().collect(),
            Self::Polygon(p) => std::iter::once(p.exterior()).chain(p.interiors()).collect(),
            Self::MultiPolygon(mp) => mp
                .0
                .iter()
                .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
                .collect(),
            Self::Collection(items) => items.iter().flat_map(Shape2::paths).collect(),
            _ => Vec::new(),
        }
    }

    /// All coordinates, rings including their closing vertex
    pub fn coords(&self) -> Vec<[f64; 2]> {
        match self {
            Self::Empty => Vec::new(),
            Self::Point(p) => vec![[p.x(), p.y()]],
            Self::Collection(items) => items.iter().flat_map(Shape2::coords).collect(),
            _ => self
                .paths()
                .into_iter()
                .flat_map(|l| l.0.iter().map(|c| [c.x, c.y]))
                .collect(),
        }
    }

    /// Axis-aligned bounds as `(min, max)`
    pub fn bounds(&self) -> Option<([f64; 2], [f64; 2])> {
        let coords = self.coords();
        if coords.is_empty() {
            return None;
        }
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for c in coords {
            for i in 0..2 {
                min[i] = min[i].min(c[i]);
                max[i] = max[i].max(c[i]);
            }
        }
        Some((min, max))
    }

    pub fn area(&self) -> f64 {
        match self {
            Self::Polygon(p) => p.unsigned_area(),
            Self::MultiPolygon(mp) => mp.unsigned_area(),
            Self::Collection(items) => items.iter().map(Shape2::area).sum(),
            _ => 0.0,
        }
    }

    /// Line length, or perimeter for polygons
    pub fn length(&self) -> f64 {
        self.paths()
            .into_iter()
            .map(|l| {
                l.0.windows(2)
                    .map(|w| ((w[1].x - w[0].x).powi(2) + (w[1].y - w[0].y).powi(2)).sqrt())
                    .sum::<f64>()
            })
            .sum()
    }

    pub fn centroid(&self) -> Option<Point<f64>> {
        match self {
            Self::Empty => None,
            Self::Point(p) => Some(*p),
            Self::Polygon(p) => p.centroid(),
            Self::MultiPolygon(mp) => mp.centroid(),
            Self::Line(l) => l.centroid(),
            Self::MultiLine(ml) => ml.centroid(),
            Self::Collection(_) => self.to_geometry().and_then(|g| g.centroid()),
        }
    }

    /// Apply a coordinate function to every vertex
    pub fn map_coords(&self, f: &impl Fn([f64; 2]) -> [f64; 2]) -> Shape2 {
        let map_c = |c: &Coord<f64>| coord(f([c.x, c.y]));
        let map_l = |l: &LineString<f64>| LineString::new(l.0.iter().map(map_c).collect());
        let map_p = |p: &Polygon<f64>| {
            Polygon::new(map_l(p.exterior()), p.interiors().iter().map(map_l).collect())
        };
        match self {
            Self::Empty => Self::Empty,
            Self::Point(p) => Self::Point(Point::from(map_c(&p.0))),
            Self::Line(l) => Self::Line(map_l(l)),
            Self::Polygon(p) => Self::Polygon(map_p(p)),
            Self::MultiPolygon(mp) => Self::MultiPolygon(MultiPolygon::new(mp.0.iter().map(map_p).collect())),
            Self::MultiLine(ml) => Self::MultiLine(MultiLineString::new(ml.0.iter().map(map_l).collect())),
            Self::Collection(items) => Self::Collection(items.iter().map(|s| s.map_coords(f)).collect()),
        }
    }

    /// Exterior rings counter-clockwise, holes clockwise
    pub fn oriented(&self) -> Shape2 {
        match self {
            Self::Polygon(p) => Self::Polygon(p.orient(Direction::Default)),
            Self::MultiPolygon(mp) => Self::MultiPolygon(mp.orient(Direction::Default)),
            Self::Collection(items) => Self::Collection(items.iter().map(Shape2::oriented).collect()),
            other => other.clone(),
        }
    }

    /// Boundary rings as lines
    pub fn outline(&self) -> Shape2 {
        match self {
            Self::Polygon(_) | Self::MultiPolygon(_) => Self::from_multiline(MultiLineString::new(
                self.paths().into_iter().cloned().collect(),
            )),
            Self::Collection(items) => Self::from_parts(items.iter().map(Shape2::outline).collect()),
            other => other.clone(),
        }
    }

    pub fn without_holes(&self) -> Shape2 {
        let strip = |p: &Polygon<f64>| Polygon::new(p.exterior().clone(), vec![]);
        match self {
            Self::Polygon(p) => Self::Polygon(strip(p)),
            Self::MultiPolygon(mp) => Self::MultiPolygon(MultiPolygon::new(mp.0.iter().map(strip).collect())),
            Self::Collection(items) => Self::Collection(items.iter().map(Shape2::without_holes).collect()),
            other => other.clone(),
        }
    }

    /// Split into single-part shapes
    pub fn parts(&self) -> Vec<Shape2> {
        match self {
            Self::Empty => Vec::new(),
            Self::MultiPolygon(mp) => mp.0.iter().cloned().map(Self::Polygon).collect(),
            Self::MultiLine(ml) => ml.0.iter().cloned().map(Self::Line).collect(),
            Self::Collection(items) => items.iter().flat_map(Shape2::parts).collect(),
            other => vec![other.clone()],
        }
    }

    pub fn multipoint(&self) -> MultiPoint<f64> {
        MultiPoint::new(self.coords().into_iter().map(|c| Point::new(c[0], c[1])).collect())
    }

    /// Well-known text representation
    pub fn to_wkt(&self) -> String {
        fn seq(l: &LineString<f64>) -> String {
            let pts: Vec<String> = l.0.iter().map(|c| format!("{} {}", c.x, c.y)).collect();
            format!("({})", pts.join(", "))
        }
        fn poly(p: &Polygon<f64>) -> String {
            let rings: Vec<String> = std::iter::once(p.exterior())
                .chain(p.interiors())
                .map(seq)
                .collect();
            format!("({})", rings.join(", "))
        }
        match self {
            Self::Empty => "GEOMETRYCOLLECTION EMPTY".to_string(),
            Self::Point(p) => format!("POINT ({} {})", p.x(), p.y()),
            Self::Line(l) => format!("LINESTRING {}", seq(l)),
            Self::Polygon(p) => format!("POLYGON {}", poly(p)),
            Self::MultiPolygon(mp) => {
                let parts: Vec<String> = mp.0.iter().map(poly).collect();
                format!("MULTIPOLYGON ({})", parts.join(", "))
            }
            Self::MultiLine(ml) => {
                let parts: Vec<String> = ml.0.iter().map(seq).collect();
                format!("MULTILINESTRING ({})", parts.join(", "))
            }
            Self::Collection(items) => {
                let parts: Vec<String> = items.iter().map(Shape2::to_wkt).collect();
                format!("GEOMETRYCOLLECTION ({})", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn unit_square() -> Shape2 {
        Shape2::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)])
    }

    #[test]
    fn test_kind_and_measures() {
        let s = unit_square();
        assert_eq!(s.kind(), ShapeKind::Polygon);
        assert!((s.area() - 1.0).abs() < 1e-12);
        assert!((s.length() - 4.0).abs() < 1e-12);
        assert_eq!(s.bounds(), Some(([0.0, 0.0], [1.0, 1.0])));
        let c = s.centroid().unwrap();
        assert!((c.x() - 0.5).abs() < 1e-12 && (c.y() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_from_parts_collapses() {
        assert_eq!(Shape2::from_parts(vec![]).kind(), ShapeKind::Empty);
        let merged = Shape2::from_parts(vec![unit_square(), unit_square().map_coords(&|c| [c[0] + 2.0, c[1]])]);
        assert_eq!(merged.kind(), ShapeKind::MultiPolygon);
        assert_eq!(merged.parts().len(), 2);
    }

    #[test]
    fn test_outline_is_linear() {
        let outline = unit_square().outline();
        assert_eq!(outline.kind(), ShapeKind::Line);
        assert!((outline.length() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_wkt() {
        assert_eq!(Shape2::Point(Point::new(1.0, 2.0)).to_wkt(), "POINT (1 2)");
        assert!(unit_square().to_wkt().starts_with("POLYGON ((0 0, 1 0"));
    }

    #[test]
    fn test_open_ring_drops_closing_vertex() {
        let s = unit_square();
        let ring = open_ring(s.polygons()[0].exterior());
        assert_eq!(ring.len(), 4);
        assert_eq!(close_ring(&ring).0.len(), 5);
    }
}
