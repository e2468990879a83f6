// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! SVG exporter for planar trees

use crate::error::{DddError, Result};
use crate::geometry::Shape2;
use crate::node::{Node, Node2, SceneNode};
use geo::LineString;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Namespace of the `ddd:` metadata attributes
pub const METADATA_NS: &str = "urn:ddd:metadata";

/// Attributes under this prefix become SVG presentation attributes
const SVG_PREFIX: &str = "svg:";

const DEFAULT_FILL: &str = "#808080";
const POINT_RADIUS: f64 = 0.5;

pub fn export(root: &Node, path: &Path) -> Result<()> {
    std::fs::write(path, to_svg_string(root)?)?;
    debug!(path = %path.display(), "SVG exported");
    Ok(())
}

/// SVG document for the 2D part of the tree. Y is flipped so +Y points up.
pub fn to_svg_string(root: &Node) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let (min, max) = planar_bounds(root).unwrap_or(([0.0, 0.0], [1.0, 1.0]));
    let width = (max[0] - min[0]).max(f64::EPSILON);
    let height = (max[1] - min[1]).max(f64::EPSILON);

    let mut svg = BytesStart::new("svg");
    svg.push_attribute(("xmlns", "http://www.w3.org/2000/svg"));
    svg.push_attribute(("xmlns:ddd", METADATA_NS));
    let view_box = format!("{} {} {} {}", num(min[0]), num(-max[1]), num(width), num(height));
    svg.push_attribute(("viewBox", view_box.as_str()));
    svg.push_attribute(("width", num(width).as_str()));
    svg.push_attribute(("height", num(height).as_str()));
    emit(&mut writer, Event::Start(svg))?;

    write_node(&mut writer, root)?;

    emit(&mut writer, Event::End(BytesEnd::new("svg")))?;
    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).map_err(|e| DddError::Export(e.to_string()))
}

fn write_node(writer: &mut Writer<Cursor<Vec<u8>>>, node: &Node) -> Result<()> {
    let Node::D2(n) = node else {
        debug!(node = %node.label(), "Skipping non-planar subtree in SVG export");
        return Ok(());
    };

    let group = !n.children().is_empty();
    if group {
        let mut g = BytesStart::new("g");
        for (key, value) in metadata(n) {
            g.push_attribute((key.as_str(), value.as_str()));
        }
        emit(writer, Event::Start(g))?;
    }

    if let Some(element) = shape_element(n) {
        emit(writer, Event::Empty(element))?;
    }

    for child in n.children() {
        write_node(writer, child)?;
    }

    if group {
        emit(writer, Event::End(BytesEnd::new("g")))?;
    }
    Ok(())
}

/// One element for the node's own geometry
fn shape_element(n: &Node2) -> Option<BytesStart<'static>> {
    if n.geom.is_empty() {
        return None;
    }

    let mut attrs: BTreeMap<String, String> = BTreeMap::new();
    let fill = n
        .get_material()
        .map(|m| m.color_hex_string())
        .unwrap_or_else(|| DEFAULT_FILL.to_string());

    let element = match &n.geom {
        Shape2::Point(p) => {
            attrs.insert("cx".into(), num(p.x()));
            attrs.insert("cy".into(), num(-p.y()));
            attrs.insert("r".into(), num(POINT_RADIUS));
            attrs.insert("fill".into(), fill);
            "circle"
        }
        geom => {
            let d = path_data(geom);
            if d.is_empty() {
                return None;
            }
            attrs.insert("d".into(), d);
            if geom.is_polygonal() {
                attrs.insert("fill".into(), fill);
                attrs.insert("fill-rule".into(), "evenodd".into());
            } else {
                attrs.insert("fill".into(), "none".into());
                attrs.insert("stroke".into(), fill);
            }
            "path"
        }
    };

    if let Some(alpha) = n.get_material().map(|m| m.color[3]).filter(|a| *a < 1.0) {
        attrs.insert("fill-opacity".into(), num(alpha));
    }
    for (key, value) in n.attrs() {
        if let Some(name) = key.strip_prefix(SVG_PREFIX) {
            attrs.insert(name.to_string(), value.to_string());
        }
    }
    if n.children().is_empty() {
        attrs.extend(metadata(n));
    }

    let mut start = BytesStart::new(element);
    for (key, value) in &attrs {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    Some(start)
}

/// Name, material and non-presentation attributes in the `ddd:` namespace
fn metadata(n: &Node2) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(name) = n.name() {
        out.insert("ddd:name".to_string(), name.to_string());
    }
    if let Some(material) = n.get_material() {
        out.insert("ddd:material".to_string(), material.name.clone());
    }
    let extras: serde_json::Map<String, serde_json::Value> = n
        .attrs()
        .iter()
        .filter(|(k, _)| !k.starts_with(SVG_PREFIX))
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    if !extras.is_empty() {
        out.insert(
            "ddd:attrs".to_string(),
            serde_json::Value::Object(extras).to_string(),
        );
    }
    out
}

fn path_data(geom: &Shape2) -> String {
    let mut parts = Vec::new();
    for polygon in geom.polygons() {
        for ring in std::iter::once(polygon.exterior()).chain(polygon.interiors()) {
            parts.push(ring_data(ring, true));
        }
    }
    for line in geom.lines() {
        parts.push(ring_data(&line, false));
    }
    parts.retain(|p| !p.is_empty());
    parts.join(" ")
}

fn ring_data(ring: &LineString<f64>, closed: bool) -> String {
    let mut coords = ring.0.as_slice();
    if closed && coords.len() > 1 && coords.first() == coords.last() {
        coords = &coords[..coords.len() - 1];
    }
    if coords.is_empty() {
        return String::new();
    }
    let mut d = String::new();
    for (i, c) in coords.iter().enumerate() {
        let cmd = if i == 0 { "M" } else { "L" };
        if i > 0 {
            d.push(' ');
        }
        d.push_str(&format!("{cmd}{} {}", num(c.x), num(-c.y)));
    }
    if closed {
        d.push_str(" Z");
    }
    d
}

fn planar_bounds(root: &Node) -> Option<([f64; 2], [f64; 2])> {
    let mut bounds: Option<([f64; 2], [f64; 2])> = None;
    collect_bounds(root, &mut bounds);
    bounds
}

fn collect_bounds(node: &Node, acc: &mut Option<([f64; 2], [f64; 2])>) {
    let Node::D2(n) = node else {
        return;
    };
    if let Some((lo, hi)) = n.geom.bounds() {
        let (mut lo, mut hi) = (lo, hi);
        if matches!(n.geom, Shape2::Point(_)) {
            lo = [lo[0] - POINT_RADIUS, lo[1] - POINT_RADIUS];
            hi = [hi[0] + POINT_RADIUS, hi[1] + POINT_RADIUS];
        }
        *acc = Some(match *acc {
            None => (lo, hi),
            Some((a, b)) => (
                [a[0].min(lo[0]), a[1].min(lo[1])],
                [b[0].max(hi[0]), b[1].max(hi[1])],
            ),
        });
    }
    for child in n.children() {
        collect_bounds(child, acc);
    }
}

fn emit(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| DddError::Export(format!("SVG write failed: {e}")))
}

/// Compact number formatting without negative zero
fn num(v: f64) -> String {
    let v = if v == 0.0 { 0.0 } else { v };
    let rounded = (v * 1e6).round() / 1e6;
    format!("{rounded}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Material;
    use crate::shapes;
    use quick_xml::events::Event;
    use quick_xml::Reader;

    /// (element name, attributes) of every start or empty element
    fn elements(svg: &str) -> Vec<(String, BTreeMap<String, String>)> {
        let mut reader = Reader::from_str(svg);
        let mut out = Vec::new();
        loop {
            match reader.read_event().unwrap() {
                Event::Start(e) | Event::Empty(e) => {
                    let name = String::from_utf8(e.name().as_ref().to_vec()).unwrap();
                    let attrs = e
                        .attributes()
                        .map(|a| {
                            let a = a.unwrap();
                            (
                                String::from_utf8(a.key.as_ref().to_vec()).unwrap(),
                                a.unescape_value().unwrap().into_owned(),
                            )
                        })
                        .collect();
                    out.push((name, attrs));
                }
                Event::Eof => break,
                _ => {}
            }
        }
        out
    }

    #[test]
    fn test_polygons_become_paths() {
        let grass = Material::new("grass").color_hex("#00ff00").unwrap().shared();
        let mut root = Node::group2("root");
        root.append(
            shapes::rect([[0.0, 0.0], [4.0, 2.0]])
                .named("park")
                .with("svg:stroke", "black")
                .with("osm:leisure", "park")
                .material(Some(grass), true),
        );
        root.append(shapes::line(&[[0.0, 0.0], [4.0, 2.0]]).unwrap().named("path"));

        let svg = to_svg_string(&root).unwrap();
        let els = elements(&svg);
        let (name, svg_attrs) = &els[0];
        assert_eq!(name, "svg");
        assert_eq!(svg_attrs["viewBox"], "0 -2 4 2");
        assert_eq!(svg_attrs["xmlns:ddd"], METADATA_NS);

        let paths: Vec<_> = els.iter().filter(|(n, _)| n == "path").collect();
        assert_eq!(paths.len(), 2);
        let park = &paths[0].1;
        assert_eq!(park["fill"], "#00ff00");
        assert_eq!(park["stroke"], "black");
        assert_eq!(park["ddd:name"], "park");
        assert_eq!(park["ddd:material"], "grass");
        assert!(park["ddd:attrs"].contains("osm:leisure"));
        assert!(!park["ddd:attrs"].contains("svg:stroke"));
        assert!(park["d"].starts_with("M0 0 L4 0"));
        assert!(park["d"].ends_with('Z'));

        let line = &paths[1].1;
        assert_eq!(line["fill"], "none");
        assert_eq!(line["d"], "M0 0 L4 -2");
    }

    #[test]
    fn test_groups_and_points() {
        let mut root = Node::group2("root");
        let mut trees = Node::group2("trees");
        trees.append(shapes::point([1.0, 1.0]).named("oak"));
        root.append(trees);
        root.append(shapes::cuboid([0.0; 3], [1.0; 3]));

        let svg = to_svg_string(&root).unwrap();
        let els = elements(&svg);
        let groups = els.iter().filter(|(n, _)| n == "g").count();
        assert_eq!(groups, 2);
        let circle = els.iter().find(|(n, _)| n == "circle").unwrap();
        assert_eq!(circle.1["cx"], "1");
        assert_eq!(circle.1["cy"], "-1");
        assert!(!svg.contains("Node3"));
    }
}
