// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pretty-printed JSON dump of a tree, for debugging and regression checks

use crate::error::Result;
use crate::node::{Node, SceneNode, Transform, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct DumpNode {
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Slash-separated names from the dump root, anonymous nodes as ""
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<DumpTransform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<DumpMesh>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DumpNode>,
}

#[derive(Debug, Serialize)]
pub struct DumpTransform {
    pub translation: [f64; 3],
    /// Quaternion as `[x, y, z, w]`
    pub rotation: [f64; 4],
    pub scale: [f64; 3],
}

#[derive(Debug, Serialize)]
pub struct DumpMesh {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<[usize; 3]>,
}

impl From<&Transform> for DumpTransform {
    fn from(t: &Transform) -> Self {
        let q = t.rotation.coords;
        Self {
            translation: [t.translation.x, t.translation.y, t.translation.z],
            rotation: [q.x, q.y, q.z, q.w],
            scale: [t.scale.x, t.scale.y, t.scale.z],
        }
    }
}

pub fn dump(root: &Node) -> DumpNode {
    dump_node(root, "")
}

fn dump_node(node: &Node, parent_path: &str) -> DumpNode {
    let path = format!("{parent_path}/{}", node.name().unwrap_or_default());
    let (transform, wkt, mesh) = match node {
        Node::D2(n) => (None, (!n.geom.is_empty()).then(|| n.geom.to_wkt()), None),
        Node::D3(n) => (
            (!n.transform.is_identity()).then(|| DumpTransform::from(&n.transform)),
            None,
            n.mesh.as_ref().map(|m| DumpMesh {
                vertices: m.vertices.iter().map(|v| [v.position.x, v.position.y, v.position.z]).collect(),
                faces: m.triangles.iter().map(|t| t.indices).collect(),
            }),
        ),
        Node::Instance(i) => (
            (!i.transform.is_identity()).then(|| DumpTransform::from(&i.transform)),
            None,
            None,
        ),
    };
    let children = node
        .children()
        .iter()
        .map(|child| dump_node(child, &path))
        .collect();
    DumpNode {
        kind: node.kind_name(),
        name: node.name().map(str::to_string),
        path,
        transform,
        material: node.get_material().map(|m| m.name.clone()),
        extras: node.attrs().clone(),
        wkt,
        mesh,
        children,
    }
}

pub fn to_json_string(root: &Node) -> Result<String> {
    Ok(serde_json::to_string_pretty(&dump(root))?)
}

pub fn export(root: &Node, path: &Path) -> Result<()> {
    std::fs::write(path, to_json_string(root)?)?;
    Ok(())
}
