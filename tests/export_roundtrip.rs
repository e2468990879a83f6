// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Exports of a small pipeline-built scene, read back where the format allows

use anyhow::Result;
use ddd::io::{self, ExportFormat};
use ddd::pipeline::script::Script;
use ddd::prelude::*;
use ddd::DddConfig;
use tempfile::tempdir;

const SCENE: &str = r##"
[[features]]
name = "house"
shape = "rect"
points = [[0, 0], [4, 7]]
attrs = { kind = "house", "ddd:height" = 3.0 }

[[features]]
name = "yard"
shape = "disc"
points = [[10, 0]]
radius = 2.0
attrs = { kind = "yard" }

[[tasks]]
name = "walls"
order = "10"
path = "/Features/*"
select = "[kind = house]"
action = "extrude"
target = "/Features3"

[[tasks]]
name = "paint"
order = "20"
path = "/Features3/*"
action = "material"
material = "brick"
color = "#aa4422"
"##;

fn scene() -> Result<Node> {
    let script: Script = SCENE.parse()?;
    let mut pipeline = script.build(DddConfig::default())?;
    let report = pipeline.run()?;
    assert!(report.is_success());
    Ok(pipeline.root)
}

#[test]
fn test_stl_round_trip() -> Result<()> {
    let root = scene()?;
    let dir = tempdir()?;
    let path = dir.path().join("scene.stl");
    assert_eq!(io::export(&root, &path)?, ExportFormat::Stl);

    let loaded = io::import_stl(&path)?;
    assert_eq!(loaded.triangle_count(), 12);
    assert!((loaded.volume() - 84.0).abs() < 1e-3);
    Ok(())
}

#[test]
fn test_glb_keeps_hierarchy() -> Result<()> {
    let root = scene()?;
    let dir = tempdir()?;
    let path = dir.path().join("scene.glb");
    io::export(&root, &path)?;

    let bytes = std::fs::read(&path)?;
    assert_eq!(&bytes[0..4], b"glTF");
    let json_len = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
    let gltf: serde_json::Value = serde_json::from_slice(&bytes[20..20 + json_len])?;

    let names: Vec<&str> = gltf["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|n| n["name"].as_str())
        .collect();
    assert!(names.contains(&"Features"));
    assert!(names.contains(&"Features3"));
    assert_eq!(names.iter().filter(|n| **n == "house").count(), 2);
    assert_eq!(gltf["materials"][0]["name"], "brick");
    Ok(())
}

#[test]
fn test_svg_and_json_dumps() -> Result<()> {
    let root = scene()?;
    let dir = tempdir()?;

    let svg_path = dir.path().join("scene.svg");
    io::export(&root, &svg_path)?;
    let svg = std::fs::read_to_string(&svg_path)?;
    assert_eq!(svg.matches("<path").count(), 2);
    assert!(svg.contains(r#"ddd:name="yard""#));

    let json_path = dir.path().join("scene.json");
    io::export(&root, &json_path)?;
    let dump: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path)?)?;
    let features3 = dump["children"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["name"] == "Features3")
        .unwrap();
    let house = &features3["children"][0];
    assert_eq!(house["path"], "/root/Features3/house");
    assert_eq!(house["material"], "brick");
    assert_eq!(house["mesh"]["faces"].as_array().unwrap().len(), 12);
    Ok(())
}

#[test]
fn test_unknown_extension_rejected() -> Result<()> {
    let root = scene()?;
    let dir = tempdir()?;
    assert!(io::export(&root, &dir.path().join("scene.obj")).is_err());
    Ok(())
}
