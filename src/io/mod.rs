// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Scene exporters

pub mod export_gltf;
pub mod export_json;
pub mod export_stl;
pub mod export_svg;

use crate::error::{DddError, Result};
use crate::node::Node;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub use export_json::dump;
pub use export_stl::{import as import_stl, scene_mesh};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Glb,
    Gltf,
    Json,
    Svg,
    Stl,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| DddError::Export(format!("no file extension in {}", path.display())))?;
        ext.parse()
    }
}

impl FromStr for ExportFormat {
    type Err = DddError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "glb" => Ok(Self::Glb),
            "gltf" => Ok(Self::Gltf),
            "json" => Ok(Self::Json),
            "svg" => Ok(Self::Svg),
            "stl" => Ok(Self::Stl),
            other => Err(DddError::Export(format!("unsupported export format: {other}"))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Glb => "glb",
            Self::Gltf => "gltf",
            Self::Json => "json",
            Self::Svg => "svg",
            Self::Stl => "stl",
        };
        f.write_str(name)
    }
}

/// Write the tree in the format named by the file extension
pub fn export(root: &Node, path: &Path) -> Result<ExportFormat> {
    let format = ExportFormat::from_path(path)?;
    match format {
        ExportFormat::Glb | ExportFormat::Gltf => export_gltf::export(root, path)?,
        ExportFormat::Json => export_json::export(root, path)?,
        ExportFormat::Svg => export_svg::export(root, path)?,
        ExportFormat::Stl => export_stl::export(root, path)?,
    }
    Ok(format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ExportFormat::from_path(&PathBuf::from("out/city.GLB")).unwrap(), ExportFormat::Glb);
        assert_eq!(ExportFormat::from_path(&PathBuf::from("dump.json")).unwrap(), ExportFormat::Json);
        assert!(ExportFormat::from_path(&PathBuf::from("scene.obj")).is_err());
        assert!(ExportFormat::from_path(&PathBuf::from("scene")).is_err());
    }
}
