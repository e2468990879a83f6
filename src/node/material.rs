// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Materials shared between nodes

use super::Value;
use crate::error::{DddError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Location of a material's texture inside a texture atlas, in UV space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtlasDescriptor {
    /// Atlas image path, e.g. `<name>-atlas-<size>.png`
    pub path: String,
    pub uv_min: [f64; 2],
    pub uv_max: [f64; 2],
}

impl AtlasDescriptor {
    /// Map a UV inside the unit square into the atlas cell
    pub fn remap(&self, uv: [f64; 2]) -> [f64; 2] {
        [
            self.uv_min[0] + uv[0] * (self.uv_max[0] - self.uv_min[0]),
            self.uv_min[1] + uv[1] * (self.uv_max[1] - self.uv_min[1]),
        ]
    }
}

/// Immutable material description. Equality is by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Linear RGBA, components in [0, 1]
    pub color: [f64; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normal_map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roughness_map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displacement_map: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atlas: Option<AtlasDescriptor>,
    pub metallic: f64,
    pub roughness: f64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extras: BTreeMap<String, Value>,
}

impl PartialEq for Material {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Material {}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: [1.0, 1.0, 1.0, 1.0],
            texture: None,
            normal_map: None,
            roughness_map: None,
            displacement_map: None,
            atlas: None,
            metallic: 0.0,
            roughness: 1.0,
            extras: BTreeMap::new(),
        }
    }

    pub fn color(mut self, rgba: [f64; 4]) -> Self {
        self.color = rgba;
        self
    }

    /// Color from `#rrggbb` or `#rrggbbaa`
    pub fn color_hex(mut self, hex: &str) -> Result<Self> {
        self.color = parse_hex_color(hex)?;
        Ok(self)
    }

    pub fn texture(mut self, path: impl Into<String>) -> Self {
        self.texture = Some(path.into());
        self
    }

    pub fn normal_map(mut self, path: impl Into<String>) -> Self {
        self.normal_map = Some(path.into());
        self
    }

    pub fn roughness_map(mut self, path: impl Into<String>) -> Self {
        self.roughness_map = Some(path.into());
        self
    }

    pub fn displacement_map(mut self, path: impl Into<String>) -> Self {
        self.displacement_map = Some(path.into());
        self
    }

    pub fn atlas(mut self, atlas: AtlasDescriptor) -> Self {
        self.atlas = Some(atlas);
        self
    }

    pub fn metallic_roughness(mut self, metallic: f64, roughness: f64) -> Self {
        self.metallic = metallic;
        self.roughness = roughness;
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }

    pub fn double_sided(&self) -> bool {
        self.extras
            .get("double_sided")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn shared(self) -> Arc<Material> {
        Arc::new(self)
    }

    /// `#rrggbb` rendering of the color
    pub fn color_hex_string(&self) -> String {
        let c = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", c(self.color[0]), c(self.color[1]), c(self.color[2]))
    }
}

pub fn parse_hex_color(hex: &str) -> Result<[f64; 4]> {
    let digits = hex.trim().trim_start_matches('#');
    let invalid = || DddError::Config(format!("invalid hex color '{hex}'"));
    if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
        return Err(invalid());
    }
    let mut rgba = [1.0; 4];
    for (i, chunk) in digits.as_bytes().chunks(2).enumerate() {
        let s = std::str::from_utf8(chunk).map_err(|_| invalid())?;
        rgba[i] = u8::from_str_radix(s, 16).map_err(|_| invalid())? as f64 / 255.0;
    }
    Ok(rgba)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color() {
        let m = Material::new("brick").color_hex("#ff8000").unwrap();
        assert_eq!(m.color[0], 1.0);
        assert!((m.color[1] - 128.0 / 255.0).abs() < 1e-12);
        assert_eq!(m.color[3], 1.0);
        assert_eq!(m.color_hex_string(), "#ff8000");
        assert!(Material::new("x").color_hex("#12").is_err());
        assert!(Material::new("x").color_hex("#gg0000").is_err());
    }

    #[test]
    fn test_equality_by_name() {
        let a = Material::new("grass").color([0.0, 1.0, 0.0, 1.0]);
        let b = Material::new("grass").color([0.0, 0.5, 0.0, 1.0]);
        assert_eq!(a, b);
        assert_ne!(a, Material::new("asphalt"));
    }

    #[test]
    fn test_atlas_remap() {
        let atlas = AtlasDescriptor {
            path: "trees-atlas-512.png".into(),
            uv_min: [0.5, 0.0],
            uv_max: [1.0, 0.5],
        };
        assert_eq!(atlas.remap([0.5, 0.5]), [0.75, 0.25]);
    }
}
