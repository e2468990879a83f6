// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Declarative TOML scene scripts
//!
//! ```toml
//! [params]
//! default_height = 3.0
//!
//! [[features]]
//! name = "house"
//! shape = "rect"
//! points = [[0, 0], [4, 7]]
//! attrs = { kind = "house" }
//!
//! [[tasks]]
//! name = "heights"
//! order = "10"
//! path = "/Features/*"
//! action = "set"
//! key = "ddd:height"
//! value = 3
//!
//! [[tasks]]
//! name = "solids"
//! order = "20"
//! select = '["ddd:height" = 3]'
//! action = "extrude"
//! target = "/Features3"
//! ```

use super::{Outcome, Pipeline, Task, TaskContext};
use crate::config::DddConfig;
use crate::error::{DddError, Result};
use crate::extrude::{ExtrusionMethod, StepOptions};
use crate::meshops::uv;
use crate::node::{Material, Node, Node2, Node3, SceneNode, Value};
use crate::shapes;
use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Parsed scene script
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Defaults for the pipeline data store
    #[serde(default)]
    pub params: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub features: Vec<FeatureSpec>,
    #[serde(default)]
    pub tasks: Vec<TaskSpec>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeSpec {
    Point,
    Line,
    Polygon,
    Rect,
    Disc,
    RegularPolygon,
}

/// Planar input feature
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureSpec {
    pub name: String,
    /// Sub-root the feature is appended to
    #[serde(default = "default_parent")]
    pub parent: String,
    pub shape: ShapeSpec,
    #[serde(default)]
    pub points: Vec<[f64; 2]>,
    pub radius: Option<f64>,
    pub resolution: Option<usize>,
    pub sides: Option<usize>,
    #[serde(default)]
    pub attrs: BTreeMap<String, toml::Value>,
}

fn default_parent() -> String {
    "/Features".to_string()
}

fn default_true() -> bool {
    true
}

fn default_height_attr() -> String {
    "ddd:height".to_string()
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UvMethod {
    #[default]
    Cubic,
    Cylindrical,
    Spherical,
}

/// Built-in task behaviours
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Set {
        key: String,
        value: toml::Value,
    },
    /// Extrude by the height attribute, falling back to `height`. With a
    /// target the solid is appended there, otherwise it replaces the match.
    Extrude {
        #[serde(default = "default_height_attr")]
        height_attr: String,
        height: Option<f64>,
        target: Option<String>,
    },
    /// Successive `[buffer, dh]` steps from the footprint; a buffer that
    /// consumes the shape collapses to its centroid
    ExtrudeStep {
        steps: Vec<[f64; 2]>,
        #[serde(default)]
        method: ExtrusionMethod,
        target: Option<String>,
    },
    Buffer {
        distance: f64,
    },
    Material {
        material: String,
        color: Option<String>,
    },
    Remove,
    CopyTo {
        target: String,
    },
    Smooth {
        angle: f64,
    },
    MapUv {
        #[serde(default)]
        method: UvMethod,
        #[serde(default = "default_scale")]
        scale: f64,
        #[serde(default)]
        split: bool,
    },
    Log {
        message: String,
    },
}

/// Task entry of a script
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub order: Option<String>,
    pub path: Option<String>,
    pub select: Option<String>,
    #[serde(default = "default_true")]
    pub recurse: bool,
    pub parent: Option<String>,
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
    pub log: Option<String>,
    pub cache: Option<String>,
    #[serde(flatten)]
    pub action: Action,
}

impl std::str::FromStr for Script {
    type Err = DddError;

    fn from_str(s: &str) -> Result<Self> {
        let script: Script =
            toml::from_str(s).map_err(|e| DddError::Config(format!("invalid script: {e}")))?;
        script.validate()?;
        Ok(script)
    }
}

impl Script {
    /// Checks serde cannot express
    fn validate(&self) -> Result<()> {
        for task in &self.tasks {
            if let Action::ExtrudeStep { steps, .. } = &task.action {
                if steps.is_empty() {
                    return Err(DddError::Config(format!(
                        "task '{}': extrude_step needs at least one [buffer, dh] step",
                        task.name
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        text.parse()
            .map_err(|e: DddError| DddError::Config(format!("{}: {e}", path.display())))
    }

    /// Pipeline with the features in place and every task registered
    pub fn build(&self, config: DddConfig) -> Result<Pipeline> {
        let mut pipeline = Pipeline::new(config);
        for (key, value) in &self.params {
            pipeline.data.set(key.clone(), Value::from_toml(value));
        }
        for feature in &self.features {
            let node = feature.to_node()?;
            ensure_group(&mut pipeline.root, &feature.parent, false).append(node);
        }
        for task in &self.tasks {
            pipeline.register(task.to_task())?;
        }
        info!(features = self.features.len(), tasks = self.tasks.len(), "Script loaded");
        Ok(pipeline)
    }
}

impl FeatureSpec {
    fn to_node(&self) -> Result<Node2> {
        let at = |i: usize| self.points.get(i).copied().unwrap_or([0.0, 0.0]);
        let node = match self.shape {
            ShapeSpec::Point => shapes::point(at(0)),
            ShapeSpec::Line => shapes::line(&self.points)?,
            ShapeSpec::Polygon => shapes::polygon(&self.points)?,
            ShapeSpec::Rect => match self.points.as_slice() {
                [min, max] => shapes::rect([*min, *max]),
                _ => {
                    return Err(DddError::Config(format!(
                        "feature '{}': rect needs two corner points",
                        self.name
                    )))
                }
            },
            ShapeSpec::Disc => shapes::disc(at(0), self.radius.unwrap_or(1.0), self.resolution.unwrap_or(4)),
            ShapeSpec::RegularPolygon => {
                let [x, y] = at(0);
                shapes::regular_polygon(self.sides.unwrap_or(6), self.radius.unwrap_or(1.0)).translate([x, y])
            }
        };
        let mut node = node.named(self.name.clone());
        for (key, value) in &self.attrs {
            node.set(key, Value::from_toml(value));
        }
        Ok(node)
    }
}

impl TaskSpec {
    pub fn to_task(&self) -> Task {
        let action = self.action.clone();
        let mut task = Task::new(self.name.clone(), move |ctx| action.apply(ctx)).recurse(self.recurse);
        task.order = self.order.clone();
        task.path = self.path.clone();
        task.select = self.select.clone();
        task.parent = self.parent.clone();
        task.before = self.before.clone();
        task.after = self.after.clone();
        task.log = self.log.clone();
        if let Some(key) = self.cache.clone() {
            task = task.cache(move |_| key.clone());
        }
        task
    }
}

/// Node at `path` below `root`, creating empty groups along the way
pub fn ensure_group<'a>(root: &'a mut Node, path: &str, three_d: bool) -> &'a mut Node {
    let mut node = root;
    for name in path.split('/').filter(|s| !s.is_empty()) {
        let children = node.children_mut();
        let index = match children.iter().position(|c| c.name() == Some(name)) {
            Some(i) => i,
            None => {
                children.push(if three_d { Node::group3(name) } else { Node::group2(name) });
                children.len() - 1
            }
        };
        node = &mut children[index];
    }
    node
}

fn planar<'n>(obj: &'n Node, action: &str) -> anyhow::Result<&'n Node2> {
    obj.as_2d()
        .ok_or_else(|| anyhow!("{action} needs a 2D node, got {}", obj.label()))
}

impl Action {
    fn apply(&self, ctx: &mut TaskContext<'_>) -> anyhow::Result<Outcome> {
        if let Action::Log { message } = self {
            match ctx.obj.as_deref() {
                Some(obj) => info!(node = %obj.label(), "{message}"),
                None => info!("{message}"),
            }
            return Ok(Outcome::Keep);
        }

        let raise = ctx.config.extrusion_raise;
        let obj = ctx.obj()?;
        match self {
            Action::Set { key, value } => {
                obj.set(key, Value::from_toml(value));
                Ok(Outcome::Keep)
            }
            Action::Extrude {
                height_attr,
                height,
                target,
            } => {
                let footprint = planar(obj, "extrude")?;
                let h = footprint
                    .get_f64(height_attr)
                    .or(*height)
                    .with_context(|| format!("{} has no '{height_attr}'", footprint.label()))?;
                let solid: Node = footprint.extrude(h)?.into();
                place(ctx, solid, target.as_deref())
            }
            Action::ExtrudeStep { steps, method, target } => {
                let footprint = planar(obj, "extrude_step")?;
                let opts = StepOptions::default()
                    .with_method(*method)
                    .raising(raise);
                let mut solid: Option<Node3> = None;
                for [distance, dh] in steps {
                    let shape = footprint.buffer(*distance)?;
                    let shape = if shape.is_empty() {
                        let [x, y] = footprint.centroid().context("empty footprint")?;
                        shapes::point([x, y])
                    } else {
                        shape
                    };
                    solid = Some(match solid {
                        None => footprint.extrude_step(&shape, *dh, &opts)?,
                        Some(prev) => prev.extrude_step(&shape, *dh, &opts)?,
                    });
                }
                let solid = solid.context("extrude_step has no steps")?;
                place(ctx, solid.into(), target.as_deref())
            }
            Action::Buffer { distance } => {
                let grown = planar(obj, "buffer")?.buffer(*distance)?;
                Ok(Outcome::Replace(grown.into()))
            }
            Action::Material { material, color } => {
                let material = match ctx.materials.get(material) {
                    Some(m) => m,
                    None => {
                        let mut m = Material::new(material.clone());
                        if let Some(hex) = color {
                            m = m.color_hex(hex)?;
                        }
                        ctx.materials.register(m)?
                    }
                };
                let obj = ctx.obj()?;
                obj.set_material(Some(material), true);
                Ok(Outcome::Keep)
            }
            Action::Remove => Ok(Outcome::Remove),
            Action::CopyTo { target } => {
                let copy = obj.copy();
                let three_d = copy.is_3d();
                ensure_group(ctx.root, target, three_d).append(copy);
                Ok(Outcome::Keep)
            }
            Action::Smooth { angle } => {
                let solid = obj
                    .as_3d()
                    .ok_or_else(|| anyhow!("smooth needs a 3D node, got {}", obj.label()))?;
                Ok(Outcome::Replace(solid.smooth(*angle).into()))
            }
            Action::MapUv { method, scale, split } => {
                let mapped: Node = match &*obj {
                    Node::D2(n) => match method {
                        UvMethod::Cubic => uv::map_cubic(n, *scale, *split).into(),
                        UvMethod::Cylindrical => uv::map_cylindrical(n, *scale).into(),
                        UvMethod::Spherical => uv::map_spherical(n).into(),
                    },
                    Node::D3(n) => match method {
                        UvMethod::Cubic => uv::map_cubic(n, *scale, *split).into(),
                        UvMethod::Cylindrical => uv::map_cylindrical(n, *scale).into(),
                        UvMethod::Spherical => uv::map_spherical(n).into(),
                    },
                    Node::Instance(_) => return Ok(Outcome::Keep),
                };
                Ok(Outcome::Replace(mapped))
            }
            Action::Log { .. } => Ok(Outcome::Keep),
        }
    }
}

/// Append `solid` under `target`, or let it replace the match
fn place(ctx: &mut TaskContext<'_>, solid: Node, target: Option<&str>) -> anyhow::Result<Outcome> {
    match target {
        Some(path) => {
            ensure_group(ctx.root, path, solid.is_3d()).append(solid);
            Ok(Outcome::Keep)
        }
        None => Ok(Outcome::Replace(solid)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::select::Query;

    const SCRIPT: &str = r##"
[params]
default_height = 3.0

[[features]]
name = "house"
shape = "rect"
points = [[0, 0], [4, 7]]
attrs = { kind = "house" }

[[features]]
name = "tower"
shape = "regular_polygon"
sides = 8
radius = 2.0
points = [[10, 0]]
attrs = { kind = "tower" }

[[features]]
name = "tree"
shape = "point"
points = [[20, 0]]

[[tasks]]
name = "heights"
order = "10"
path = "/Features/*"
select = "[kind]"
action = "set"
key = "ddd:height"
value = 2

[[tasks]]
name = "solids"
order = "20"
select = '["ddd:height" = 2]'
action = "extrude"
target = "/Features3"

[[tasks]]
name = "paint"
order = "30"
path = "/Features3/*"
action = "material"
material = "brick"
color = "#aa4422"
"##;

    #[test]
    fn test_bad_actions_rejected() {
        for bad in [
            "[[tasks]]\nname = \"x\"\naction = \"explode\"\n",
            "[[tasks]]\nname = \"x\"\naction = \"buffer\"\n",
            "[[features]]\nname = \"x\"\nshape = \"rect\"\nheight = 3\n",
        ] {
            assert!(matches!(bad.parse::<Script>(), Err(DddError::Config(_))), "{bad}");
        }
    }

    #[test]
    fn test_script_runs_end_to_end() {
        let script: Script = SCRIPT.parse().unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(script.features.len(), 3);
        let mut pipeline = script.build(DddConfig::default()).unwrap();
        assert_eq!(pipeline.data.get_f64("default_height"), Some(3.0));

        let report = pipeline.run().unwrap();
        assert!(report.is_success());
        let solids = pipeline.root.select("/Features3/*").unwrap();
        assert_eq!(solids.len(), 2);
        assert!(solids
            .iter()
            .all(|s| s.get_material().map(|m| m.name.as_str()) == Some("brick")));
        let house = pipeline.root.find("/Features3/house").unwrap().as_3d().unwrap();
        assert!((house.volume() - 56.0).abs() < 1e-9);
    }

    #[test]
    fn test_roof_steps_collapse_to_point() {
        let script: Script = r#"
[[features]]
name = "base"
shape = "rect"
points = [[-1, -1], [1, 1]]

[[tasks]]
name = "roof"
path = "/Features/base"
action = "extrude_step"
steps = [[-5, 2]]
"#
        .parse()
        .unwrap();
        let mut pipeline = script.build(DddConfig::default()).unwrap();
        pipeline.run().unwrap();
        let roof = pipeline.root.find("/Features/base").unwrap().as_3d().unwrap();
        assert!((roof.volume() - 8.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_extrude_step_without_steps_rejected() {
        let text = "[[tasks]]\nname = \"roof\"\naction = \"extrude_step\"\nsteps = []\n";
        match text.parse::<Script>() {
            Err(DddError::Config(message)) => assert!(message.contains("at least one"), "{message}"),
            other => panic!("expected a config error, got {other:?}"),
        }
    }

    #[test]
    fn test_ensure_group_creates_path() {
        let mut root = Node::group2("root");
        ensure_group(&mut root, "/A/B", true).append(shapes::cuboid([0.0; 3], [1.0; 3]));
        ensure_group(&mut root, "A/B", true).append(shapes::cuboid([0.0; 3], [1.0; 3]));
        assert_eq!(root.find("/A/B").unwrap().children().len(), 2);
        assert!(root.find("/A").unwrap().is_3d());
    }
}
