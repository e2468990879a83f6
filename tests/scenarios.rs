// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! End-to-end modelling scenarios

use anyhow::Context;
use approx::assert_relative_eq;
use ddd::geometry::mesh_utils::is_closed;
use ddd::prelude::*;
use ddd::select::Selection;
use ddd::{DddConfig, StepOptions};

#[test]
fn scenario_rect_extrudes_to_box() {
    let solid = shapes::rect([[0.0, 0.0], [4.0, 7.0]]).extrude(3.0).unwrap();
    let mesh = solid.mesh.as_ref().unwrap();
    assert_eq!(mesh.triangle_count(), 12);
    assert!(is_closed(mesh));

    let bounds = solid.bounds().unwrap();
    assert_relative_eq!(bounds.min.x, 0.0);
    assert_relative_eq!(bounds.min.y, 0.0);
    assert_relative_eq!(bounds.min.z, 0.0);
    assert_relative_eq!(bounds.max.x, 4.0);
    assert_relative_eq!(bounds.max.y, 7.0);
    assert_relative_eq!(bounds.max.z, 3.0);
    assert_relative_eq!(solid.volume(), 84.0, epsilon = 1e-9);
}

#[test]
fn scenario_disc_resolution_one_is_square_prism() {
    let prism = shapes::disc([0.0, 0.0], 1.0, 1).extrude(5.0).unwrap();
    let mesh = prism.mesh.as_ref().unwrap();
    // 8 wall triangles plus two triangles per cap
    assert_eq!(mesh.triangle_count(), 12);
    let merged = prism.merge_vertices();
    assert_eq!(merged.mesh.as_ref().unwrap().vertex_count(), 8);
}

#[test]
fn scenario_rect_steps_to_point_pyramid() {
    let base = shapes::rect([[-1.0, -1.0], [1.0, 1.0]]);
    let pyramid = base
        .extrude_step(&shapes::point([0.0, 0.0]), 2.0, &StepOptions::default())
        .unwrap();
    let mesh = pyramid.mesh.as_ref().unwrap();
    assert_eq!(mesh.triangle_count(), 6);
    assert!(is_closed(mesh));
    // base area 4, height 2
    assert_relative_eq!(pyramid.volume(), 4.0 * 2.0 / 3.0, epsilon = 1e-9);
    assert_relative_eq!(pyramid.bounds().unwrap().max.z, 2.0);
}

#[test]
fn scenario_union_of_adjacent_squares() {
    let a = shapes::rect([[0.0, 0.0], [1.0, 1.0]]);
    let b = shapes::rect([[1.0, 0.0], [2.0, 1.0]]);
    let u = a.union(&b).unwrap().clean(1e-8).unwrap();
    assert_eq!(u.geom.polygons().len(), 1);
    assert_relative_eq!(u.area(), 2.0, epsilon = 1e-9);
    assert_eq!(u.geom.coords().len(), 5);
}

#[test]
fn scenario_ordered_pipeline_extrudes_every_feature() {
    let mut root = Node::group2("root");
    let mut features = Node::group2("Features");
    for i in 0..4 {
        let x = i as f64 * 3.0;
        features.append(shapes::rect([[x, 0.0], [x + 2.0, 2.0]]).named(format!("f{i}")));
    }
    root.append(features);
    root.append(Node::group3("Features3"));

    let mut pipeline = Pipeline::with_root(root, DddConfig::default());
    // B is registered before A; the order keys decide
    pipeline
        .register(
            Task::new("B", |ctx| {
                let obj = ctx.obj()?;
                let footprint = obj.as_2d().context("footprint is not planar")?;
                let h = footprint.get_f64("ddd:height").context("missing height")?;
                let solid = footprint.extrude(h)?;
                ctx.root
                    .find_mut("/Features3")
                    .context("no /Features3")?
                    .append(solid);
                Ok(Outcome::Keep)
            })
            .order("20")
            .select(r#"["ddd:height" = 2]"#),
        )
        .unwrap();
    pipeline
        .register(
            Task::new("A", |ctx| {
                ctx.obj()?.set("ddd:height", 2);
                Ok(Outcome::Keep)
            })
            .order("10")
            .path("/Features/*"),
        )
        .unwrap();

    let plan: Vec<String> = pipeline.plan().unwrap().into_iter().map(|(name, _)| name).collect();
    assert_eq!(plan, vec!["A", "B"]);

    let report = pipeline.run().unwrap();
    assert!(report.is_success());
    let planar = pipeline.root.select("/Features/*").unwrap().len();
    let solids = pipeline.root.select("/Features3/*").unwrap();
    assert_eq!(planar, 4);
    assert_eq!(solids.len(), planar);
    assert!(solids.iter().all(|n| n.is_3d()));
}

#[test]
fn scenario_boolean_literals_in_selectors() {
    let mut root = Node::group2("root");
    root.append(shapes::point([0.0, 0.0]).named("flagged").with("test:bool:true", true));
    root.append(shapes::point([1.0, 0.0]).named("plain"));

    for expr in [r#"["test:bool:true" = true]"#, r#"["test:bool:true" = True]"#] {
        let hits = Selection::parse(expr).unwrap().select(&root);
        assert_eq!(hits.len(), 1, "{expr}");
        assert_eq!(hits[0].name(), Some("flagged"));
    }
    for expr in [r#"["test:bool:true" = false]"#, r#"["test:bool:true" = False]"#] {
        assert!(Selection::parse(expr).unwrap().select(&root).is_empty(), "{expr}");
    }
}
