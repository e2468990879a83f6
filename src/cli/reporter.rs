// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CLI output reporter with colored formatting

use super::runner::RunOutcome;
use crate::node::{Node, SceneNode};
use crate::pipeline::OrderKey;
use colored::*;
use std::fmt::Write as _;
use std::time::Duration;

/// CLI reporter for formatted output
pub struct Reporter;

impl Reporter {
    /// Summary of a finished run
    pub fn report_run(script: &str, outcome: &RunOutcome) {
        let report = &outcome.report;
        println!("\n{}", "━".repeat(80).bright_black());
        println!("{} {}", "Script:".bold(), script.cyan());
        println!("{}", "━".repeat(80).bright_black());

        if report.is_success() {
            println!("{} {}", "✅".green(), "Pipeline completed".green().bold());
        } else {
            println!(
                "{} {}",
                "⚠️ ".yellow(),
                format!("Pipeline completed with {} failure(s)", report.failures.len())
                    .yellow()
                    .bold()
            );
        }

        println!("\n{}", "Tasks:".bold());
        for run in &report.tasks {
            let status = if run.cached {
                "cached".bright_black()
            } else {
                Self::format_duration(run.elapsed).yellow()
            };
            println!(
                "  {:>8} {:<28} {} {}",
                run.order.bright_black(),
                run.name.cyan(),
                format!("{} match(es)", run.matches).bright_black(),
                status
            );
        }

        if !report.failures.is_empty() {
            println!("\n{}", "Failures:".red().bold());
            for failure in &report.failures {
                let node = failure.node.as_deref().unwrap_or("-");
                println!("  {} {} [{}]", "❌".red(), failure.task, node.bright_black());
                println!("     {}", failure.message.bright_black());
            }
        }

        println!("\n{}", "Scene:".bold());
        println!(
            "  {} {}",
            "Nodes:".bright_black(),
            outcome.root.count().to_string().cyan()
        );
        println!(
            "  {} {} run, {} cached, {} matches",
            "Tasks:".bright_black(),
            report.tasks_run().to_string().cyan(),
            report.cached_skipped().to_string().cyan(),
            report.matches().to_string().cyan()
        );
        if let Some((path, format)) = &outcome.export {
            println!(
                "  {} {} ({})",
                "Output:".bright_black(),
                path.display().to_string().cyan(),
                format
            );
        }
        println!(
            "  {} {}",
            "Time:".bright_black(),
            Self::format_duration(outcome.duration).yellow()
        );
        println!("{}", "━".repeat(80).bright_black());
    }

    /// Task execution order
    pub fn report_plan(plan: &[(String, OrderKey)]) {
        println!("{}", "Plan:".bold());
        for (step, (name, order)) in plan.iter().enumerate() {
            println!(
                "  {:>3}. {:>8} {}",
                step + 1,
                order.to_string().bright_black(),
                name.cyan()
            );
        }
    }

    /// Report error
    pub fn report_error(message: &str) {
        eprintln!("\n{} {}", "❌ Error:".red().bold(), message);
    }

    /// Report warning
    pub fn report_warning(message: &str) {
        println!("\n{} {}", "⚠️  Warning:".yellow().bold(), message);
    }

    /// Report info
    pub fn report_info(message: &str) {
        println!("{} {}", "ℹ️".bright_blue(), message);
    }

    /// Format duration for display
    pub fn format_duration(duration: Duration) -> String {
        let micros = duration.as_micros();

        if micros < 1_000 {
            format!("{}µs", micros)
        } else if micros < 1_000_000 {
            format!("{:.2}ms", micros as f64 / 1_000.0)
        } else {
            format!("{:.2}s", micros as f64 / 1_000_000.0)
        }
    }
}

/// Indented outline of a tree, one node per line
pub fn format_tree(root: &Node) -> String {
    let mut out = String::new();
    root.walk(&mut |node, depth| {
        let shape = match node {
            Node::D2(n) if !n.geom.is_empty() => format!(" {}", n.geom.kind()),
            Node::D3(n) if !n.is_empty() => format!(" {} tris", n.triangle_count()),
            _ => String::new(),
        };
        let material = node
            .get_material()
            .map(|m| format!(" mat={}", m.name))
            .unwrap_or_default();
        let attrs = if node.attrs().is_empty() {
            String::new()
        } else {
            let pairs: Vec<String> = node.attrs().iter().map(|(k, v)| format!("{k}={v}")).collect();
            format!(" {{{}}}", pairs.join(", "))
        };
        let _ = writeln!(
            out,
            "{}{} [{}{}]{}{}",
            "  ".repeat(depth),
            node.name().unwrap_or("-"),
            node.kind_name(),
            shape,
            material,
            attrs
        );
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes;

    #[test]
    fn test_format_duration() {
        assert_eq!(
            Reporter::format_duration(Duration::from_micros(500)),
            "500µs"
        );
        assert_eq!(
            Reporter::format_duration(Duration::from_millis(5)),
            "5.00ms"
        );
        assert_eq!(Reporter::format_duration(Duration::from_secs(2)), "2.00s");
    }

    #[test]
    fn test_format_tree() {
        let mut root = Node::group2("root");
        root.append(shapes::rect([[0.0, 0.0], [1.0, 1.0]]).named("lot").with("ddd:height", 3));
        root.append(shapes::cuboid([0.0; 3], [1.0; 3]));
        let text = format_tree(&root);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "root [Node2]");
        assert_eq!(lines[1], "  lot [Node2 Polygon] {ddd:height=3}");
        assert_eq!(lines[2], "  - [Node3 12 tris]");
    }
}
