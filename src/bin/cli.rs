// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! ddd command-line interface

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ddd::cli::{format_tree, init_logging, parse_param, Reporter, Runner};
use ddd::geometry::analyze;
use ddd::DddConfig;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "ddd")]
#[command(about = "Procedural 2D/3D scene kernel - runs TOML scene scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scene script and optionally export the result
    Run {
        /// Scene script (TOML)
        script: PathBuf,

        /// Verbose logging
        #[arg(short, long)]
        debug: bool,

        /// Pipeline parameter, repeatable
        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, ddd::Value)>,

        /// Output file (.glb, .gltf, .json, .svg, .stl)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Configuration file, defaults to ./ddd.toml when present
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },

    /// Run a scene script and print the task plan and resulting tree
    Show {
        script: PathBuf,

        #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<(String, ddd::Value)>,

        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Print scene statistics after the tree
        #[arg(long)]
        stats: bool,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let debug = matches!(&cli.command, Commands::Run { debug: true, .. });
    let result = match cli.command {
        Commands::Run {
            script,
            debug,
            params,
            output,
            config,
        } => run_command(&script, debug, params, output.as_deref(), config.as_deref()),
        Commands::Show {
            script,
            params,
            config,
            stats,
        } => show_command(&script, params, config.as_deref(), stats),
        Commands::Version => {
            println!("ddd v{}", env!("CARGO_PKG_VERSION"));
            Ok(true)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            if debug {
                Reporter::report_error(&format!("{e:?}"));
            } else {
                Reporter::report_error(&format!("{e:#}"));
            }
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<DddConfig> {
    match path {
        Some(path) => {
            let mut config = DddConfig::from_file(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            config.apply_env(|key| std::env::var(key).ok())?;
            Ok(config)
        }
        None => Ok(DddConfig::load()?),
    }
}

fn run_command(
    script: &Path,
    debug: bool,
    params: Vec<(String, ddd::Value)>,
    output: Option<&Path>,
    config: Option<&Path>,
) -> Result<bool> {
    let config = load_config(config)?;
    init_logging(debug || config.debug);

    let runner = Runner::new(config).with_params(params).with_progress(!debug);
    let outcome = runner.run_script(script, output)?;
    Reporter::report_run(&script.display().to_string(), &outcome);

    if !outcome.report.is_success() {
        Reporter::report_warning("some matches failed, see the failures above");
    }
    Ok(outcome.report.is_success())
}

fn show_command(
    script: &Path,
    params: Vec<(String, ddd::Value)>,
    config: Option<&Path>,
    stats: bool,
) -> Result<bool> {
    let config = load_config(config)?;
    init_logging(config.debug);

    let outcome = Runner::new(config).with_params(params).run_script(script, None)?;
    Reporter::report_plan(&outcome.plan);
    println!();
    print!("{}", format_tree(&outcome.root));
    if stats {
        println!();
        analyze(&outcome.root).print();
    }
    if !outcome.report.is_success() {
        Reporter::report_info(&format!("{} failure(s) recorded", outcome.report.failures.len()));
    }
    Ok(outcome.report.is_success())
}
