//! Modal EQ - subwoofer EQ from a simulated room response
//!
//! Copyright (C) 2025 Pierre Aubert pierre(at)spinorama(dot)org
//!
//! This program is free software: you can redistribute it and/or modify
//! it under the terms of the GNU General Public License as published by
//! the Free Software Foundation, either version 3 of the License, or
//! (at your option) any later version.
//!
//! This program is distributed in the hope that it will be useful,
//! but WITHOUT ANY WARRANTY; without even the implied warranty of
//! MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//! GNU General Public License for more details.
//!
//! You should have received a copy of the GNU General Public License
//! along with this program.  If not, see <https://www.gnu.org/licenses/>.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::info;
use schemars::schema_for;
use std::path::PathBuf;

use modaleq::export::{self, ExportFormat};
use modaleq::{LogObserver, ModalSimulator, RunConfig, run_pipeline};

/// Simulate a room and compute a multi-pass parametric EQ
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the run configuration JSON file
    #[arg(short, long, required_unless_present = "schema")]
    config: Option<PathBuf>,

    /// Write the EQ settings here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Format of the EQ settings
    #[arg(short, long, value_enum, default_value_t = ExportFormat::Text)]
    format: ExportFormat,

    /// Write the full run report (responses, target, errors) as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Dump the JSON schema of the configuration file
    #[arg(long)]
    schema: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if args.schema {
        let schema = schema_for!(RunConfig);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .ok_or_else(|| anyhow!("Config file is required"))?;

    run(&args, config_path)
}

fn run(args: &Args, config_path: PathBuf) -> Result<()> {
    info!("Loading run configuration from {:?}", config_path);
    let config = RunConfig::load(&config_path)
        .with_context(|| format!("Failed to load config file: {:?}", config_path))?;

    let simulator = ModalSimulator::new();
    let mut observer = LogObserver::new("Modal EQ", modaleq::eq::PassKind::ALL.len());
    let result = run_pipeline(&config, &simulator, &mut observer)
        .with_context(|| format!("EQ generation failed for {:?}", config_path))?;

    match &args.output {
        Some(path) => {
            let path = if path.extension().is_none() {
                path.with_extension(args.format.extension())
            } else {
                path.clone()
            };
            export::save(&result.settings, &path, args.format)
                .with_context(|| format!("Failed to save EQ settings to {:?}", path))?;
        }
        None => {
            print!("{}", export::format_settings(&result.settings, args.format)?);
        }
    }

    if let Some(report_path) = &args.report {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(report_path, json)
            .with_context(|| format!("Failed to write report to {:?}", report_path))?;
        info!("Run report saved to: {}", report_path.display());
    }

    Ok(())
}
