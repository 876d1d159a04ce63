//! Command-line interface.

pub mod commands;

use clap::{Parser, Subcommand};
use console::style;

/// Competition orchestration engine.
#[derive(Debug, Parser)]
#[command(name = "agon", version, about)]
pub struct Cli {
    /// Emit machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a simulated competition over the bundled scripted adapters.
    Run(commands::run::RunArgs),
    /// Load and validate a configuration file.
    CheckConfig(commands::check_config::CheckConfigArgs),
}

/// Print a top-level error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json: bool) {
    if json {
        let payload = serde_json::json!({ "error": format!("{err:#}") });
        eprintln!("{payload}");
    } else {
        eprintln!("{} {err:#}", style("error:").red().bold());
    }
    std::process::exit(1);
}
