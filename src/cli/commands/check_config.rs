//! `agon check-config`: load, validate, and summarize a configuration.

use anyhow::Result;
use clap::Args;
use console::style;

use crate::infrastructure::config::ConfigLoader;

#[derive(Debug, Args)]
pub struct CheckConfigArgs {
    /// Configuration file (YAML). Falls back to agon.yaml + AGON_* env.
    #[arg(long)]
    pub config: Option<String>,
}

pub async fn execute(args: CheckConfigArgs, json: bool) -> Result<()> {
    let config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        println!("{}", style("configuration valid").green().bold());
        println!(
            "seed: {}  max_turns: {}  jurors: {} (quorum {})  elimination every {} turns",
            config.seed,
            config.max_turns,
            config.jury.jurors,
            config.jury.effective_quorum(),
            config.elimination.interval
        );
    }
    Ok(())
}
