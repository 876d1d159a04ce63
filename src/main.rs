//! Agon CLI entry point.

use clap::Parser;

use agon::cli::{Cli, Commands};
use agon::infrastructure::config::ConfigLoader;
use agon::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging config comes from the same hierarchical chain as the engine
    // config; fall back to defaults when nothing is loadable yet.
    let logging = ConfigLoader::load().map(|c| c.logging).unwrap_or_default();
    let _guard = LoggerImpl::init(&logging).ok();

    let result = match cli.command {
        Commands::Run(args) => agon::cli::commands::run::execute(args, cli.json).await,
        Commands::CheckConfig(args) => {
            agon::cli::commands::check_config::execute(args, cli.json).await
        }
    };

    if let Err(err) = result {
        agon::cli::handle_error(err, cli.json);
    }
}
