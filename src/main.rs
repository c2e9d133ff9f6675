//! SmartCut CLI
//!
//! Lossless segment export with keyframe-aware smart cutting.
//!
//! # Usage
//!
//! ```bash
//! smartcut export --input talk.mp4 -s 00:01:02.5-00:03:10 -s 4:00-4:30
//! smartcut export --job cuts.toml --overwrite
//! smartcut probe --input talk.mp4 --json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{debug, info};

use smartcut::cli::{commands, Cli, Commands};
use smartcut::utils::logging::init_logging;
use smartcut::ExportConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        ExportConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if cli.log_json {
        config.log_json = true;
    }
    init_logging(&config.log_level, config.log_json);
    debug!(?config, "effective configuration");

    match cli.command {
        Commands::Export(args) => {
            info!("Executing export command");
            commands::export(args, config).await?;
        }
        Commands::Probe(args) => {
            debug!("Executing probe command");
            commands::probe(args, config).await?;
        }
    }

    Ok(())
}
