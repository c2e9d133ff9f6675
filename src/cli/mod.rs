//! CLI module for SmartCut
//!
//! This module handles command-line argument parsing and command execution.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod args;
pub mod commands;
pub mod progress;

/// SmartCut segment exporter
///
/// Exports time ranges of a media file losslessly, re-encoding only the
/// span before the first keyframe when a cut does not land on one.
#[derive(Parser, Debug)]
#[command(name = "smartcut")]
#[command(about = "Lossless segment export with keyframe-aware smart cutting")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Logging level (overrides the config file)
    #[arg(long, global = true, env = "SMARTCUT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Configuration file (default: ./smartcut.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export segments of a media file
    Export(args::ExportArgs),
    /// Print stream and duration facts of a media file
    Probe(args::ProbeArgs),
}
