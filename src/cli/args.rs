//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Arguments for the export command
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Job file (.toml, .json, .yaml) describing the batch
    #[arg(short, long, conflicts_with = "input")]
    pub job: Option<PathBuf>,

    /// Input media file, for a quick export without a job file
    #[arg(short, long, requires = "segments")]
    pub input: Option<PathBuf>,

    /// Segment as START-END (seconds, MM:SS.ms or HH:MM:SS.ms); repeatable
    #[arg(short = 's', long = "segment", value_name = "START-END")]
    pub segments: Vec<String>,

    /// Output directory (default: next to the input)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Overwrite existing outputs instead of skipping them
    #[arg(long)]
    pub overwrite: bool,

    /// Disable smart cut; cut starts snap to keyframes
    #[arg(long)]
    pub no_smart_cut: bool,

    /// Seek before the input when smart cut is off
    #[arg(long)]
    pub keyframe_cut: bool,

    /// Output muxer name (default: from the output extension)
    #[arg(long)]
    pub format: Option<String>,

    /// Bitrate of re-encoded boundary spans, in bits per second
    #[arg(long)]
    pub video_bitrate: Option<u64>,

    /// Print the ffmpeg command lines without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the batch report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the probe command
#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Input media file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}
