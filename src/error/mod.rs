//! Error handling module for SmartCut

use thiserror::Error;

/// Main error type for export operations
#[derive(Error, Debug)]
pub enum ExportError {
    /// Destination exists but cannot be written
    #[error(
        "Output file is not writable: {path}. Check its permissions or choose another output folder"
    )]
    OutputNotWritable { path: String },

    /// Hybrid cut is required but cannot be computed safely
    #[error("Smart cut is not possible for segment {segment}: {reason}")]
    SmartCutImpossible { segment: String, reason: String },

    /// No keyframe could be found at or after the requested point
    #[error("Cannot find any keyframe at or after {after:.5}s in {path}")]
    NoKeyframe { path: String, after: f64 },

    /// The transcoding engine exited abnormally
    #[error("ffmpeg failed (exit code {exit_code:?}): {command}\n{stderr}")]
    Engine {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Media probe error
    #[error("Failed to probe media file {path}: {message}")]
    Probe { path: String, message: String },

    /// Export job description is malformed
    #[error("Invalid export job: {message}")]
    InvalidJob { message: String },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ExportError {
    /// Whether the user can resolve this by changing the destination
    pub fn is_user_actionable(&self) -> bool {
        matches!(self, ExportError::OutputNotWritable { .. })
    }
}

/// Result type alias for export operations
pub type ExportResult<T> = std::result::Result<T, ExportError>;
