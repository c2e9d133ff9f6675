// Ports - Interface definitions for the external collaborators

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::model::*;
use crate::error::ExportResult;

/// Port for media file probing
#[async_trait]
pub trait ProbePort: Send + Sync {
    /// Probe duration and stream layout of a file
    async fn probe_file(&self, path: &Path) -> ExportResult<FileFacts>;

    /// Find the first keyframe at or after `desired_cut_from` on the given
    /// video stream, together with the codec facts needed to encode up to it.
    ///
    /// How close to a keyframe counts as "on" it is this port's decision.
    async fn smart_cut_params(
        &self,
        path: &Path,
        video_stream_index: usize,
        desired_cut_from: f64,
    ) -> ExportResult<SmartCutParams>;
}

/// Receives a completion fraction in `[0, 1]`
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, fraction: f64);
}

impl<F> ProgressCallback for F
where
    F: Fn(f64) + Send + Sync,
{
    fn on_progress(&self, fraction: f64) {
        self(fraction)
    }
}

/// One run of the transcoding engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInvocation {
    pub args: Vec<String>,
    /// Text fed on stdin, used for concat lists
    pub stdin: Option<String>,
    /// Output duration that progress is scaled against
    pub expected_duration: Option<f64>,
}

impl EngineInvocation {
    pub fn new(args: Vec<String>) -> Self {
        Self {
            args,
            stdin: None,
            expected_duration: None,
        }
    }

    pub fn with_stdin(mut self, stdin: String) -> Self {
        self.stdin = Some(stdin);
        self
    }

    pub fn with_expected_duration(mut self, duration: Option<f64>) -> Self {
        self.expected_duration = duration;
        self
    }
}

/// Captured engine output, kept for the command log
#[derive(Debug, Clone, Default)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Port for transcoding engine execution
#[async_trait]
pub trait ExecutePort: Send + Sync {
    /// Run to completion; abnormal exit maps to `ExportError::Engine`
    async fn run(
        &self,
        invocation: &EngineInvocation,
        progress: &dyn ProgressCallback,
    ) -> ExportResult<ExecOutput>;
}

/// Per-item result of a best-effort delete
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteOutcome {
    Deleted(PathBuf),
    /// Nothing to delete
    Absent(PathBuf),
    Failed { path: PathBuf, error: String },
}

/// Port for file system operations
#[async_trait]
pub trait FsPort: Send + Sync {
    async fn file_exists(&self, path: &Path) -> ExportResult<bool>;

    /// Whether an existing file may be overwritten
    async fn is_writable(&self, path: &Path) -> ExportResult<bool>;

    /// Create directory (including parent directories)
    async fn create_directory(&self, path: &Path) -> ExportResult<()>;

    /// Replace `path` with `contents` in one atomic rename
    async fn write_text_atomic(&self, path: &Path, contents: &str) -> ExportResult<()>;

    /// Delete every path, retrying transient failures. Never fails as a batch.
    async fn delete_with_retry(&self, paths: &[PathBuf]) -> Vec<DeleteOutcome>;
}

/// Request to move a source's file times onto a produced output
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampTransfer {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub cut_from: f64,
    pub cut_to: f64,
    pub source_duration: f64,
    pub mode: TimestampMode,
}

/// Port for file timestamp transfer
#[async_trait]
pub trait TimestampPort: Send + Sync {
    async fn transfer(&self, request: &TimestampTransfer) -> ExportResult<()>;
}

/// Every collaborator the engine talks to
#[derive(Clone)]
pub struct EnginePorts {
    pub probe: Arc<dyn ProbePort>,
    pub exec: Arc<dyn ExecutePort>,
    pub fs: Arc<dyn FsPort>,
    pub timestamps: Arc<dyn TimestampPort>,
}

impl EnginePorts {
    pub fn new(
        probe: Arc<dyn ProbePort>,
        exec: Arc<dyn ExecutePort>,
        fs: Arc<dyn FsPort>,
        timestamps: Arc<dyn TimestampPort>,
    ) -> Self {
        Self {
            probe,
            exec,
            fs,
            timestamps,
        }
    }
}
