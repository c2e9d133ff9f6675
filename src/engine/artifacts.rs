//! Scoped ownership of transient artifacts

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::ports::{DeleteOutcome, FsPort};

/// Transient files owned by one pipeline step.
///
/// `release` deletes them through the file system port. A scope dropped
/// without being released (an error path that returned early, or a
/// cancelled future) removes its files synchronously instead, so every
/// exit path cleans up exactly once.
#[derive(Debug, Default)]
pub struct ArtifactScope {
    paths: Vec<PathBuf>,
}

impl ArtifactScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `path` and hand it back
    pub fn track(&mut self, path: impl Into<PathBuf>) -> PathBuf {
        let path = path.into();
        self.paths.push(path.clone());
        path
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Delete every tracked file. Failures are logged, never returned.
    pub async fn release(mut self, fs: &dyn FsPort) -> Vec<DeleteOutcome> {
        let paths = std::mem::take(&mut self.paths);
        if paths.is_empty() {
            return Vec::new();
        }
        let outcomes = fs.delete_with_retry(&paths).await;
        log_delete_outcomes(&outcomes);
        outcomes
    }
}

impl Drop for ArtifactScope {
    fn drop(&mut self) {
        for path in self.paths.drain(..) {
            remove_now(&path);
        }
    }
}

fn remove_now(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed abandoned artifact"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove abandoned artifact"),
    }
}

/// Log the per-item result of a best-effort delete
pub fn log_delete_outcomes(outcomes: &[DeleteOutcome]) {
    for outcome in outcomes {
        match outcome {
            DeleteOutcome::Deleted(path) => debug!(path = %path.display(), "deleted artifact"),
            DeleteOutcome::Absent(path) => debug!(path = %path.display(), "artifact already gone"),
            DeleteOutcome::Failed { path, error } => {
                warn!(path = %path.display(), error = %error, "failed to delete artifact")
            }
        }
    }
}
