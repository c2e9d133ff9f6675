//! File timestamp transfer

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use filetime::FileTime;
use tracing::debug;

use crate::domain::rules::transferred_file_time;
use crate::error::{ExportError, ExportResult};
use crate::ports::{TimestampPort, TimestampTransfer};

fn to_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}

fn to_file_time(seconds: f64) -> FileTime {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    FileTime::from_unix_time(whole as i64, nanos)
}

fn render(seconds: f64) -> String {
    DateTime::<Utc>::from_timestamp(seconds.floor() as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| format!("{}s", seconds))
}

fn transfer_blocking(request: &TimestampTransfer) -> ExportResult<()> {
    let metadata = std::fs::metadata(&request.source)?;
    let shift = |time: SystemTime| {
        transferred_file_time(
            to_seconds(time),
            &request.mode,
            request.cut_from,
            request.cut_to,
            request.source_duration,
        )
    };

    let (Some(mtime), Some(atime)) = (shift(metadata.modified()?), shift(metadata.accessed()?))
    else {
        return Ok(());
    };

    filetime::set_file_times(&request.destination, to_file_time(atime), to_file_time(mtime))?;
    debug!(
        destination = %request.destination.display(),
        mtime = %render(mtime),
        "transferred timestamps"
    );
    Ok(())
}

/// `TimestampPort` setting atime and mtime on local files
#[derive(Debug, Default, Clone)]
pub struct FileTimestamps;

impl FileTimestamps {
    pub fn new() -> Self {
        Self
    }

    /// Modified time of `path` in seconds since the epoch
    pub fn modified_seconds(path: &Path) -> ExportResult<f64> {
        Ok(to_seconds(std::fs::metadata(path)?.modified()?))
    }
}

#[async_trait]
impl TimestampPort for FileTimestamps {
    async fn transfer(&self, request: &TimestampTransfer) -> ExportResult<()> {
        if request.mode.treat_output_mtime_as_start.is_none() {
            return Ok(());
        }
        let request = request.clone();
        tokio::task::spawn_blocking(move || transfer_blocking(&request))
            .await
            .map_err(|e| ExportError::IoError(std::io::Error::other(e.to_string())))?
    }
}
