//! Single-range cutter

use std::path::Path;

use tracing::{debug, info, warn};

use crate::domain::model::*;
use crate::domain::rules::{adjust_cut_from, trim_plan};
use crate::engine::args::{build_cut_args, CutArgs, EncodeSpec};
use crate::engine::ExportContext;
use crate::error::{ExportError, ExportResult};
use crate::ports::{EngineInvocation, FsPort, ProgressCallback, TimestampTransfer};

/// Whether a destination may be written.
///
/// Returns `Ok(true)` when the export should be skipped because the
/// destination exists and overwrite is off. An existing destination that
/// cannot be written fails before anything runs.
pub async fn should_skip(fs: &dyn FsPort, path: &Path, overwrite: bool) -> ExportResult<bool> {
    if !fs.file_exists(path).await? {
        return Ok(false);
    }
    if !overwrite {
        info!(path = %path.display(), "output exists, skipping");
        return Ok(true);
    }
    if !fs.is_writable(path).await? {
        return Err(ExportError::OutputNotWritable {
            path: path.display().to_string(),
        });
    }
    Ok(false)
}

/// Frame duration of the first selected real video stream of `source`
pub fn source_frame_duration(source: &FileFacts, selection: &StreamSelection) -> Option<f64> {
    selection
        .files
        .iter()
        .filter(|f| f.path == source.path)
        .flat_map(|f| f.stream_indices.iter())
        .filter_map(|index| source.stream(*index))
        .find(|s| s.is_real_video())
        .and_then(|s| s.frame_rate)
        .filter(|rate| *rate > 0.0)
        .map(|rate| 1.0 / rate)
}

/// Move file times from `request.source` onto a produced output. Failure
/// leaves the output valid, so it is only logged.
pub(crate) async fn transfer_file_times(ctx: &ExportContext, request: TimestampTransfer) {
    if request.mode.treat_output_mtime_as_start.is_none() {
        return;
    }
    if let Err(e) = ctx.ports.timestamps.transfer(&request).await {
        warn!(
            path = %request.destination.display(),
            error = %e,
            "failed to transfer file timestamps"
        );
    }
}

/// One cut of one range
#[derive(Debug, Clone)]
pub struct CutRequest<'a> {
    pub source: &'a FileFacts,
    pub range: CutRange,
    pub selection: &'a StreamSelection,
    pub metadata: &'a MetadataDecisions,
    pub output: &'a Path,
    pub chapters: Option<&'a Path>,
    pub keyframe_seek: bool,
    pub avoid_negative_ts: Option<AvoidNegativeTs>,
    pub timescale: Option<u32>,
    /// Start shift in frames of the detected frame duration
    pub adjust_start_frames: i32,
    pub encode: Option<EncodeSpec>,
    pub overwrite: bool,
    pub transfer_timestamps: bool,
}

impl<'a> CutRequest<'a> {
    /// Request for a user-visible output, defaults taken from `options`
    pub fn new(
        source: &'a FileFacts,
        range: CutRange,
        selection: &'a StreamSelection,
        metadata: &'a MetadataDecisions,
        output: &'a Path,
        options: &ExportOptions,
    ) -> Self {
        Self {
            source,
            range,
            selection,
            metadata,
            output,
            chapters: None,
            keyframe_seek: false,
            avoid_negative_ts: options.avoid_negative_ts,
            timescale: options.timescale,
            adjust_start_frames: 0,
            encode: None,
            overwrite: options.overwrite,
            transfer_timestamps: true,
        }
    }

    pub fn with_chapters(mut self, chapters: Option<&'a Path>) -> Self {
        self.chapters = chapters;
        self
    }

    pub fn with_keyframe_seek(mut self, keyframe_seek: bool) -> Self {
        self.keyframe_seek = keyframe_seek;
        self
    }

    pub fn with_avoid_negative_ts(mut self, mode: Option<AvoidNegativeTs>) -> Self {
        self.avoid_negative_ts = mode;
        self
    }

    pub fn with_timescale(mut self, timescale: Option<u32>) -> Self {
        self.timescale = timescale;
        self
    }

    pub fn with_start_adjustment(mut self, frames: i32) -> Self {
        self.adjust_start_frames = frames;
        self
    }

    pub fn with_encode(mut self, encode: EncodeSpec) -> Self {
        self.encode = Some(encode);
        self
    }

    /// Transient artifact: always overwritten, never timestamped
    pub fn as_artifact(mut self) -> Self {
        self.overwrite = true;
        self.transfer_timestamps = false;
        self
    }
}

/// Single-range cutter
pub struct RangeCutter<'a> {
    ctx: &'a ExportContext,
}

impl<'a> RangeCutter<'a> {
    pub fn new(ctx: &'a ExportContext) -> Self {
        Self { ctx }
    }

    /// Cut one range into `request.output`
    pub async fn cut(
        &self,
        request: &CutRequest<'_>,
        progress: &dyn ProgressCallback,
    ) -> ExportResult<CutOutcome> {
        if should_skip(self.ctx.ports.fs.as_ref(), request.output, request.overwrite).await? {
            return Ok(CutOutcome::Skipped(request.output.to_path_buf()));
        }

        let frame_duration = source_frame_duration(request.source, request.selection);
        let range = self.adjusted_range(request, frame_duration);
        let trim = trim_plan(&range, frame_duration);
        let options = &self.ctx.options;

        let args = build_cut_args(&CutArgs {
            selection: request.selection,
            metadata: request.metadata,
            options,
            trim,
            keyframe_seek: request.keyframe_seek,
            avoid_negative_ts: request.avoid_negative_ts,
            timescale: request.timescale,
            chapters: request.chapters,
            encode: request.encode.as_ref(),
            output: request.output,
        });

        let cut_duration = trim.duration.or_else(|| {
            request
                .source
                .duration
                .map(|d| (d - trim.start.unwrap_or(0.0)).max(0.0))
        });
        let expected_duration = cut_duration.map(|d| d / options.playback_rate.max(f64::EPSILON));

        info!(
            output = %request.output.display(),
            start = ?trim.start,
            duration = ?trim.duration,
            encode = request.encode.is_some(),
            keyframe_seek = request.keyframe_seek,
            "cutting range"
        );

        let invocation = EngineInvocation::new(args).with_expected_duration(expected_duration);
        self.ctx.ports.exec.run(&invocation, progress).await?;

        if request.transfer_timestamps {
            let source_duration = request.source.duration.unwrap_or(0.0);
            transfer_file_times(
                self.ctx,
                TimestampTransfer {
                    source: request.source.path.clone(),
                    destination: request.output.to_path_buf(),
                    cut_from: range.start_seconds(),
                    cut_to: range
                        .end_seconds(request.source.duration)
                        .unwrap_or(source_duration),
                    source_duration,
                    mode: options.timestamps,
                },
            )
            .await;
        }

        debug!(output = %request.output.display(), "range written");
        Ok(CutOutcome::Written(request.output.to_path_buf()))
    }

    fn adjusted_range(&self, request: &CutRequest<'_>, frame_duration: Option<f64>) -> CutRange {
        match request.range.from {
            CutFrom::At(from) if request.adjust_start_frames != 0 => {
                let adjusted = adjust_cut_from(from, request.adjust_start_frames, frame_duration);
                let from = if adjusted > 0.0 {
                    CutFrom::At(adjusted)
                } else {
                    CutFrom::FileStart
                };
                CutRange::new(from, request.range.to)
            }
            _ => request.range,
        }
    }
}
