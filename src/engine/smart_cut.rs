//! Smart-cut decision and orchestration
//!
//! A segment whose start does not sit on a keyframe is produced in three
//! steps: the span from the next keyframe to the end is copied losslessly,
//! the span before it is re-encoded, and the two parts are concatenated
//! boundary first.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::model::*;
use crate::domain::rules::{
    output_stream_index, plan_smart_cut, restrict_to_single_video, smart_cut_video_stream,
    SmartCutPlan,
};
use crate::engine::args::EncodeSpec;
use crate::engine::artifacts::ArtifactScope;
use crate::engine::concat::{ConcatEngine, ConcatRequest, TimestampOrigin};
use crate::engine::cutter::{should_skip, CutRequest, RangeCutter};
use crate::engine::progress::{SegmentProgress, Step, WeightTable};
use crate::engine::ExportContext;
use crate::error::{ExportError, ExportResult};
use crate::ports::ProgressCallback;
use crate::utils::path::artifact_path;

/// One segment of a batch
#[derive(Debug, Clone)]
pub struct SegmentRequest<'a> {
    /// Position in the batch, namespaces transient artifacts
    pub index: usize,
    pub source: &'a FileFacts,
    pub segment: Segment,
    pub output: &'a Path,
    pub selection: &'a StreamSelection,
    pub metadata: &'a MetadataDecisions,
    /// Shared chapter side-file of the batch
    pub chapters: Option<&'a Path>,
}

/// Disposition overrides of `selection` keyed by output stream index, as
/// the streams of a file cut with that selection are numbered.
pub fn dispositions_by_output_index(
    selection: &StreamSelection,
    params: &StreamParams,
) -> BTreeMap<usize, Disposition> {
    let mut dispositions = BTreeMap::new();
    for file in selection.filtered() {
        for stream_index in &file.stream_indices {
            let disposition = params
                .get(&file.path, *stream_index)
                .and_then(|p| p.disposition.clone());
            let output_index = output_stream_index(selection, &file.path, *stream_index);
            if let (Some(disposition), Some(output_index)) = (disposition, output_index) {
                dispositions.insert(output_index, disposition);
            }
        }
    }
    dispositions
}

/// Exports one segment, choosing between a direct cut and a hybrid cut
pub struct SegmentExporter<'a> {
    ctx: &'a ExportContext,
}

impl<'a> SegmentExporter<'a> {
    pub fn new(ctx: &'a ExportContext) -> Self {
        Self { ctx }
    }

    pub async fn export(
        &self,
        request: &SegmentRequest<'_>,
        progress: Arc<dyn ProgressCallback>,
    ) -> ExportResult<SegmentOutcome> {
        let options = &self.ctx.options;

        if should_skip(self.ctx.ports.fs.as_ref(), request.output, options.overwrite).await? {
            progress.on_progress(1.0);
            return Ok(SegmentOutcome::skipped(request.output.to_path_buf()));
        }

        let video_stream = match smart_cut_video_stream(request.selection, request.source) {
            Some(index) if options.smart_cut && request.segment.start > 0.0 => index,
            _ => {
                return self
                    .direct(
                        request,
                        options.keyframe_cut,
                        options.cut_from_adjustment_frames,
                        progress,
                    )
                    .await
            }
        };

        let params = self
            .ctx
            .ports
            .probe
            .smart_cut_params(&request.source.path, video_stream, request.segment.start)
            .await?;
        let plan = plan_smart_cut(&request.segment, &params)?;
        info!(
            segment = %request.segment,
            keyframe = params.lossless_cut_from,
            plan = ?plan,
            "smart cut decision"
        );

        match plan {
            SmartCutPlan::Direct => self.direct(request, false, 0, progress).await,
            SmartCutPlan::TooNarrow => self.too_narrow(request, &params, progress).await,
            SmartCutPlan::General {
                lossless_cut_from,
                encode_to,
            } => {
                self.hybrid(request, &params, lossless_cut_from, encode_to, progress)
                    .await
            }
        }
    }

    /// Plain cut with the full selection
    async fn direct(
        &self,
        request: &SegmentRequest<'_>,
        keyframe_seek: bool,
        adjust_start_frames: i32,
        progress: Arc<dyn ProgressCallback>,
    ) -> ExportResult<SegmentOutcome> {
        let tracker = SegmentProgress::new(WeightTable::single(Step::Copy), progress);
        let cut = CutRequest::new(
            request.source,
            CutRange::from_segment(request.segment, request.source.duration),
            request.selection,
            request.metadata,
            request.output,
            &self.ctx.options,
        )
        .with_chapters(request.chapters)
        .with_keyframe_seek(keyframe_seek)
        .with_start_adjustment(adjust_start_frames);

        let outcome = RangeCutter::new(self.ctx)
            .cut(&cut, &tracker.step(Step::Copy))
            .await?;
        tracker.finish();
        Ok(segment_outcome(outcome, CutStrategy::Direct))
    }

    /// The next keyframe lies past the segment end: encode all of it
    async fn too_narrow(
        &self,
        request: &SegmentRequest<'_>,
        params: &SmartCutParams,
        progress: Arc<dyn ProgressCallback>,
    ) -> ExportResult<SegmentOutcome> {
        let selection =
            restrict_to_single_video(request.selection, request.source, params.video_stream_index);
        let encode = self.encode_spec(request, &selection, params)?;
        let tracker = SegmentProgress::new(WeightTable::single(Step::Encode), progress);

        let cut = CutRequest::new(
            request.source,
            CutRange::from_segment(request.segment, request.source.duration),
            &selection,
            request.metadata,
            request.output,
            &self.ctx.options,
        )
        .with_chapters(request.chapters)
        .with_timescale(self.smart_cut_timescale(params))
        .with_encode(encode);

        let outcome = RangeCutter::new(self.ctx)
            .cut(&cut, &tracker.step(Step::Encode))
            .await?;
        tracker.finish();
        Ok(segment_outcome(outcome, CutStrategy::TooNarrow))
    }

    async fn hybrid(
        &self,
        request: &SegmentRequest<'_>,
        params: &SmartCutParams,
        lossless_cut_from: f64,
        encode_to: f64,
        progress: Arc<dyn ProgressCallback>,
    ) -> ExportResult<SegmentOutcome> {
        let selection =
            restrict_to_single_video(request.selection, request.source, params.video_stream_index);
        let encode = self.encode_spec(request, &selection, params)?;
        let tracker = SegmentProgress::new(WeightTable::hybrid(), progress);

        let mut scope = ArtifactScope::new();
        let remainder = scope.track(artifact_path(request.output, "smartcut-copy", request.index));
        let boundary =
            scope.track(artifact_path(request.output, "smartcut-encode", request.index));

        let steps = HybridSteps {
            request,
            selection: &selection,
            encode,
            timescale: self.smart_cut_timescale(params),
            lossless_cut_from,
            encode_to,
            remainder: &remainder,
            boundary: &boundary,
        };
        let result = self.run_hybrid(&steps, &tracker).await;
        scope.release(self.ctx.ports.fs.as_ref()).await;
        let excluded = result?;

        tracker.finish();
        Ok(SegmentOutcome::written(
            request.output.to_path_buf(),
            CutStrategy::Hybrid,
            excluded,
        ))
    }

    async fn run_hybrid(
        &self,
        steps: &HybridSteps<'_>,
        tracker: &SegmentProgress,
    ) -> ExportResult<Vec<usize>> {
        let request = steps.request;
        let options = &self.ctx.options;
        let cutter = RangeCutter::new(self.ctx);

        let to = match request.source.duration {
            Some(duration) if request.segment.end >= duration => CutTo::FileEnd,
            _ => CutTo::At(request.segment.end),
        };
        let copy = CutRequest::new(
            request.source,
            CutRange::new(CutFrom::At(steps.lossless_cut_from), to),
            steps.selection,
            request.metadata,
            steps.remainder,
            options,
        )
        .with_chapters(request.chapters)
        .with_keyframe_seek(true)
        .with_avoid_negative_ts(None)
        .with_timescale(steps.timescale)
        .as_artifact();
        cutter.cut(&copy, &tracker.step(Step::Copy)).await?;

        // stream indices of the remainder may differ from the source
        let remainder_facts = self.ctx.ports.probe.probe_file(steps.remainder).await?;
        debug!(
            streams = remainder_facts.streams.len(),
            duration = ?remainder_facts.duration,
            "probed remainder"
        );

        let encode = CutRequest::new(
            request.source,
            CutRange::between(request.segment.start, steps.encode_to),
            steps.selection,
            request.metadata,
            steps.boundary,
            options,
        )
        .with_timescale(steps.timescale)
        .with_encode(steps.encode.clone())
        .as_artifact();
        cutter.cut(&encode, &tracker.step(Step::Encode)).await?;

        let parts = [steps.boundary.to_path_buf(), steps.remainder.to_path_buf()];
        let dispositions =
            dispositions_by_output_index(steps.selection, &request.metadata.stream_params);
        let merge = ConcatRequest {
            parts: &parts,
            metadata_source: &remainder_facts,
            desired_streams: &[],
            dispositions: &dispositions,
            output: request.output,
            chapters: None,
            overwrite: options.overwrite,
            timestamp_origin: Some(TimestampOrigin {
                source: request.source.path.clone(),
                cut_from: request.segment.start,
                cut_to: request.segment.end,
                source_duration: request.source.duration.unwrap_or(request.segment.end),
            }),
        };
        let merged = ConcatEngine::new(self.ctx)
            .concat(&merge, &tracker.step(Step::Concat))
            .await?;
        Ok(merged.excluded_stream_ids)
    }

    fn encode_spec(
        &self,
        request: &SegmentRequest<'_>,
        selection: &StreamSelection,
        params: &SmartCutParams,
    ) -> ExportResult<EncodeSpec> {
        let video_output_index =
            output_stream_index(selection, &request.source.path, params.video_stream_index)
                .ok_or_else(|| ExportError::SmartCutImpossible {
                    segment: request.segment.to_string(),
                    reason: format!(
                        "video stream {} is not part of the selection",
                        params.video_stream_index
                    ),
                })?;
        Ok(EncodeSpec {
            video_output_index,
            codec: params.video_codec.clone(),
            bitrate: self.ctx.options.video_bitrate_override.or(params.video_bitrate),
        })
    }

    fn smart_cut_timescale(&self, params: &SmartCutParams) -> Option<u32> {
        self.ctx
            .options
            .timescale
            .or_else(|| params.video_timebase.and_then(|tb| tb.timescale()))
    }
}

struct HybridSteps<'a> {
    request: &'a SegmentRequest<'a>,
    selection: &'a StreamSelection,
    encode: EncodeSpec,
    timescale: Option<u32>,
    lossless_cut_from: f64,
    encode_to: f64,
    remainder: &'a Path,
    boundary: &'a Path,
}

fn segment_outcome(outcome: CutOutcome, strategy: CutStrategy) -> SegmentOutcome {
    let path = outcome.path().to_path_buf();
    if outcome.is_skipped() {
        SegmentOutcome::skipped(path)
    } else {
        SegmentOutcome::written(path, strategy, Vec::new())
    }
}
