//! Batch sequencer

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::domain::model::*;
use crate::engine::artifacts::ArtifactScope;
use crate::engine::chapters::write_chapter_file;
use crate::engine::progress::BatchProgress;
use crate::engine::smart_cut::{SegmentExporter, SegmentRequest};
use crate::engine::ExportContext;
use crate::error::ExportResult;
use crate::ports::ProgressCallback;
use crate::utils::path::chapters_path;

/// Every segment to export from one input
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub segments: Vec<ExportSegment>,
    /// Empty selects every stream of the input
    pub selection: StreamSelection,
    pub metadata: MetadataDecisions,
    /// Written once and shared by every segment
    pub chapters: Vec<Chapter>,
}

/// Outcomes of a finished batch, in segment order
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub input: PathBuf,
    pub segments: Vec<SegmentOutcome>,
}

impl BatchReport {
    pub fn written(&self) -> usize {
        self.segments.iter().filter(|s| !s.skipped).count()
    }

    pub fn skipped(&self) -> usize {
        self.segments.iter().filter(|s| s.skipped).count()
    }
}

/// Runs the segments of a batch strictly one after another
pub struct BatchSequencer<'a> {
    ctx: &'a ExportContext,
}

impl<'a> BatchSequencer<'a> {
    pub fn new(ctx: &'a ExportContext) -> Self {
        Self { ctx }
    }

    pub async fn run(
        &self,
        request: &BatchRequest,
        progress: Arc<dyn ProgressCallback>,
    ) -> ExportResult<BatchReport> {
        let fs = self.ctx.ports.fs.as_ref();
        fs.create_directory(&request.output_dir).await?;

        let source = self.ctx.ports.probe.probe_file(&request.input).await?;
        let selection = if request.selection.stream_count() == 0 {
            StreamSelection::new(vec![FileStreams::new(
                request.input.clone(),
                source.streams.iter().map(|s| s.index).collect(),
            )])
        } else {
            request.selection.clone()
        };

        info!(
            input = %request.input.display(),
            segments = request.segments.len(),
            streams = selection.stream_count(),
            "starting batch"
        );

        let mut scope = ArtifactScope::new();
        let result = self
            .run_segments(request, &source, &selection, &mut scope, progress)
            .await;
        scope.release(fs).await;

        let segments = result?;
        Ok(BatchReport {
            input: request.input.clone(),
            segments,
        })
    }

    async fn run_segments(
        &self,
        request: &BatchRequest,
        source: &FileFacts,
        selection: &StreamSelection,
        scope: &mut ArtifactScope,
        progress: Arc<dyn ProgressCallback>,
    ) -> ExportResult<Vec<SegmentOutcome>> {
        let chapters_file = write_chapter_file(
            self.ctx.ports.fs.as_ref(),
            scope,
            &chapters_path(&request.output_dir, &request.input),
            &request.chapters,
        )
        .await?;

        let batch_progress = BatchProgress::new(request.segments.len(), progress);
        let exporter = SegmentExporter::new(self.ctx);
        let mut outcomes = Vec::with_capacity(request.segments.len());

        for (index, export) in request.segments.iter().enumerate() {
            let segment_request = SegmentRequest {
                index,
                source,
                segment: export.segment,
                output: &export.output_path,
                selection,
                metadata: &request.metadata,
                chapters: chapters_file.as_deref(),
            };
            let outcome = exporter
                .export(&segment_request, batch_progress.segment(index))
                .await
                .inspect_err(|e| {
                    error!(segment = %export.segment, error = %e, "segment export failed")
                })?;
            info!(
                segment = %export.segment,
                output = %outcome.output_path.display(),
                skipped = outcome.skipped,
                strategy = ?outcome.strategy,
                "segment done"
            );
            outcomes.push(outcome);
        }

        Ok(outcomes)
    }
}
