//! Concatenation engine

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::domain::model::{Chapter, CutOutcome, Disposition, FileFacts};
use crate::domain::rules::partition_common_streams;
use crate::engine::args::{build_concat_args, ConcatArgs};
use crate::engine::artifacts::ArtifactScope;
use crate::engine::chapters::write_chapter_file;
use crate::engine::cutter::{should_skip, transfer_file_times};
use crate::engine::ExportContext;
use crate::error::{ExportError, ExportResult};
use crate::ports::{EngineInvocation, ProbePort, ProgressCallback, TimestampTransfer};
use crate::utils::path::{chapters_path, concat_list};

/// Source timeline the merged output's file times derive from
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampOrigin {
    pub source: PathBuf,
    pub cut_from: f64,
    pub cut_to: f64,
    pub source_duration: f64,
}

/// One merge of already-encoded parts
#[derive(Debug, Clone)]
pub struct ConcatRequest<'a> {
    /// Parts in playback order
    pub parts: &'a [PathBuf],
    /// Stream layout, global metadata and chapters come from this file
    pub metadata_source: &'a FileFacts,
    /// Metadata-source stream ids to carry; empty carries all of them
    pub desired_streams: &'a [usize],
    pub dispositions: &'a BTreeMap<usize, Disposition>,
    pub output: &'a Path,
    pub chapters: Option<&'a [Chapter]>,
    pub overwrite: bool,
    /// Defaults to the whole metadata-source file
    pub timestamp_origin: Option<TimestampOrigin>,
}

/// Result of a merge
#[derive(Debug, Clone, PartialEq)]
pub struct ConcatOutcome {
    pub outcome: CutOutcome,
    /// Desired streams that not every part carried
    pub excluded_stream_ids: Vec<usize>,
}

/// Probe every part with at most `concurrency` probes in flight.
/// Results come back in part order.
pub async fn probe_parts(
    probe: Arc<dyn ProbePort>,
    parts: &[PathBuf],
    concurrency: usize,
) -> ExportResult<Vec<FileFacts>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();

    for (index, part) in parts.iter().enumerate() {
        let probe = Arc::clone(&probe);
        let semaphore = Arc::clone(&semaphore);
        let part = part.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            (index, probe.probe_file(&part).await)
        });
    }

    let mut probed: Vec<Option<FileFacts>> = vec![None; parts.len()];
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = joined.map_err(|e| ExportError::Probe {
            path: "concat part".to_string(),
            message: e.to_string(),
        })?;
        probed[index] = Some(result?);
    }

    Ok(probed.into_iter().flatten().collect())
}

/// Concatenation engine
pub struct ConcatEngine<'a> {
    ctx: &'a ExportContext,
}

impl<'a> ConcatEngine<'a> {
    pub fn new(ctx: &'a ExportContext) -> Self {
        Self { ctx }
    }

    /// Merge `request.parts` into `request.output`
    pub async fn concat(
        &self,
        request: &ConcatRequest<'_>,
        progress: &dyn ProgressCallback,
    ) -> ExportResult<ConcatOutcome> {
        let fs = self.ctx.ports.fs.as_ref();
        if should_skip(fs, request.output, request.overwrite).await? {
            return Ok(ConcatOutcome {
                outcome: CutOutcome::Skipped(request.output.to_path_buf()),
                excluded_stream_ids: Vec::new(),
            });
        }

        let part_facts = probe_parts(
            Arc::clone(&self.ctx.ports.probe),
            request.parts,
            self.ctx.probe_concurrency,
        )
        .await?;
        let total_duration: f64 = part_facts.iter().filter_map(|f| f.duration).sum();

        let desired: Vec<usize> = if request.desired_streams.is_empty() {
            request.metadata_source.streams.iter().map(|s| s.index).collect()
        } else {
            request.desired_streams.to_vec()
        };
        let (kept, excluded) =
            partition_common_streams(request.metadata_source, &desired, &part_facts);
        if !excluded.is_empty() {
            warn!(
                output = %request.output.display(),
                excluded = ?excluded,
                "streams missing from some parts are left out of the merge"
            );
        }

        let mut scope = ArtifactScope::new();
        let result = self
            .run_merge(request, &kept, total_duration, &mut scope, progress)
            .await;
        scope.release(fs).await;
        result?;

        let origin = request.timestamp_origin.clone().unwrap_or_else(|| {
            let duration = request.metadata_source.duration.unwrap_or(0.0);
            TimestampOrigin {
                source: request.metadata_source.path.clone(),
                cut_from: 0.0,
                cut_to: duration,
                source_duration: duration,
            }
        });
        transfer_file_times(
            self.ctx,
            TimestampTransfer {
                source: origin.source,
                destination: request.output.to_path_buf(),
                cut_from: origin.cut_from,
                cut_to: origin.cut_to,
                source_duration: origin.source_duration,
                mode: self.ctx.options.timestamps,
            },
        )
        .await;

        Ok(ConcatOutcome {
            outcome: CutOutcome::Written(request.output.to_path_buf()),
            excluded_stream_ids: excluded,
        })
    }

    async fn run_merge(
        &self,
        request: &ConcatRequest<'_>,
        kept: &[usize],
        total_duration: f64,
        scope: &mut ArtifactScope,
        progress: &dyn ProgressCallback,
    ) -> ExportResult<()> {
        let chapters_file = match request.chapters {
            Some(chapters) => {
                let out_dir = request.output.parent().unwrap_or_else(|| Path::new("."));
                let path = chapters_path(out_dir, request.output);
                write_chapter_file(self.ctx.ports.fs.as_ref(), scope, &path, chapters).await?
            }
            None => None,
        };

        let list = concat_list(request.parts)?;
        let args = build_concat_args(&ConcatArgs {
            metadata_source: &request.metadata_source.path,
            stream_ids: kept,
            dispositions: request.dispositions,
            chapters: chapters_file.as_deref(),
            options: &self.ctx.options,
            output: request.output,
        });

        info!(
            output = %request.output.display(),
            parts = request.parts.len(),
            duration = total_duration,
            "concatenating parts"
        );
        debug!(list = %list, "concat list");

        let expected = (total_duration > 0.0).then_some(total_duration);
        let invocation = EngineInvocation::new(args)
            .with_stdin(list)
            .with_expected_duration(expected);
        self.ctx.ports.exec.run(&invocation, progress).await?;
        Ok(())
    }
}
