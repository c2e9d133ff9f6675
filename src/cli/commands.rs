//! Command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::{FfmpegExecutor, FfprobeProber, FileTimestamps, LocalFs, RecordingExecutor};
use crate::cli::args::{ExportArgs, ProbeArgs};
use crate::cli::progress::{ConsoleProgress, JsonProgress};
use crate::config::ExportConfig;
use crate::domain::model::{CutStrategy, FileFacts, SmartCutParams};
use crate::engine::batch::BatchReport;
use crate::engine::progress::NoProgress;
use crate::engine::{BatchSequencer, ExportContext};
use crate::error::ExportResult;
use crate::job::{ExportJob, JobSegment, TimeValue};
use crate::ports::{EnginePorts, ExecutePort, ProbePort, ProgressCallback};

/// Probe used for dry runs. Artifacts are never produced, so their layout
/// is reported as empty instead of failing.
struct DryRunProbe {
    inner: FfprobeProber,
}

#[async_trait]
impl ProbePort for DryRunProbe {
    async fn probe_file(&self, path: &Path) -> ExportResult<FileFacts> {
        if !path.exists() {
            warn!(path = %path.display(), "dry run: planned file, stream layout unknown");
            return Ok(FileFacts::new(path, None, Vec::new()));
        }
        self.inner.probe_file(path).await
    }

    async fn smart_cut_params(
        &self,
        path: &Path,
        video_stream_index: usize,
        desired_cut_from: f64,
    ) -> ExportResult<SmartCutParams> {
        self.inner
            .smart_cut_params(path, video_stream_index, desired_cut_from)
            .await
    }
}

/// Parse `START-END`
fn parse_segment_arg(value: &str) -> Result<JobSegment> {
    let (start, end) = value
        .split_once('-')
        .ok_or_else(|| anyhow!("segment '{}' must look like START-END", value))?;
    Ok(JobSegment {
        start: TimeValue::Text(start.to_string()),
        end: TimeValue::Text(end.to_string()),
        output: None,
    })
}

fn job_from_args(args: &ExportArgs) -> Result<ExportJob> {
    if let Some(path) = &args.job {
        return ExportJob::load(path)
            .with_context(|| format!("Failed to load job file {}", path.display()));
    }
    let input = args
        .input
        .clone()
        .ok_or_else(|| anyhow!("either --job or --input with --segment is required"))?;
    let segments = args
        .segments
        .iter()
        .map(|s| parse_segment_arg(s))
        .collect::<Result<Vec<_>>>()?;
    Ok(ExportJob {
        input,
        output_dir: None,
        extension: None,
        segments,
        streams: Vec::new(),
        selection: Vec::new(),
        stream_params: Vec::new(),
        file_tags: Default::default(),
        rotation: None,
        chapters: Vec::new(),
    })
}

fn print_report(report: &BatchReport, json: bool) -> Result<()> {
    if json {
        // one line, alongside the progress events
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }
    for segment in &report.segments {
        if segment.skipped {
            println!("skipped  {}", segment.output_path.display());
            continue;
        }
        let strategy = match segment.strategy {
            Some(CutStrategy::Direct) => "direct",
            Some(CutStrategy::TooNarrow) => "encoded",
            Some(CutStrategy::Hybrid) => "smart cut",
            None => "",
        };
        println!("written  {} ({})", segment.output_path.display(), strategy);
        if !segment.excluded_stream_ids.is_empty() {
            println!("         dropped streams {:?}", segment.excluded_stream_ids);
        }
    }
    println!("{} written, {} skipped", report.written(), report.skipped());
    Ok(())
}

/// Execute the export command
pub async fn export(args: ExportArgs, mut config: ExportConfig) -> Result<()> {
    let job = job_from_args(&args)?;
    let extension = job.output_extension();
    let request = job.into_batch_request(args.output_dir.as_deref())?;

    if args.overwrite {
        config.overwrite = true;
    }
    if args.no_smart_cut {
        config.smart_cut = false;
    }
    if args.keyframe_cut {
        config.keyframe_cut = true;
    }
    if let Some(format) = &args.format {
        config.output_format = Some(format.clone());
    }
    if let Some(bitrate) = args.video_bitrate {
        config.video_bitrate = Some(bitrate);
    }

    let options = config.export_options(Some(&extension));
    info!(
        input = %request.input.display(),
        format = options.output_format.as_str(),
        smart_cut = options.smart_cut,
        dry_run = args.dry_run,
        "starting export"
    );

    let prober = FfprobeProber::new(&config.ffprobe_path);
    let recorder = Arc::new(RecordingExecutor::new(
        config.ffmpeg_path.to_string_lossy().to_string(),
    ));
    let probe: Arc<dyn ProbePort>;
    let exec: Arc<dyn ExecutePort>;
    if args.dry_run {
        probe = Arc::new(DryRunProbe { inner: prober });
        exec = recorder.clone();
    } else {
        probe = Arc::new(prober);
        exec = Arc::new(
            FfmpegExecutor::new(&config.ffmpeg_path)
                .with_log_level(config.ffmpeg_log_level.clone()),
        );
    }
    let fs = LocalFs::new().with_retry(
        config.delete_attempts,
        Duration::from_millis(config.delete_retry_ms),
    );
    let ports = EnginePorts::new(probe, exec, Arc::new(fs), Arc::new(FileTimestamps::new()));
    let ctx = ExportContext::new(ports, options).with_probe_concurrency(config.probe_concurrency);

    let progress: Arc<dyn ProgressCallback> = if args.dry_run {
        Arc::new(NoProgress)
    } else if args.json {
        Arc::new(JsonProgress)
    } else {
        Arc::new(ConsoleProgress::new())
    };

    let report = BatchSequencer::new(&ctx)
        .run(&request, progress)
        .await
        .map_err(|e| {
            if e.is_user_actionable() {
                anyhow!(e.to_string())
            } else {
                anyhow::Error::new(e).context("Export failed")
            }
        })?;

    if args.dry_run {
        for line in recorder.command_lines() {
            println!("{}", line);
        }
    }
    print_report(&report, args.json)
}

/// Execute the probe command
pub async fn probe(args: ProbeArgs, config: ExportConfig) -> Result<()> {
    let input: PathBuf = args.input;
    if !input.exists() {
        return Err(anyhow!("Input file does not exist: {}", input.display()));
    }

    let facts = FfprobeProber::new(&config.ffprobe_path)
        .probe_file(&input)
        .await
        .with_context(|| format!("Failed to probe {}", input.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&facts)?);
        return Ok(());
    }

    println!("{}", facts.path.display());
    if let Some(format) = &facts.format_name {
        println!("  format:   {}", format);
    }
    match facts.duration {
        Some(duration) => println!("  duration: {:.3}s", duration),
        None => println!("  duration: unknown"),
    }
    for stream in &facts.streams {
        let mut line = format!(
            "  #{} {:?} {}",
            stream.index,
            stream.kind,
            stream.codec_name.as_deref().unwrap_or("?")
        );
        if let Some(rate) = stream.frame_rate {
            line.push_str(&format!(" {:.3} fps", rate));
        }
        if let Some(tb) = stream.time_base {
            line.push_str(&format!(" tb={}", tb));
        }
        if stream.attached_pic {
            line.push_str(" (cover art)");
        }
        println!("{}", line);
    }
    Ok(())
}
