// Domain rules - Pure decisions shared by every export step

use std::path::Path;

use crate::domain::model::*;
use crate::error::{ExportError, ExportResult};

/// Output stream index of `(path, stream_index)`.
///
/// The index is the pair's position in the filtered, ordered selection. Both
/// `-map` building and per-stream argument building go through here so the
/// two can never disagree.
pub fn output_stream_index(
    selection: &StreamSelection,
    path: &Path,
    stream_index: usize,
) -> Option<usize> {
    selection
        .filtered()
        .into_iter()
        .flat_map(|file| {
            file.stream_indices
                .iter()
                .map(move |index| (file.path.as_path(), *index))
        })
        .position(|(p, index)| p == path && index == stream_index)
}

/// Trim amounts to hand to the engine; `None` means "emit nothing"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimPlan {
    pub start: Option<f64>,
    pub duration: Option<f64>,
}

impl TrimPlan {
    pub fn is_untrimmed(&self) -> bool {
        self.start.is_none() && self.duration.is_none()
    }
}

/// Cut length clamped to be non-negative and, when a frame duration is
/// known, at least one frame long.
pub fn effective_duration(from: f64, to: f64, frame_duration: Option<f64>) -> f64 {
    let duration = (to - from).max(0.0);
    match frame_duration {
        Some(frame) if frame > 0.0 => duration.max(frame),
        _ => duration,
    }
}

/// Decide which trims a cut range really needs
pub fn trim_plan(range: &CutRange, frame_duration: Option<f64>) -> TrimPlan {
    let start = match range.from {
        CutFrom::At(t) if t > 0.0 => Some(t),
        _ => None,
    };
    let duration = match range.to {
        CutTo::FileEnd => None,
        CutTo::At(end) => Some(effective_duration(
            start.unwrap_or(0.0),
            end,
            frame_duration,
        )),
    };
    TrimPlan { start, duration }
}

/// Shift a start point by whole frames, never before the file start
pub fn adjust_cut_from(from: f64, frames: i32, frame_duration: Option<f64>) -> f64 {
    match frame_duration {
        Some(frame) if frames != 0 => (from + frames as f64 * frame).max(0.0),
        _ => from,
    }
}

/// First selected real video stream of the given file
pub fn smart_cut_video_stream(selection: &StreamSelection, facts: &FileFacts) -> Option<usize> {
    selection
        .files
        .iter()
        .find(|f| f.path == facts.path)?
        .stream_indices
        .iter()
        .copied()
        .find(|index| facts.stream(*index).is_some_and(|s| s.is_real_video()))
}

/// Selection holding exactly the smart-cut video stream plus every
/// non-video stream selected from the same file.
pub fn restrict_to_single_video(
    selection: &StreamSelection,
    facts: &FileFacts,
    video_stream_index: usize,
) -> StreamSelection {
    let stream_indices = selection
        .files
        .iter()
        .filter(|f| f.path == facts.path)
        .flat_map(|f| f.stream_indices.iter().copied())
        .filter(|index| {
            *index == video_stream_index
                || facts
                    .stream(*index)
                    .is_some_and(|s| s.kind != StreamKind::Video)
        })
        .collect();
    StreamSelection::new(vec![FileStreams::new(facts.path.clone(), stream_indices)])
}

/// Smart-cut decision for one segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SmartCutPlan {
    /// Desired start sits on a keyframe, or less than one frame before it
    Direct,
    /// The whole segment ends before the next keyframe: encode all of it
    TooNarrow,
    /// Encode `[segment.start, encode_to)`, copy from the keyframe onward
    General { lossless_cut_from: f64, encode_to: f64 },
}

/// Frame-rate tolerance when comparing a keyframe gap with one frame
const FRAME_EPSILON: f64 = 1e-9;

pub fn plan_smart_cut(segment: &Segment, params: &SmartCutParams) -> ExportResult<SmartCutPlan> {
    if !params.segment_needs_smart_cut || params.lossless_cut_from <= segment.start {
        return Ok(SmartCutPlan::Direct);
    }

    let frame_duration = params
        .frame_duration()
        .ok_or_else(|| ExportError::SmartCutImpossible {
            segment: segment.to_string(),
            reason: "video frame rate is unknown, cannot place the encode boundary".to_string(),
        })?;

    // no frame lies between the start and the keyframe
    if params.lossless_cut_from - segment.start + FRAME_EPSILON < frame_duration {
        return Ok(SmartCutPlan::Direct);
    }

    if segment.end <= params.lossless_cut_from {
        return Ok(SmartCutPlan::TooNarrow);
    }

    // at least one frame is encoded
    let encode_to =
        (params.lossless_cut_from - frame_duration).max(segment.start + frame_duration);

    Ok(SmartCutPlan::General {
        lossless_cut_from: params.lossless_cut_from,
        encode_to,
    })
}

/// New file time for a produced output, in seconds since the epoch.
///
/// Returns `None` when transfer is disabled.
pub fn transferred_file_time(
    source_time: f64,
    mode: &TimestampMode,
    cut_from: f64,
    cut_to: f64,
    source_duration: f64,
) -> Option<f64> {
    let output_as_start = mode.treat_output_mtime_as_start?;
    let time = match (mode.treat_input_mtime_as_start, output_as_start) {
        (true, true) => source_time + cut_from,
        (true, false) => source_time + cut_to,
        (false, true) => source_time - source_duration + cut_from,
        (false, false) => source_time - source_duration + cut_to,
    };
    Some(time)
}

/// Split the desired streams of a merge into those every part carries and
/// those that must be excluded.
pub fn partition_common_streams(
    source: &FileFacts,
    desired: &[usize],
    parts: &[FileFacts],
) -> (Vec<usize>, Vec<usize>) {
    desired.iter().copied().partition(|index| {
        let Some(kind) = source.stream(*index).map(|s| s.kind) else {
            return false;
        };
        parts
            .iter()
            .all(|part| part.stream(*index).is_some_and(|s| s.kind == kind))
    })
}
