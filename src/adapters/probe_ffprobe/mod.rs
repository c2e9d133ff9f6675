//! FFprobe adapter
//!
//! Stream layout comes from `-show_format -show_streams` JSON. Keyframes
//! are found by reading video packets in a window after the requested
//! point, widening the window until a keyframe turns up or the file ends.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::model::*;
use crate::error::{ExportError, ExportResult};
use crate::ports::ProbePort;
use crate::utils::time::format_arg_seconds;

/// A keyframe closer than this to the requested point counts as on it
pub const KEYFRAME_EPSILON: f64 = 0.01;

/// First packet window read after the requested point, in seconds
const INITIAL_WINDOW: f64 = 5.0;

/// Windows double until they reach this size
const MAX_WINDOW: f64 = 320.0;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    format_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    index: usize,
    codec_type: Option<String>,
    codec_name: Option<String>,
    bit_rate: Option<String>,
    time_base: Option<String>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    disposition: BTreeMap<String, i64>,
}

#[derive(Debug, Deserialize)]
struct PacketsOutput {
    #[serde(default)]
    packets: Vec<ProbePacket>,
}

#[derive(Debug, Deserialize)]
struct ProbePacket {
    pts_time: Option<String>,
    flags: Option<String>,
}

/// Parse a `num/den` frame rate; `0/0` means unknown
pub fn parse_frame_rate(value: &str) -> Option<f64> {
    let (num, den) = value.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    (num > 0.0 && den > 0.0).then(|| num / den)
}

fn probe_error(path: &Path, message: impl Into<String>) -> ExportError {
    ExportError::Probe {
        path: path.display().to_string(),
        message: message.into(),
    }
}

/// Build file facts from `-show_format -show_streams` JSON
pub fn parse_file_facts(path: &Path, json: &str) -> ExportResult<FileFacts> {
    let output: ProbeOutput =
        serde_json::from_str(json).map_err(|e| probe_error(path, e.to_string()))?;

    let streams = output
        .streams
        .into_iter()
        .map(|s| StreamFacts {
            index: s.index,
            kind: StreamKind::from_codec_type(s.codec_type.as_deref().unwrap_or_default()),
            codec_name: s.codec_name,
            bit_rate: s.bit_rate.and_then(|b| b.parse().ok()),
            time_base: s.time_base.as_deref().and_then(Timebase::parse),
            frame_rate: s
                .avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate)),
            attached_pic: s.disposition.get("attached_pic").copied().unwrap_or(0) != 0,
        })
        .collect();

    let (duration, format_name) = match output.format {
        Some(format) => (
            format.duration.and_then(|d| d.parse::<f64>().ok()),
            format.format_name,
        ),
        None => (None, None),
    };

    let mut facts = FileFacts::new(path, duration, streams);
    facts.format_name = format_name;
    Ok(facts)
}

/// Earliest keyframe at or after `after` in `-show_packets` JSON
pub fn first_keyframe_after(json: &str, after: f64) -> Option<f64> {
    let output: PacketsOutput = serde_json::from_str(json).ok()?;
    output
        .packets
        .iter()
        .filter(|p| p.flags.as_deref().is_some_and(|f| f.contains('K')))
        .filter_map(|p| p.pts_time.as_deref()?.parse::<f64>().ok())
        .filter(|t| *t >= after - KEYFRAME_EPSILON)
        .min_by(|a, b| a.total_cmp(b))
}

/// `ProbePort` over a spawned ffprobe binary
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    async fn run(&self, path: &Path, args: &[String]) -> ExportResult<String> {
        debug!(path = %path.display(), args = ?args, "running ffprobe");
        let output = Command::new(&self.ffprobe_path)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| probe_error(path, format!("failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(probe_error(
                path,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn find_keyframe(
        &self,
        path: &Path,
        stream_index: usize,
        after: f64,
        duration: Option<f64>,
    ) -> ExportResult<f64> {
        let mut window = INITIAL_WINDOW;
        loop {
            let args: Vec<String> = vec![
                "-v".into(),
                "error".into(),
                "-select_streams".into(),
                stream_index.to_string(),
                "-show_packets".into(),
                "-show_entries".into(),
                "packet=pts_time,flags".into(),
                "-read_intervals".into(),
                format!("{}%+{}", format_arg_seconds(after), format_arg_seconds(window)),
                "-of".into(),
                "json".into(),
                path.to_string_lossy().to_string(),
            ];
            let json = self.run(path, &args).await?;
            if let Some(keyframe) = first_keyframe_after(&json, after) {
                return Ok(keyframe);
            }

            let past_end = duration.is_some_and(|d| after + window >= d);
            if past_end || window >= MAX_WINDOW {
                return Err(ExportError::NoKeyframe {
                    path: path.display().to_string(),
                    after,
                });
            }
            window *= 2.0;
        }
    }
}

#[async_trait]
impl ProbePort for FfprobeProber {
    async fn probe_file(&self, path: &Path) -> ExportResult<FileFacts> {
        let args: Vec<String> = vec![
            "-v".into(),
            "error".into(),
            "-show_format".into(),
            "-show_streams".into(),
            "-of".into(),
            "json".into(),
            path.to_string_lossy().to_string(),
        ];
        let json = self.run(path, &args).await?;
        let facts = parse_file_facts(path, &json)?;
        debug!(
            path = %path.display(),
            duration = ?facts.duration,
            streams = facts.streams.len(),
            "probed file"
        );
        Ok(facts)
    }

    async fn smart_cut_params(
        &self,
        path: &Path,
        video_stream_index: usize,
        desired_cut_from: f64,
    ) -> ExportResult<SmartCutParams> {
        let facts = self.probe_file(path).await?;
        let video = facts
            .stream(video_stream_index)
            .ok_or_else(|| probe_error(path, format!("no stream {}", video_stream_index)))?;

        let keyframe = self
            .find_keyframe(path, video_stream_index, desired_cut_from, facts.duration)
            .await?;
        let lossless_cut_from = keyframe.max(desired_cut_from);
        let segment_needs_smart_cut = lossless_cut_from - desired_cut_from > KEYFRAME_EPSILON;

        info!(
            path = %path.display(),
            desired = desired_cut_from,
            keyframe,
            needs_smart_cut = segment_needs_smart_cut,
            "keyframe lookup"
        );

        Ok(SmartCutParams {
            lossless_cut_from,
            segment_needs_smart_cut,
            video_codec: video
                .codec_name
                .clone()
                .ok_or_else(|| probe_error(path, "video codec is unknown"))?,
            video_bitrate: video.bit_rate,
            video_stream_index,
            video_timebase: video.time_base,
            frame_rate: video.frame_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "video", "codec_name": "h264", "bit_rate": "4000000",
             "time_base": "1/90000", "avg_frame_rate": "30000/1001", "r_frame_rate": "30000/1001",
             "disposition": {"default": 1, "attached_pic": 0}},
            {"index": 1, "codec_type": "audio", "codec_name": "aac", "time_base": "1/48000",
             "avg_frame_rate": "0/0", "r_frame_rate": "0/0"},
            {"index": 2, "codec_type": "video", "codec_name": "mjpeg",
             "avg_frame_rate": "0/0", "r_frame_rate": "90000/1",
             "disposition": {"attached_pic": 1}}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2", "duration": "62.500000"}
    }"#;

    #[test]
    fn test_parse_file_facts() {
        let facts = parse_file_facts(Path::new("/in/a.mp4"), SAMPLE).unwrap();
        assert_eq!(facts.duration, Some(62.5));
        assert_eq!(facts.streams.len(), 3);

        let video = facts.stream(0).unwrap();
        assert!(video.is_real_video());
        assert_eq!(video.bit_rate, Some(4_000_000));
        assert_eq!(video.time_base.and_then(|t| t.timescale()), Some(90000));
        assert!((video.frame_rate.unwrap() - 29.97).abs() < 0.01);

        assert_eq!(facts.stream(1).unwrap().kind, StreamKind::Audio);
        assert_eq!(facts.stream(1).unwrap().frame_rate, None);
        assert!(!facts.stream(2).unwrap().is_real_video());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_file_facts(Path::new("x"), "not json").is_err());
    }

    #[test]
    fn test_first_keyframe_after() {
        let json = r#"{"packets": [
            {"pts_time": "1.001", "flags": "K__"},
            {"pts_time": "2.002", "flags": "___"},
            {"pts_time": "4.004", "flags": "K__"},
            {"pts_time": "3.003", "flags": "___"},
            {"pts_time": "8.008", "flags": "K_"}
        ]}"#;
        assert_eq!(first_keyframe_after(json, 2.3), Some(4.004));
        assert_eq!(first_keyframe_after(json, 1.0), Some(1.001));
        assert_eq!(first_keyframe_after(json, 9.0), None);
        assert_eq!(first_keyframe_after(r#"{"packets": []}"#, 0.0), None);
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("garbage"), None);
    }
}
