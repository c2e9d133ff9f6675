// Domain models - Core types and data structures

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Half-open time range `[start, end)` in seconds on the source file's own timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Length of the range, never negative
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s-{:.3}s", self.start, self.end)
    }
}

/// Start edge of a cut
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CutFrom {
    /// Beginning of the file, no start trim at all
    FileStart,
    At(f64),
}

/// End edge of a cut
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CutTo {
    /// End of the file, no end trim at all
    FileEnd,
    At(f64),
}

/// A cut range whose edges may be open at either end of the file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutRange {
    pub from: CutFrom,
    pub to: CutTo,
}

impl CutRange {
    pub fn new(from: CutFrom, to: CutTo) -> Self {
        Self { from, to }
    }

    /// Build from a segment, collapsing a start of exactly 0 and an end at
    /// the full file duration into the open sentinels.
    pub fn from_segment(segment: Segment, file_duration: Option<f64>) -> Self {
        let from = if segment.start <= 0.0 {
            CutFrom::FileStart
        } else {
            CutFrom::At(segment.start)
        };
        let to = match file_duration {
            Some(duration) if segment.end >= duration => CutTo::FileEnd,
            _ => CutTo::At(segment.end),
        };
        Self { from, to }
    }

    /// Closed range between two explicit points
    pub fn between(from: f64, to: f64) -> Self {
        Self {
            from: CutFrom::At(from),
            to: CutTo::At(to),
        }
    }

    pub fn start_seconds(&self) -> f64 {
        match self.from {
            CutFrom::FileStart => 0.0,
            CutFrom::At(t) => t,
        }
    }

    pub fn end_seconds(&self, file_duration: Option<f64>) -> Option<f64> {
        match self.to {
            CutTo::FileEnd => file_duration,
            CutTo::At(t) => Some(t),
        }
    }
}

/// Timebase - rational number used to express stream timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timebase {
    pub num: i32,
    pub den: i32,
}

impl Timebase {
    /// Create a new timebase, rejecting zero terms
    pub fn new(num: i32, den: i32) -> Option<Self> {
        if den == 0 || num == 0 {
            return None;
        }
        Some(Self { num, den })
    }

    /// Parse the `num/den` notation used by ffprobe
    pub fn parse(value: &str) -> Option<Self> {
        let (num, den) = value.split_once('/')?;
        let num = num.trim().parse().ok()?;
        let den = den.trim().parse().ok()?;
        Self::new(num, den)
    }

    /// Convert to floating point seconds
    pub fn to_seconds(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Ticks per second, as used by container timescale options
    pub fn timescale(&self) -> Option<u32> {
        if self.num <= 0 || self.den <= 0 {
            return None;
        }
        u32::try_from(self.den / self.num).ok().filter(|t| *t > 0)
    }
}

impl fmt::Display for Timebase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Stream kind as reported by the prober
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    Unknown,
}

impl StreamKind {
    pub fn from_codec_type(codec_type: &str) -> Self {
        match codec_type {
            "video" => StreamKind::Video,
            "audio" => StreamKind::Audio,
            "subtitle" => StreamKind::Subtitle,
            "data" => StreamKind::Data,
            "attachment" => StreamKind::Attachment,
            _ => StreamKind::Unknown,
        }
    }
}

/// Facts about one stream of a probed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamFacts {
    pub index: usize,
    pub kind: StreamKind,
    pub codec_name: Option<String>,
    pub bit_rate: Option<u64>,
    pub time_base: Option<Timebase>,
    pub frame_rate: Option<f64>,
    /// Cover art and other still images muxed as video
    #[serde(default)]
    pub attached_pic: bool,
}

impl StreamFacts {
    pub fn new(index: usize, kind: StreamKind) -> Self {
        Self {
            index,
            kind,
            codec_name: None,
            bit_rate: None,
            time_base: None,
            frame_rate: None,
            attached_pic: false,
        }
    }

    pub fn with_codec(mut self, codec: impl Into<String>) -> Self {
        self.codec_name = Some(codec.into());
        self
    }

    /// A real moving-picture stream, the only kind smart cut can encode
    pub fn is_real_video(&self) -> bool {
        self.kind == StreamKind::Video && !self.attached_pic
    }
}

/// Facts about one probed file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFacts {
    pub path: PathBuf,
    pub format_name: Option<String>,
    pub duration: Option<f64>,
    pub streams: Vec<StreamFacts>,
}

impl FileFacts {
    pub fn new(path: impl Into<PathBuf>, duration: Option<f64>, streams: Vec<StreamFacts>) -> Self {
        Self {
            path: path.into(),
            format_name: None,
            duration,
            streams,
        }
    }

    pub fn stream(&self, index: usize) -> Option<&StreamFacts> {
        self.streams.iter().find(|s| s.index == index)
    }
}

/// Streams retained from one input file, in output order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStreams {
    pub path: PathBuf,
    pub stream_indices: Vec<usize>,
}

impl FileStreams {
    pub fn new(path: impl Into<PathBuf>, stream_indices: Vec<usize>) -> Self {
        Self {
            path: path.into(),
            stream_indices,
        }
    }
}

/// Ordered stream selection across all input files.
///
/// Order must stay stable through the whole pipeline: output stream indices
/// are derived from positions in this list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamSelection {
    pub files: Vec<FileStreams>,
}

impl StreamSelection {
    pub fn new(files: Vec<FileStreams>) -> Self {
        Self { files }
    }

    /// Selection restricted to files that contribute at least one stream
    pub fn filtered(&self) -> Vec<&FileStreams> {
        self.files
            .iter()
            .filter(|f| !f.stream_indices.is_empty())
            .collect()
    }

    pub fn stream_count(&self) -> usize {
        self.files.iter().map(|f| f.stream_indices.len()).sum()
    }
}

/// Disposition override for one output stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Disposition {
    /// Remove every disposition flag
    Clear,
    Set(String),
}

impl From<String> for Disposition {
    fn from(value: String) -> Self {
        if value == "clear" {
            Disposition::Clear
        } else {
            Disposition::Set(value)
        }
    }
}

impl From<Disposition> for String {
    fn from(value: Disposition) -> Self {
        match value {
            Disposition::Clear => "clear".to_string(),
            Disposition::Set(token) => token,
        }
    }
}

/// Legacy-compatibility bitstream conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitstreamFilter {
    #[serde(rename = "h264_mp4toannexb")]
    H264Mp4ToAnnexB,
    #[serde(rename = "hevc_mp4toannexb")]
    HevcMp4ToAnnexB,
}

impl BitstreamFilter {
    pub fn filter_name(&self) -> &'static str {
        match self {
            BitstreamFilter::H264Mp4ToAnnexB => "h264_mp4toannexb",
            BitstreamFilter::HevcMp4ToAnnexB => "hevc_mp4toannexb",
        }
    }
}

/// Per-stream overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamParam {
    pub disposition: Option<Disposition>,
    pub bitstream_filter: Option<BitstreamFilter>,
    pub custom_tags: BTreeMap<String, String>,
}

/// Per-file, per-stream overrides. An absent key means "no override".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamParams {
    pub files: BTreeMap<PathBuf, BTreeMap<usize, StreamParam>>,
}

impl StreamParams {
    pub fn get(&self, path: &Path, index: usize) -> Option<&StreamParam> {
        self.files.get(path).and_then(|streams| streams.get(&index))
    }

    pub fn set(&mut self, path: impl Into<PathBuf>, index: usize, param: StreamParam) {
        self.files.entry(path.into()).or_default().insert(index, param);
    }
}

/// Chapter marker in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Metadata decisions made upstream for the whole batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataDecisions {
    pub stream_params: StreamParams,
    /// File-level custom tags
    pub file_tags: BTreeMap<String, String>,
    /// Display rotation to apply to the first video stream, in degrees
    pub rotation: Option<u32>,
}

/// Keyframe facts for a desired cut point
#[derive(Debug, Clone, PartialEq)]
pub struct SmartCutParams {
    /// First keyframe at or after the desired cut point
    pub lossless_cut_from: f64,
    pub segment_needs_smart_cut: bool,
    pub video_codec: String,
    pub video_bitrate: Option<u64>,
    pub video_stream_index: usize,
    pub video_timebase: Option<Timebase>,
    pub frame_rate: Option<f64>,
}

impl SmartCutParams {
    pub fn frame_duration(&self) -> Option<f64> {
        self.frame_rate.filter(|r| *r > 0.0).map(|r| 1.0 / r)
    }
}

/// ffmpeg muxer name of the output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputFormat(pub String);

impl OutputFormat {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_mov_family(&self) -> bool {
        matches!(self.0.as_str(), "mp4" | "mov" | "ipod" | "ismv" | "3gp" | "3g2")
    }

    pub fn is_matroska_family(&self) -> bool {
        matches!(self.0.as_str(), "matroska" | "webm")
    }

    /// Guess the muxer from a file extension
    pub fn from_extension(ext: &str) -> Self {
        let name = match ext.to_ascii_lowercase().as_str() {
            "mkv" | "mka" | "mks" => "matroska",
            "webm" => "webm",
            "mov" | "qt" => "mov",
            "m4a" | "m4v" => "ipod",
            "ts" | "mts" | "m2ts" => "mpegts",
            "3gp" => "3gp",
            "mp4" => "mp4",
            other => return Self(other.to_string()),
        };
        Self(name.to_string())
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self("mp4".to_string())
    }
}

/// Global metadata preservation policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreserveMetadata {
    #[default]
    Default,
    NonGlobal,
    None,
}

/// `-avoid_negative_ts` modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidNegativeTs {
    MakeZero,
    Auto,
    MakeNonNegative,
    Disabled,
}

impl AvoidNegativeTs {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvoidNegativeTs::MakeZero => "make_zero",
            AvoidNegativeTs::Auto => "auto",
            AvoidNegativeTs::MakeNonNegative => "make_non_negative",
            AvoidNegativeTs::Disabled => "disabled",
        }
    }
}

/// How file modification times relate to media timelines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampMode {
    /// The source's mtime marks the start (true) or end (false) of its timeline
    pub treat_input_mtime_as_start: bool,
    /// Whether the output's mtime marks its start or end; `None` leaves the
    /// freshly produced output's own clock untouched
    pub treat_output_mtime_as_start: Option<bool>,
}

impl Default for TimestampMode {
    fn default() -> Self {
        Self {
            treat_input_mtime_as_start: true,
            treat_output_mtime_as_start: None,
        }
    }
}

/// Batch-wide export options
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub overwrite: bool,
    pub smart_cut: bool,
    /// Seek before the input when smart cut is off
    pub keyframe_cut: bool,
    pub avoid_negative_ts: Option<AvoidNegativeTs>,
    pub output_format: OutputFormat,
    pub preserve_mov_data: bool,
    pub mov_fast_start: bool,
    pub preserve_metadata: PreserveMetadata,
    pub timescale: Option<u32>,
    pub playback_rate: f64,
    pub shortest: bool,
    /// Start shift in frames, applied to non-smart cuts
    pub cut_from_adjustment_frames: i32,
    pub timestamps: TimestampMode,
    pub video_bitrate_override: Option<u64>,
    pub experimental: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            overwrite: false,
            smart_cut: true,
            keyframe_cut: false,
            avoid_negative_ts: Some(AvoidNegativeTs::MakeZero),
            output_format: OutputFormat::default(),
            preserve_mov_data: false,
            mov_fast_start: true,
            preserve_metadata: PreserveMetadata::Default,
            timescale: None,
            playback_rate: 1.0,
            shortest: false,
            cut_from_adjustment_frames: 0,
            timestamps: TimestampMode::default(),
            video_bitrate_override: None,
            experimental: false,
        }
    }
}

/// A requested segment together with its destination
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSegment {
    pub segment: Segment,
    pub output_path: PathBuf,
}

/// How a segment was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CutStrategy {
    Direct,
    TooNarrow,
    Hybrid,
}

/// Result of one single-range cut
#[derive(Debug, Clone, PartialEq)]
pub enum CutOutcome {
    Written(PathBuf),
    /// Destination existed and overwrite was disabled
    Skipped(PathBuf),
}

impl CutOutcome {
    pub fn path(&self) -> &Path {
        match self {
            CutOutcome::Written(path) | CutOutcome::Skipped(path) => path,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, CutOutcome::Skipped(_))
    }
}

/// Result of one exported segment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentOutcome {
    pub output_path: PathBuf,
    pub skipped: bool,
    pub strategy: Option<CutStrategy>,
    /// Streams dropped during concatenation because not every part had them
    pub excluded_stream_ids: Vec<usize>,
}

impl SegmentOutcome {
    pub fn skipped(path: PathBuf) -> Self {
        Self {
            output_path: path,
            skipped: true,
            strategy: None,
            excluded_stream_ids: Vec::new(),
        }
    }

    pub fn written(path: PathBuf, strategy: CutStrategy, excluded_stream_ids: Vec<usize>) -> Self {
        Self {
            output_path: path,
            skipped: false,
            strategy: Some(strategy),
            excluded_stream_ids,
        }
    }
}

#[cfg(test)]
mod tests;
