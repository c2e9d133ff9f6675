//! Argument building for cut, encode and concat invocations
//!
//! Everything here is pure: the same inputs always produce the same
//! argument list, and malformed overrides contribute nothing.

use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::model::{
    AvoidNegativeTs, Disposition, ExportOptions, MetadataDecisions, PreserveMetadata,
    StreamSelection,
};
use crate::domain::rules::TrimPlan;
use crate::streams::metadata::stream_metadata_args;
use crate::streams::StreamMapper;
use crate::utils::time::format_arg_seconds;

fn push(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Container tuning flags for the output format
pub fn container_flags(options: &ExportOptions) -> Vec<String> {
    let mut args = Vec::new();
    let format = &options.output_format;

    if format.is_mov_family() {
        let mut flags = String::new();
        if options.preserve_mov_data {
            flags.push_str("+use_metadata_tags");
        }
        if options.mov_fast_start {
            flags.push_str("+faststart");
        }
        if !flags.is_empty() {
            args.push("-movflags".to_string());
            args.push(flags);
        }
    }

    if format.is_matroska_family() {
        push(&mut args, &["-default_mode", "infer_no_subs"]);
    }

    args
}

/// Global metadata import from input `source_input`
pub fn metadata_policy_args(policy: PreserveMetadata, source_input: usize) -> Vec<String> {
    match policy {
        PreserveMetadata::Default => vec!["-map_metadata".to_string(), source_input.to_string()],
        PreserveMetadata::NonGlobal => vec!["-map_metadata:g".to_string(), "-1".to_string()],
        PreserveMetadata::None => vec!["-map_metadata".to_string(), "-1".to_string()],
    }
}

/// Rotation override. The stored tag is the inverse of display rotation.
pub fn rotation_args(rotation: Option<u32>) -> Vec<String> {
    match rotation {
        Some(degrees) => vec![
            "-metadata:s:v:0".to_string(),
            format!("rotate={}", (360 - degrees % 360) % 360),
        ],
        None => Vec::new(),
    }
}

/// File-level custom tags
pub fn file_tag_args(tags: &BTreeMap<String, String>) -> Vec<String> {
    tags.iter()
        .flat_map(|(key, value)| ["-metadata".to_string(), format!("{}={}", key, value)])
        .collect()
}

/// `-ss` / `-t` pair for a trim plan
pub fn trim_args(trim: &TrimPlan) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(start) = trim.start {
        args.push("-ss".to_string());
        args.push(format_arg_seconds(start));
    }
    if let Some(duration) = trim.duration {
        args.push("-t".to_string());
        args.push(format_arg_seconds(duration));
    }
    args
}

/// `-itsscale` value for a playback rate, or nothing at normal speed
pub fn playback_rate_args(rate: f64) -> Vec<String> {
    if rate > 0.0 && (rate - 1.0).abs() > f64::EPSILON {
        vec!["-itsscale".to_string(), format!("{}", 1.0 / rate)]
    } else {
        Vec::new()
    }
}

/// Output timescale, only meaningful for the mov family
pub fn timescale_args(options: &ExportOptions, timescale: Option<u32>) -> Vec<String> {
    match timescale {
        Some(ts) if options.output_format.is_mov_family() => {
            vec!["-video_track_timescale".to_string(), ts.to_string()]
        }
        _ => Vec::new(),
    }
}

fn output_tail(options: &ExportOptions, output: &Path) -> Vec<String> {
    let mut args = Vec::new();
    if options.experimental {
        push(&mut args, &["-strict", "experimental"]);
    }
    push(&mut args, &["-f", options.output_format.as_str(), "-y"]);
    args.push(path_arg(output));
    args
}

/// Re-encode of the smart-cut video stream; everything else is copied
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSpec {
    pub video_output_index: usize,
    pub codec: String,
    pub bitrate: Option<u64>,
}

impl EncodeSpec {
    fn args(&self) -> Vec<String> {
        let mut args = vec![
            format!("-c:{}", self.video_output_index),
            self.codec.clone(),
        ];
        if let Some(bitrate) = self.bitrate {
            args.push(format!("-b:{}", self.video_output_index));
            args.push(bitrate.to_string());
        }
        args
    }
}

/// Everything a single-range cut or encode invocation depends on
#[derive(Debug, Clone)]
pub struct CutArgs<'a> {
    pub selection: &'a StreamSelection,
    pub metadata: &'a MetadataDecisions,
    pub options: &'a ExportOptions,
    pub trim: TrimPlan,
    /// Seek before the inputs (fast, keyframe aligned) rather than after
    pub keyframe_seek: bool,
    pub avoid_negative_ts: Option<AvoidNegativeTs>,
    pub timescale: Option<u32>,
    pub chapters: Option<&'a Path>,
    pub encode: Option<&'a EncodeSpec>,
    pub output: &'a Path,
}

/// Build the argument list of one cut
pub fn build_cut_args(cut: &CutArgs<'_>) -> Vec<String> {
    let mapper = StreamMapper::new(cut.selection, 0);
    let inputs = mapper.input_files();
    let trim = trim_args(&cut.trim);
    let mut args = Vec::new();

    for input in &inputs {
        args.extend(playback_rate_args(cut.options.playback_rate));
        if cut.keyframe_seek {
            args.extend(trim.iter().cloned());
        }
        args.push("-i".to_string());
        args.push(path_arg(input));
    }
    if !cut.keyframe_seek {
        args.extend(trim.iter().cloned());
    }

    let chapters_input = inputs.len();
    if let Some(chapters) = cut.chapters {
        push(&mut args, &["-f", "ffmetadata", "-i"]);
        args.push(path_arg(chapters));
    }

    push(&mut args, &["-c", "copy"]);
    if let Some(encode) = cut.encode {
        args.extend(encode.args());
    }
    if cut.options.shortest {
        args.push("-shortest".to_string());
    }

    args.extend(mapper.map_args());
    args.extend(metadata_policy_args(cut.options.preserve_metadata, 0));
    if cut.chapters.is_some() {
        args.push("-map_chapters".to_string());
        args.push(chapters_input.to_string());
    }

    args.extend(container_flags(cut.options));

    // without a start seek this blanks the first frame
    if let (Some(mode), Some(_)) = (cut.avoid_negative_ts, cut.trim.start) {
        push(&mut args, &["-avoid_negative_ts", mode.as_str()]);
    }

    args.push("-ignore_unknown".to_string());
    args.extend(rotation_args(cut.metadata.rotation));
    args.extend(stream_metadata_args(cut.selection, &cut.metadata.stream_params));
    args.extend(file_tag_args(&cut.metadata.file_tags));
    args.extend(timescale_args(cut.options, cut.timescale));
    args.extend(output_tail(cut.options, cut.output));
    args
}

/// Everything a concat invocation depends on
#[derive(Debug, Clone)]
pub struct ConcatArgs<'a> {
    pub metadata_source: &'a Path,
    /// Stream ids of the metadata source kept in the output, in order
    pub stream_ids: &'a [usize],
    /// Disposition overrides keyed by stream id of the merged parts. After a
    /// smart cut these are output indexes of the selection the parts were cut with.
    pub dispositions: &'a BTreeMap<usize, Disposition>,
    pub chapters: Option<&'a Path>,
    pub options: &'a ExportOptions,
    pub output: &'a Path,
}

/// Build the argument list of a concat demuxer merge. The part list is fed
/// on stdin as input 0, which carries no metadata of its own.
pub fn build_concat_args(concat: &ConcatArgs<'_>) -> Vec<String> {
    let mut args = Vec::new();
    push(
        &mut args,
        &[
            "-f",
            "concat",
            "-safe",
            "0",
            "-protocol_whitelist",
            "file,pipe,fd",
            "-i",
            "-",
        ],
    );
    args.push("-i".to_string());
    args.push(path_arg(concat.metadata_source));
    if let Some(chapters) = concat.chapters {
        push(&mut args, &["-f", "ffmetadata", "-i"]);
        args.push(path_arg(chapters));
    }

    push(&mut args, &["-c", "copy"]);
    for id in concat.stream_ids {
        args.push("-map".to_string());
        args.push(format!("0:{}", id));
    }

    args.extend(metadata_policy_args(concat.options.preserve_metadata, 1));
    args.push("-map_chapters".to_string());
    args.push(if concat.chapters.is_some() { "2" } else { "1" }.to_string());

    let keep_stream_metadata = concat.options.preserve_metadata != PreserveMetadata::None;
    for (output_index, id) in concat.stream_ids.iter().enumerate() {
        if keep_stream_metadata {
            args.push(format!("-map_metadata:s:{}", output_index));
            args.push(format!("1:s:{}", id));
        }
        if let Some(disposition) = concat.dispositions.get(id) {
            args.push(format!("-disposition:{}", output_index));
            args.push(match disposition {
                Disposition::Clear => "0".to_string(),
                Disposition::Set(token) => token.clone(),
            });
        }
    }

    args.extend(container_flags(concat.options));
    args.push("-ignore_unknown".to_string());
    args.extend(output_tail(concat.options, concat.output));
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{FileStreams, OutputFormat, StreamParam};

    fn selection() -> StreamSelection {
        StreamSelection::new(vec![FileStreams::new("/in/a.mp4", vec![0, 1])])
    }

    fn find_pair(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    fn cut<'a>(
        selection: &'a StreamSelection,
        metadata: &'a MetadataDecisions,
        options: &'a ExportOptions,
        trim: TrimPlan,
        keyframe_seek: bool,
    ) -> CutArgs<'a> {
        CutArgs {
            selection,
            metadata,
            options,
            trim,
            keyframe_seek,
            avoid_negative_ts: options.avoid_negative_ts,
            timescale: None,
            chapters: None,
            encode: None,
            output: Path::new("/out/b.mp4"),
        }
    }

    #[test]
    fn test_container_flags_toggle_independently() {
        let mut options = ExportOptions::default();
        assert_eq!(container_flags(&options), vec!["-movflags", "+faststart"]);

        options.preserve_mov_data = true;
        assert_eq!(
            container_flags(&options),
            vec!["-movflags", "+use_metadata_tags+faststart"]
        );

        options.mov_fast_start = false;
        assert_eq!(container_flags(&options), vec!["-movflags", "+use_metadata_tags"]);

        options.preserve_mov_data = false;
        assert!(container_flags(&options).is_empty());

        options.output_format = OutputFormat::new("matroska");
        options.mov_fast_start = true;
        assert_eq!(container_flags(&options), vec!["-default_mode", "infer_no_subs"]);
    }

    #[test]
    fn test_rotation_is_inverted() {
        assert_eq!(rotation_args(Some(90)), vec!["-metadata:s:v:0", "rotate=270"]);
        assert_eq!(rotation_args(Some(0)), vec!["-metadata:s:v:0", "rotate=0"]);
        assert!(rotation_args(None).is_empty());
    }

    #[test]
    fn test_untrimmed_cut_has_no_trim_or_negative_ts() {
        let metadata = MetadataDecisions::default();
        let options = ExportOptions::default();
        let selection = selection();
        let trim = TrimPlan {
            start: None,
            duration: None,
        };
        let args = build_cut_args(&cut(&selection, &metadata, &options, trim, false));
        assert!(!args.contains(&"-ss".to_string()));
        assert!(!args.contains(&"-t".to_string()));
        assert!(!args.contains(&"-avoid_negative_ts".to_string()));
        assert_eq!(args.last().unwrap(), "/out/b.mp4");
    }

    #[test]
    fn test_trim_placement_follows_seek_mode() {
        let metadata = MetadataDecisions::default();
        let options = ExportOptions::default();
        let selection = selection();
        let trim = TrimPlan {
            start: Some(2.3),
            duration: Some(7.7),
        };

        let before = build_cut_args(&cut(&selection, &metadata, &options, trim, true));
        let ss = before.iter().position(|a| a == "-ss").unwrap();
        let input = before.iter().position(|a| a == "-i").unwrap();
        assert!(ss < input);
        assert_eq!(before[ss + 1], "2.30000");
        assert_eq!(find_pair(&before, "-t").unwrap(), "7.70000");

        let after = build_cut_args(&cut(&selection, &metadata, &options, trim, false));
        let ss = after.iter().position(|a| a == "-ss").unwrap();
        let input = after.iter().position(|a| a == "-i").unwrap();
        assert!(ss > input);
        assert_eq!(find_pair(&after, "-avoid_negative_ts").unwrap(), "make_zero");
    }

    #[test]
    fn test_end_only_trim_suppresses_negative_ts() {
        let metadata = MetadataDecisions::default();
        let options = ExportOptions::default();
        let selection = selection();
        let trim = TrimPlan {
            start: None,
            duration: Some(5.0),
        };
        let args = build_cut_args(&cut(&selection, &metadata, &options, trim, false));
        assert!(args.contains(&"-t".to_string()));
        assert!(!args.contains(&"-avoid_negative_ts".to_string()));
    }

    #[test]
    fn test_cut_maps_chapters_and_streams() {
        let mut metadata = MetadataDecisions::default();
        metadata.stream_params.set(
            "/in/a.mp4",
            1,
            StreamParam {
                disposition: Some(Disposition::Clear),
                ..Default::default()
            },
        );
        metadata.file_tags.insert("title".into(), "Clip".into());
        let options = ExportOptions {
            timescale: Some(90000),
            ..Default::default()
        };
        let selection = selection();
        let trim = TrimPlan {
            start: None,
            duration: None,
        };
        let mut request = cut(&selection, &metadata, &options, trim, false);
        request.chapters = Some(Path::new("/out/ch.txt"));
        request.timescale = options.timescale;
        let args = build_cut_args(&request);

        assert_eq!(find_pair(&args, "-map_chapters").unwrap(), "1");
        assert_eq!(find_pair(&args, "-disposition:1").unwrap(), "0");
        assert_eq!(find_pair(&args, "-metadata").unwrap(), "title=Clip");
        assert_eq!(find_pair(&args, "-video_track_timescale").unwrap(), "90000");
        assert_eq!(find_pair(&args, "-map_metadata").unwrap(), "0");
        assert_eq!(find_pair(&args, "-f").unwrap(), "ffmetadata");
        let maps: Vec<&String> = args
            .iter()
            .enumerate()
            .filter(|(i, _)| *i > 0 && args[i - 1] == "-map")
            .map(|(_, a)| a)
            .collect();
        assert_eq!(maps, vec!["0:0", "0:1"]);
    }

    #[test]
    fn test_encode_spec_args() {
        let metadata = MetadataDecisions::default();
        let options = ExportOptions::default();
        let selection = selection();
        let encode = EncodeSpec {
            video_output_index: 0,
            codec: "h264".to_string(),
            bitrate: Some(2_000_000),
        };
        let trim = TrimPlan {
            start: Some(2.3),
            duration: Some(1.66),
        };
        let mut request = cut(&selection, &metadata, &options, trim, false);
        request.encode = Some(&encode);
        let args = build_cut_args(&request);
        assert_eq!(find_pair(&args, "-c").unwrap(), "copy");
        assert_eq!(find_pair(&args, "-c:0").unwrap(), "h264");
        assert_eq!(find_pair(&args, "-b:0").unwrap(), "2000000");
    }

    #[test]
    fn test_playback_rate_scales_inputs() {
        assert_eq!(playback_rate_args(2.0), vec!["-itsscale", "0.5"]);
        assert!(playback_rate_args(1.0).is_empty());
    }

    #[test]
    fn test_concat_args_never_import_from_list_input() {
        let options = ExportOptions::default();
        let mut dispositions = BTreeMap::new();
        dispositions.insert(1, Disposition::Set("default".to_string()));
        let args = build_concat_args(&ConcatArgs {
            metadata_source: Path::new("/tmp/rem.mp4"),
            stream_ids: &[0, 1],
            dispositions: &dispositions,
            chapters: Some(Path::new("/tmp/ch.txt")),
            options: &options,
            output: Path::new("/out/final.mp4"),
        });

        assert_eq!(&args[..8], ["-f", "concat", "-safe", "0", "-protocol_whitelist", "file,pipe,fd", "-i", "-"]);
        assert_eq!(find_pair(&args, "-map_metadata").unwrap(), "1");
        assert_eq!(find_pair(&args, "-map_chapters").unwrap(), "2");
        assert_eq!(find_pair(&args, "-map_metadata:s:1").unwrap(), "1:s:1");
        assert_eq!(find_pair(&args, "-disposition:1").unwrap(), "default");
        assert_eq!(args.last().unwrap(), "/out/final.mp4");
    }

    #[test]
    fn test_concat_without_metadata() {
        let options = ExportOptions {
            preserve_metadata: PreserveMetadata::None,
            ..Default::default()
        };
        let args = build_concat_args(&ConcatArgs {
            metadata_source: Path::new("/tmp/a.mp4"),
            stream_ids: &[0],
            dispositions: &BTreeMap::new(),
            chapters: None,
            options: &options,
            output: Path::new("/out/final.mp4"),
        });
        assert_eq!(find_pair(&args, "-map_metadata").unwrap(), "-1");
        assert_eq!(find_pair(&args, "-map_chapters").unwrap(), "1");
        assert!(!args.iter().any(|a| a.starts_with("-map_metadata:s:")));
    }
}
