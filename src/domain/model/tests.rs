// Unit tests for domain models

use super::*;

#[test]
fn test_segment_duration_never_negative() {
    assert_eq!(Segment::new(2.0, 5.5).duration(), 3.5);
    assert_eq!(Segment::new(5.0, 2.0).duration(), 0.0);
}

#[test]
fn test_cut_range_collapses_file_edges() {
    let range = CutRange::from_segment(Segment::new(0.0, 10.0), Some(10.0));
    assert_eq!(range.from, CutFrom::FileStart);
    assert_eq!(range.to, CutTo::FileEnd);

    let range = CutRange::from_segment(Segment::new(1.5, 9.0), Some(10.0));
    assert_eq!(range.from, CutFrom::At(1.5));
    assert_eq!(range.to, CutTo::At(9.0));
}

#[test]
fn test_cut_range_unknown_duration_keeps_end() {
    let range = CutRange::from_segment(Segment::new(0.0, 10.0), None);
    assert_eq!(range.to, CutTo::At(10.0));
    assert_eq!(range.end_seconds(None), Some(10.0));
}

#[test]
fn test_timebase_parse() {
    let tb = Timebase::parse("1/90000").unwrap();
    assert_eq!(tb, Timebase { num: 1, den: 90000 });
    assert_eq!(tb.timescale(), Some(90000));
    assert_eq!(tb.to_string(), "1/90000");

    assert!(Timebase::parse("0/0").is_none());
    assert!(Timebase::parse("garbage").is_none());
}

#[test]
fn test_stream_kind_from_codec_type() {
    assert_eq!(StreamKind::from_codec_type("video"), StreamKind::Video);
    assert_eq!(StreamKind::from_codec_type("subtitle"), StreamKind::Subtitle);
    assert_eq!(StreamKind::from_codec_type("something"), StreamKind::Unknown);
}

#[test]
fn test_attached_picture_is_not_real_video() {
    let mut cover = StreamFacts::new(2, StreamKind::Video).with_codec("mjpeg");
    cover.attached_pic = true;
    assert!(!cover.is_real_video());
    assert!(StreamFacts::new(0, StreamKind::Video).is_real_video());
}

#[test]
fn test_selection_filters_empty_files() {
    let selection = StreamSelection::new(vec![
        FileStreams::new("a.mp4", vec![0, 1]),
        FileStreams::new("b.srt", vec![]),
        FileStreams::new("c.m4a", vec![0]),
    ]);
    let filtered = selection.filtered();
    assert_eq!(filtered.len(), 2);
    assert_eq!(filtered[1].path, PathBuf::from("c.m4a"));
    assert_eq!(selection.stream_count(), 3);
}

#[test]
fn test_stream_params_absent_key_is_none() {
    let mut params = StreamParams::default();
    params.set(
        "a.mp4",
        1,
        StreamParam {
            disposition: Some(Disposition::Clear),
            ..Default::default()
        },
    );
    assert!(params.get(Path::new("a.mp4"), 1).is_some());
    assert!(params.get(Path::new("a.mp4"), 0).is_none());
    assert!(params.get(Path::new("b.mp4"), 1).is_none());
}

#[test]
fn test_disposition_serde() {
    let clear: Disposition = serde_json::from_str("\"clear\"").unwrap();
    assert_eq!(clear, Disposition::Clear);
    let forced: Disposition = serde_json::from_str("\"forced\"").unwrap();
    assert_eq!(forced, Disposition::Set("forced".to_string()));
    assert_eq!(serde_json::to_string(&Disposition::Clear).unwrap(), "\"clear\"");
}

#[test]
fn test_output_format_families() {
    assert!(OutputFormat::new("mp4").is_mov_family());
    assert!(OutputFormat::new("ipod").is_mov_family());
    assert!(!OutputFormat::new("matroska").is_mov_family());
    assert!(OutputFormat::new("webm").is_matroska_family());
    assert_eq!(OutputFormat::from_extension("MKV"), OutputFormat::new("matroska"));
    assert_eq!(OutputFormat::from_extension("m4v"), OutputFormat::new("ipod"));
}

#[test]
fn test_smart_cut_params_frame_duration() {
    let mut params = SmartCutParams {
        lossless_cut_from: 4.0,
        segment_needs_smart_cut: true,
        video_codec: "h264".to_string(),
        video_bitrate: Some(4_000_000),
        video_stream_index: 0,
        video_timebase: Timebase::new(1, 12800),
        frame_rate: Some(25.0),
    };
    assert_eq!(params.frame_duration(), Some(0.04));
    params.frame_rate = None;
    assert_eq!(params.frame_duration(), None);
    params.frame_rate = Some(0.0);
    assert_eq!(params.frame_duration(), None);
}
