//! Per-stream disposition, bitstream filter and custom tag arguments

use crate::domain::model::{Disposition, StreamParam, StreamParams, StreamSelection};
use crate::domain::rules::output_stream_index;

/// Arguments overriding one output stream
pub fn stream_param_args(output_index: usize, param: &StreamParam) -> Vec<String> {
    let mut args = Vec::new();

    if let Some(disposition) = &param.disposition {
        let value = match disposition {
            // ffmpeg clears every flag when given 0
            Disposition::Clear => "0".to_string(),
            Disposition::Set(token) => token.clone(),
        };
        args.push(format!("-disposition:{}", output_index));
        args.push(value);
    }

    if let Some(filter) = param.bitstream_filter {
        args.push(format!("-bsf:{}", output_index));
        args.push(filter.filter_name().to_string());
    }

    for (key, value) in &param.custom_tags {
        args.push(format!("-metadata:s:{}", output_index));
        args.push(format!("{}={}", key, value));
    }

    args
}

/// Override arguments for every selected stream that has params.
///
/// Params naming a stream outside the selection contribute nothing.
pub fn stream_metadata_args(selection: &StreamSelection, params: &StreamParams) -> Vec<String> {
    let mut args = Vec::new();
    for file in selection.filtered() {
        for stream_index in &file.stream_indices {
            let Some(param) = params.get(&file.path, *stream_index) else {
                continue;
            };
            let Some(output_index) = output_stream_index(selection, &file.path, *stream_index)
            else {
                continue;
            };
            args.extend(stream_param_args(output_index, param));
        }
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{BitstreamFilter, FileStreams};

    fn selection() -> StreamSelection {
        StreamSelection::new(vec![
            FileStreams::new("a.mp4", vec![2, 0]),
            FileStreams::new("b.mp4", vec![]),
            FileStreams::new("c.srt", vec![0]),
        ])
    }

    #[test]
    fn test_clear_disposition_is_emitted_as_zero() {
        let mut params = StreamParams::default();
        params.set(
            "a.mp4",
            0,
            StreamParam {
                disposition: Some(Disposition::Clear),
                ..Default::default()
            },
        );
        assert_eq!(
            stream_metadata_args(&selection(), &params),
            vec!["-disposition:1", "0"]
        );
    }

    #[test]
    fn test_args_follow_positional_index() {
        let mut params = StreamParams::default();
        let mut tagged = StreamParam {
            disposition: Some(Disposition::Set("default".to_string())),
            bitstream_filter: Some(BitstreamFilter::HevcMp4ToAnnexB),
            ..Default::default()
        };
        tagged.custom_tags.insert("language".into(), "eng".into());
        params.set("c.srt", 0, tagged);

        assert_eq!(
            stream_metadata_args(&selection(), &params),
            vec![
                "-disposition:2",
                "default",
                "-bsf:2",
                "hevc_mp4toannexb",
                "-metadata:s:2",
                "language=eng",
            ]
        );
    }

    #[test]
    fn test_unknown_streams_contribute_nothing() {
        let mut params = StreamParams::default();
        let param = StreamParam {
            bitstream_filter: Some(BitstreamFilter::H264Mp4ToAnnexB),
            ..Default::default()
        };
        params.set("a.mp4", 7, param.clone());
        params.set("b.mp4", 0, param.clone());
        params.set("zzz.mp4", 0, param);
        assert!(stream_metadata_args(&selection(), &params).is_empty());
    }
}
