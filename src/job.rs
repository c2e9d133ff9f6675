//! Export job files
//!
//! A job names one input, the segments to cut from it and the stream and
//! metadata decisions for the batch. TOML, JSON and YAML are accepted,
//! picked by file extension.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::model::*;
use crate::engine::BatchRequest;
use crate::error::{ExportError, ExportResult};
use crate::utils::path::default_output_path;
use crate::utils::time::parse_time;

/// Seconds, or a `HH:MM:SS.ms` / `MM:SS.ms` string
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TimeValue {
    Seconds(f64),
    Text(String),
}

impl TimeValue {
    pub fn seconds(&self) -> ExportResult<f64> {
        match self {
            TimeValue::Seconds(s) if s.is_finite() && *s >= 0.0 => Ok(*s),
            TimeValue::Seconds(s) => Err(ExportError::InvalidJob {
                message: format!("invalid time {}", s),
            }),
            TimeValue::Text(text) => parse_time(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobSegment {
    pub start: TimeValue,
    pub end: TimeValue,
    /// Relative paths resolve against the output directory
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct JobStreamParam {
    /// Defaults to the job input
    pub file: Option<PathBuf>,
    pub index: usize,
    #[serde(flatten)]
    pub param: StreamParam,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExportJob {
    pub input: PathBuf,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Extension of generated output names
    #[serde(default)]
    pub extension: Option<String>,
    pub segments: Vec<JobSegment>,
    /// Streams of the input to keep, in output order; empty keeps all
    #[serde(default)]
    pub streams: Vec<usize>,
    /// Full multi-file selection; takes precedence over `streams`
    #[serde(default)]
    pub selection: Vec<FileStreams>,
    #[serde(default)]
    pub stream_params: Vec<JobStreamParam>,
    #[serde(default)]
    pub file_tags: BTreeMap<String, String>,
    #[serde(default)]
    pub rotation: Option<u32>,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

fn invalid(message: impl Into<String>) -> ExportError {
    ExportError::InvalidJob {
        message: message.into(),
    }
}

impl ExportJob {
    /// Parse `text` in the format named by `extension`
    pub fn parse(text: &str, extension: &str) -> ExportResult<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "toml" => toml::from_str(text).map_err(|e| invalid(e.to_string())),
            "json" => serde_json::from_str(text).map_err(|e| invalid(e.to_string())),
            "yaml" | "yml" => serde_yaml::from_str(text).map_err(|e| invalid(e.to_string())),
            other => Err(invalid(format!("unsupported job file type '{}'", other))),
        }
    }

    pub fn load(path: &Path) -> ExportResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| invalid(format!("cannot read {}: {}", path.display(), e)))?;
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::parse(&text, &extension)
    }

    /// Extension of generated output names
    pub fn output_extension(&self) -> String {
        self.extension
            .clone()
            .or_else(|| {
                self.input
                    .extension()
                    .map(|e| e.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "mp4".to_string())
    }

    /// Validate and resolve into a batch request
    pub fn into_batch_request(self, output_dir_override: Option<&Path>) -> ExportResult<BatchRequest> {
        let output_dir = output_dir_override
            .map(Path::to_path_buf)
            .or_else(|| self.output_dir.clone())
            .or_else(|| self.input.parent().map(Path::to_path_buf))
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));
        let extension = self.output_extension();

        if self.segments.is_empty() {
            return Err(invalid("job has no segments"));
        }

        let mut seen = HashSet::new();
        let mut segments = Vec::with_capacity(self.segments.len());
        for (index, job_segment) in self.segments.iter().enumerate() {
            let segment = Segment::new(job_segment.start.seconds()?, job_segment.end.seconds()?);
            if segment.start >= segment.end {
                return Err(invalid(format!(
                    "segment {} starts at or after its end ({})",
                    index + 1,
                    segment
                )));
            }
            let output_path = match &job_segment.output {
                Some(path) if path.is_absolute() => path.clone(),
                Some(path) => output_dir.join(path),
                None => default_output_path(&self.input, Some(&output_dir), &segment, &extension),
            };
            if output_path == self.input {
                return Err(invalid(format!(
                    "segment {} would overwrite the input",
                    index + 1
                )));
            }
            if !seen.insert(output_path.clone()) {
                return Err(invalid(format!(
                    "segment {} reuses output {}",
                    index + 1,
                    output_path.display()
                )));
            }
            segments.push(ExportSegment {
                segment,
                output_path,
            });
        }

        let selection = if !self.selection.is_empty() {
            StreamSelection::new(self.selection.clone())
        } else if !self.streams.is_empty() {
            StreamSelection::new(vec![FileStreams::new(self.input.clone(), self.streams.clone())])
        } else {
            StreamSelection::default()
        };

        let mut stream_params = StreamParams::default();
        for entry in &self.stream_params {
            let file = entry.file.clone().unwrap_or_else(|| self.input.clone());
            stream_params.set(file, entry.index, entry.param.clone());
        }

        Ok(BatchRequest {
            input: self.input,
            output_dir,
            segments,
            selection,
            metadata: MetadataDecisions {
                stream_params,
                file_tags: self.file_tags,
                rotation: self.rotation,
            },
            chapters: self.chapters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_JOB: &str = r#"
        input = "/media/movie.mp4"
        output_dir = "/exports"
        streams = [0, 1]

        [[segments]]
        start = 2.3
        end = "00:00:10"

        [[segments]]
        start = "1:00"
        end = 75.5
        output = "credits.mp4"

        [[stream_params]]
        index = 1
        disposition = "clear"

        [[chapters]]
        start = 0.0
        end = 5.0
        name = "Intro"
    "#;

    #[test]
    fn test_toml_job_resolves() {
        let request = ExportJob::parse(TOML_JOB, "toml")
            .unwrap()
            .into_batch_request(None)
            .unwrap();

        assert_eq!(request.segments.len(), 2);
        assert_eq!(request.segments[0].segment, Segment::new(2.3, 10.0));
        assert_eq!(
            request.segments[0].output_path,
            PathBuf::from("/exports/movie-00.00.02.300-00.00.10.000.mp4")
        );
        assert_eq!(request.segments[1].output_path, PathBuf::from("/exports/credits.mp4"));
        assert_eq!(request.selection.stream_count(), 2);
        assert_eq!(
            request
                .metadata
                .stream_params
                .get(Path::new("/media/movie.mp4"), 1)
                .and_then(|p| p.disposition.clone()),
            Some(Disposition::Clear)
        );
        assert_eq!(request.chapters.len(), 1);
    }

    #[test]
    fn test_json_and_yaml_jobs() {
        let json = r#"{"input": "a.mkv", "segments": [{"start": 1, "end": 2}]}"#;
        let job = ExportJob::parse(json, "json").unwrap();
        assert_eq!(job.output_extension(), "mkv");

        let yaml = "input: a.mp4\nsegments:\n  - start: 0\n    end: 3\n";
        let request = ExportJob::parse(yaml, "yml")
            .unwrap()
            .into_batch_request(Some(Path::new("/out")))
            .unwrap();
        assert_eq!(request.output_dir, PathBuf::from("/out"));
        assert!(request.selection.files.is_empty());
    }

    #[test]
    fn test_rejects_bad_jobs() {
        let inverted = r#"{"input": "a.mp4", "segments": [{"start": 5, "end": 2}]}"#;
        assert!(ExportJob::parse(inverted, "json")
            .unwrap()
            .into_batch_request(None)
            .is_err());

        let duplicate = r#"{"input": "a.mp4", "segments": [
            {"start": 0, "end": 2, "output": "x.mp4"},
            {"start": 3, "end": 4, "output": "x.mp4"}]}"#;
        assert!(ExportJob::parse(duplicate, "json")
            .unwrap()
            .into_batch_request(None)
            .is_err());

        assert!(ExportJob::parse("input = 1", "toml").is_err());
        assert!(ExportJob::parse("{}", "xml").is_err());
    }
}
