//! Layered export configuration
//!
//! Precedence, lowest first: built-in defaults, TOML file, `SMARTCUT_*`
//! environment variables, command-line flags.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::model::*;
use crate::error::{ExportError, ExportResult};

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "smartcut.toml";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "SMARTCUT_";

/// Batch-wide export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub overwrite: bool,
    pub smart_cut: bool,
    pub keyframe_cut: bool,
    pub avoid_negative_ts: Option<AvoidNegativeTs>,
    /// Muxer name; guessed from the output extension when unset
    pub output_format: Option<String>,
    pub preserve_mov_data: bool,
    pub mov_fast_start: bool,
    pub preserve_metadata: PreserveMetadata,
    pub timescale: Option<u32>,
    pub playback_rate: f64,
    pub shortest: bool,
    pub cut_from_adjustment_frames: i32,
    pub timestamps: TimestampMode,
    pub video_bitrate: Option<u64>,
    pub experimental: bool,

    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    pub ffmpeg_log_level: String,
    pub probe_concurrency: usize,
    pub delete_attempts: u32,
    pub delete_retry_ms: u64,

    pub log_level: String,
    pub log_json: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let options = ExportOptions::default();
        Self {
            overwrite: options.overwrite,
            smart_cut: options.smart_cut,
            keyframe_cut: options.keyframe_cut,
            avoid_negative_ts: options.avoid_negative_ts,
            output_format: None,
            preserve_mov_data: options.preserve_mov_data,
            mov_fast_start: options.mov_fast_start,
            preserve_metadata: options.preserve_metadata,
            timescale: options.timescale,
            playback_rate: options.playback_rate,
            shortest: options.shortest,
            cut_from_adjustment_frames: options.cut_from_adjustment_frames,
            timestamps: options.timestamps,
            video_bitrate: options.video_bitrate_override,
            experimental: options.experimental,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            ffmpeg_log_level: "error".to_string(),
            probe_concurrency: crate::engine::DEFAULT_PROBE_CONCURRENCY,
            delete_attempts: 3,
            delete_retry_ms: 200,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> ExportResult<T> {
    value.trim().parse().map_err(|_| ExportError::Config {
        message: format!("invalid value '{}' for {}", value, key),
    })
}

fn parse_bool(key: &str, value: &str) -> ExportResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ExportError::Config {
            message: format!("invalid boolean '{}' for {}", value, key),
        }),
    }
}

fn parse_policy(key: &str, value: &str) -> ExportResult<PreserveMetadata> {
    match value.trim().to_ascii_lowercase().as_str() {
        "default" => Ok(PreserveMetadata::Default),
        "nonglobal" => Ok(PreserveMetadata::NonGlobal),
        "none" => Ok(PreserveMetadata::None),
        _ => Err(ExportError::Config {
            message: format!("invalid metadata policy '{}' for {}", value, key),
        }),
    }
}

impl ExportConfig {
    /// Defaults, then the config file, then the environment
    pub fn load(path: Option<&Path>) -> ExportResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ExportResult<Self> {
        info!(path = %path.display(), "loading configuration");
        let text = std::fs::read_to_string(path).map_err(|e| ExportError::Config {
            message: format!("cannot read {}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> ExportResult<Self> {
        toml::from_str(text).map_err(|e| ExportError::Config {
            message: e.to_string(),
        })
    }

    /// Apply `SMARTCUT_*` overrides found through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> ExportResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut applied = 0;
        let mut get = |name: &str| {
            let key = format!("{}{}", ENV_PREFIX, name);
            let value = lookup(&key).map(|v| (key, v));
            if value.is_some() {
                applied += 1;
            }
            value
        };

        if let Some((key, v)) = get("OVERWRITE") {
            self.overwrite = parse_bool(&key, &v)?;
        }
        if let Some((key, v)) = get("SMART_CUT") {
            self.smart_cut = parse_bool(&key, &v)?;
        }
        if let Some((key, v)) = get("KEYFRAME_CUT") {
            self.keyframe_cut = parse_bool(&key, &v)?;
        }
        if let Some((_, v)) = get("OUTPUT_FORMAT") {
            self.output_format = Some(v);
        }
        if let Some((key, v)) = get("PRESERVE_METADATA") {
            self.preserve_metadata = parse_policy(&key, &v)?;
        }
        if let Some((key, v)) = get("VIDEO_BITRATE") {
            self.video_bitrate = Some(parse_env(&key, &v)?);
        }
        if let Some((key, v)) = get("EXPERIMENTAL") {
            self.experimental = parse_bool(&key, &v)?;
        }
        if let Some((_, v)) = get("FFMPEG") {
            self.ffmpeg_path = PathBuf::from(v);
        }
        if let Some((_, v)) = get("FFPROBE") {
            self.ffprobe_path = PathBuf::from(v);
        }
        if let Some((key, v)) = get("PROBE_CONCURRENCY") {
            self.probe_concurrency = parse_env(&key, &v)?;
        }
        if let Some((_, v)) = get("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some((key, v)) = get("LOG_JSON") {
            self.log_json = parse_bool(&key, &v)?;
        }

        if applied > 0 {
            debug!(count = applied, "applied environment overrides");
        }
        Ok(())
    }

    /// Engine options; `format_hint` is the output extension used when no
    /// muxer is configured.
    pub fn export_options(&self, format_hint: Option<&str>) -> ExportOptions {
        let output_format = match (&self.output_format, format_hint) {
            (Some(format), _) => OutputFormat::new(format.clone()),
            (None, Some(ext)) => OutputFormat::from_extension(ext),
            (None, None) => OutputFormat::default(),
        };
        ExportOptions {
            overwrite: self.overwrite,
            smart_cut: self.smart_cut,
            keyframe_cut: self.keyframe_cut,
            avoid_negative_ts: self.avoid_negative_ts,
            output_format,
            preserve_mov_data: self.preserve_mov_data,
            mov_fast_start: self.mov_fast_start,
            preserve_metadata: self.preserve_metadata,
            timescale: self.timescale,
            playback_rate: if self.playback_rate > 0.0 {
                self.playback_rate
            } else {
                1.0
            },
            shortest: self.shortest,
            cut_from_adjustment_frames: self.cut_from_adjustment_frames,
            timestamps: self.timestamps,
            video_bitrate_override: self.video_bitrate,
            experimental: self.experimental,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_toml_overrides_defaults() {
        let config = ExportConfig::from_toml_str(
            r#"
            overwrite = true
            output_format = "matroska"
            preserve_metadata = "nonglobal"
            avoid_negative_ts = "make_non_negative"

            [timestamps]
            treat_output_mtime_as_start = true
            "#,
        )
        .unwrap();
        assert!(config.overwrite);
        assert!(config.smart_cut);
        assert_eq!(config.preserve_metadata, PreserveMetadata::NonGlobal);
        assert_eq!(config.avoid_negative_ts, Some(AvoidNegativeTs::MakeNonNegative));
        assert_eq!(config.timestamps.treat_output_mtime_as_start, Some(true));
        assert!(config.timestamps.treat_input_mtime_as_start);

        let options = config.export_options(Some("mp4"));
        assert!(options.output_format.is_matroska_family());
    }

    #[test]
    fn test_env_beats_file() {
        let mut config = ExportConfig::from_toml_str("overwrite = false").unwrap();
        let env: HashMap<&str, &str> = [
            ("SMARTCUT_OVERWRITE", "yes"),
            ("SMARTCUT_FFMPEG", "/opt/ffmpeg"),
            ("SMARTCUT_PRESERVE_METADATA", "none"),
        ]
        .into_iter()
        .collect();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert!(config.overwrite);
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg"));
        assert_eq!(config.preserve_metadata, PreserveMetadata::None);
    }

    #[test]
    fn test_bad_env_value_is_a_config_error() {
        let mut config = ExportConfig::default();
        let err = config
            .apply_env(|key| (key == "SMARTCUT_SMART_CUT").then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ExportError::Config { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        let config = ExportConfig::default();
        assert_eq!(config.export_options(Some("mkv")).output_format.as_str(), "matroska");
        assert_eq!(config.export_options(None).output_format.as_str(), "mp4");
    }
}
