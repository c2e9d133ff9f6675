//! Time parsing and formatting utilities

use crate::error::{ExportError, ExportResult};

/// Parse a time string to seconds.
///
/// Accepts plain seconds (`123.45`), `MM:SS.ms` and `HH:MM:SS.ms`.
pub fn parse_time(time_str: &str) -> ExportResult<f64> {
    let time_str = time_str.trim();
    let invalid = || ExportError::InvalidJob {
        message: format!(
            "invalid time '{}', expected seconds, MM:SS.ms or HH:MM:SS.ms",
            time_str
        ),
    };

    if let Ok(seconds) = time_str.parse::<f64>() {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(invalid());
        }
        return Ok(seconds);
    }

    let parts: Vec<&str> = time_str.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [m, s] => ("0", *m, *s),
        [h, m, s] => (*h, *m, *s),
        _ => return Err(invalid()),
    };

    let hours: u32 = hours.parse().map_err(|_| invalid())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid())?;
    let seconds: f64 = seconds.parse().map_err(|_| invalid())?;

    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return Err(invalid());
    }

    Ok(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)
}

/// Seconds as passed to ffmpeg trim options
pub fn format_arg_seconds(seconds: f64) -> String {
    format!("{:.5}", seconds)
}

/// Whole milliseconds, as used by chapter metadata
pub fn seconds_to_millis(seconds: f64) -> i64 {
    (seconds * 1000.0).round() as i64
}

/// Compact `HH.MM.SS.mmm` form that is safe inside file names
pub fn format_for_filename(seconds: f64) -> String {
    let total_ms = seconds_to_millis(seconds.max(0.0));
    let hours = total_ms / 3_600_000;
    let minutes = (total_ms % 3_600_000) / 60_000;
    let secs = (total_ms % 60_000) / 1000;
    let millis = total_ms % 1000;
    format!("{:02}.{:02}.{:02}.{:03}", hours, minutes, secs, millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        assert_eq!(parse_time("123.5").unwrap(), 123.5);
        assert_eq!(parse_time("01:30.5").unwrap(), 90.5);
        assert_eq!(parse_time("1:02:03.25").unwrap(), 3723.25);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse_time("-1").is_err());
        assert!(parse_time("00:60").is_err());
        assert!(parse_time("1:60:00").is_err());
        assert!(parse_time("abc").is_err());
        assert!(parse_time("1:2:3:4").is_err());
    }

    #[test]
    fn test_format_arg_seconds() {
        assert_eq!(format_arg_seconds(2.3), "2.30000");
        assert_eq!(format_arg_seconds(0.0), "0.00000");
    }

    #[test]
    fn test_format_for_filename() {
        assert_eq!(format_for_filename(3723.25), "01.02.03.250");
        assert_eq!(format_for_filename(0.0), "00.00.00.000");
    }
}
