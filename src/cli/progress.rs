//! Terminal progress reporting

use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::ports::ProgressCallback;

const BAR_LENGTH: usize = 20;

/// Progress bar on stderr, redrawn at most every `interval`
pub struct ConsoleProgress {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            interval: Duration::from_millis(100),
            last: Mutex::new(None),
        }
    }
}

impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

/// `[#####-----]  50.0%`
pub fn render_bar(fraction: f64) -> String {
    let fraction = fraction.clamp(0.0, 1.0);
    let filled = (fraction * BAR_LENGTH as f64).round() as usize;
    format!(
        "[{}{}] {:>5.1}%",
        "#".repeat(filled),
        "-".repeat(BAR_LENGTH - filled),
        fraction * 100.0
    )
}

impl ProgressCallback for ConsoleProgress {
    fn on_progress(&self, fraction: f64) {
        let Ok(mut last) = self.last.lock() else {
            return;
        };
        let due = last.map_or(true, |t| t.elapsed() >= self.interval);
        if !due && fraction < 1.0 {
            return;
        }
        *last = Some(Instant::now());

        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{}", render_bar(fraction));
        if fraction >= 1.0 {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

/// One JSON progress event per line on stdout
pub struct JsonProgress;

impl ProgressCallback for JsonProgress {
    fn on_progress(&self, fraction: f64) {
        let event = serde_json::json!({
            "event": "progress",
            "fraction": fraction,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        println!("{}", event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_bar() {
        assert_eq!(render_bar(0.0), format!("[{}]   0.0%", "-".repeat(20)));
        assert_eq!(render_bar(0.5), format!("[{}{}]  50.0%", "#".repeat(10), "-".repeat(10)));
        assert_eq!(render_bar(2.0), format!("[{}] 100.0%", "#".repeat(20)));
    }
}
