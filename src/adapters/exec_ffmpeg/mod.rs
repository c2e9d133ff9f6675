//! FFmpeg execution adapter
//!
//! Runs `ffmpeg` as a child process. Progress is read from the
//! `-progress pipe:1` key/value stream on stdout and scaled against the
//! expected output duration; stderr is drained concurrently and attached
//! to the error when the process fails.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ExportError, ExportResult};
use crate::ports::{EngineInvocation, ExecOutput, ExecutePort, ProgressCallback};

/// Arguments prepended to every invocation
const BASE_ARGS: [&str; 5] = ["-hide_banner", "-nostats", "-progress", "pipe:1", "-loglevel"];

/// Lines of stderr kept in an engine error
const STDERR_TAIL_LINES: usize = 30;

/// Quote one argument for a POSIX shell, leaving plain words alone
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=+,@%".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Copy-pasteable command line for the command log
pub fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(shell_quote(program))
        .chain(args.iter().map(|a| shell_quote(a)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Output time in seconds carried by one `-progress` line
pub fn parse_progress_time(line: &str) -> Option<f64> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        // out_time_ms is in microseconds as well
        "out_time_us" | "out_time_ms" => value
            .trim()
            .parse::<i64>()
            .ok()
            .map(|us| us.max(0) as f64 / 1_000_000.0),
        _ => None,
    }
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

/// `ExecutePort` over a spawned ffmpeg binary
pub struct FfmpegExecutor {
    ffmpeg_path: PathBuf,
    log_level: String,
}

impl FfmpegExecutor {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            log_level: "error".to_string(),
        }
    }

    /// ffmpeg's own `-loglevel`
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    fn full_args(&self, invocation: &EngineInvocation) -> Vec<String> {
        BASE_ARGS
            .iter()
            .map(|s| s.to_string())
            .chain(std::iter::once(self.log_level.clone()))
            .chain(invocation.args.iter().cloned())
            .collect()
    }
}

#[async_trait]
impl ExecutePort for FfmpegExecutor {
    async fn run(
        &self,
        invocation: &EngineInvocation,
        progress: &dyn ProgressCallback,
    ) -> ExportResult<ExecOutput> {
        let args = self.full_args(invocation);
        let program = self.ffmpeg_path.to_string_lossy().to_string();
        let command = command_line(&program, &args);
        info!(command = %command, "running ffmpeg");

        let mut child = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExportError::Engine {
                command: command.clone(),
                exit_code: None,
                stderr: format!("failed to spawn ffmpeg: {}", e),
            })?;

        // drained concurrently so a full stderr pipe cannot stall ffmpeg
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).to_string()
            })
        });

        // an early exit closes the pipe; the exit status decides the outcome
        let mut stdin_error = None;
        if let (Some(text), Some(mut stdin)) = (invocation.stdin.clone(), child.stdin.take()) {
            let written = match stdin.write_all(text.as_bytes()).await {
                Ok(()) => stdin.shutdown().await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                debug!(error = %e, "ffmpeg stopped reading stdin");
                stdin_error = Some(e);
            }
        }

        let mut stdout_text = String::new();
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let (Some(time), Some(total)) =
                    (parse_progress_time(&line), invocation.expected_duration)
                {
                    if total > 0.0 {
                        progress.on_progress((time / total).clamp(0.0, 1.0));
                    }
                }
                stdout_text.push_str(&line);
                stdout_text.push('\n');
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(ExportError::Engine {
                command,
                exit_code: status.code(),
                stderr: tail(&stderr, STDERR_TAIL_LINES),
            });
        }
        if let Some(e) = stdin_error {
            return Err(ExportError::Engine {
                command,
                exit_code: status.code(),
                stderr: format!(
                    "{}\ninput list not fully written: {}",
                    tail(&stderr, STDERR_TAIL_LINES),
                    e
                ),
            });
        }

        progress.on_progress(1.0);
        debug!(bytes = stderr.len(), "ffmpeg finished");
        Ok(ExecOutput {
            stdout: stdout_text,
            stderr,
        })
    }
}

/// Dry-run executor: logs and records every invocation without running it
#[derive(Default)]
pub struct RecordingExecutor {
    program: String,
    recorded: Mutex<Vec<EngineInvocation>>,
}

impl RecordingExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<EngineInvocation> {
        self.recorded
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Command lines of everything recorded so far
    pub fn command_lines(&self) -> Vec<String> {
        self.recorded()
            .iter()
            .map(|inv| command_line(&self.program, &inv.args))
            .collect()
    }
}

#[async_trait]
impl ExecutePort for RecordingExecutor {
    async fn run(
        &self,
        invocation: &EngineInvocation,
        progress: &dyn ProgressCallback,
    ) -> ExportResult<ExecOutput> {
        info!(
            command = %command_line(&self.program, &invocation.args),
            "dry run, not executing"
        );
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(invocation.clone());
        }
        progress.on_progress(1.0);
        Ok(ExecOutput::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("-ss"), "-ss");
        assert_eq!(shell_quote("/a/b.mp4"), "/a/b.mp4");
        assert_eq!(shell_quote("my clip.mp4"), "'my clip.mp4'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_parse_progress_time() {
        assert_eq!(parse_progress_time("out_time_us=2500000"), Some(2.5));
        assert_eq!(parse_progress_time("out_time_ms=1000000"), Some(1.0));
        assert_eq!(parse_progress_time("out_time_us=-5"), Some(0.0));
        assert_eq!(parse_progress_time("out_time=00:00:02.500000"), None);
        assert_eq!(parse_progress_time("progress=continue"), None);
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc", 2), "b\nc");
        assert_eq!(tail("a", 5), "a");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_early_exit_with_unread_stdin_is_engine_error() {
        // `false` exits 1 without reading its input
        let exec = FfmpegExecutor::new("false");
        let invocation = EngineInvocation::new(vec!["-i".into(), "-".into()])
            .with_stdin("file '/tmp/part.mp4'\n".repeat(200_000));
        let err = exec.run(&invocation, &|_f: f64| {}).await.unwrap_err();
        match err {
            ExportError::Engine { exit_code, .. } => assert_eq!(exit_code, Some(1)),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_recording_executor_records() {
        let exec = RecordingExecutor::new("ffmpeg");
        let invocation = EngineInvocation::new(vec!["-i".into(), "in file.mp4".into()]);
        exec.run(&invocation, &|_f: f64| {}).await.unwrap();
        assert_eq!(exec.command_lines(), vec!["ffmpeg -i 'in file.mp4'"]);
    }
}
