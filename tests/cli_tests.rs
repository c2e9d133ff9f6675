//! Command-line surface tests

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn ffmpeg_available() -> bool {
    ["ffmpeg", "ffprobe"].iter().all(|tool| {
        std::process::Command::new(tool)
            .arg("-version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    })
}

/// Binary run inside `dir`, isolated from any `SMARTCUT_*` settings
fn smartcut(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("smartcut").unwrap();
    cmd.current_dir(dir);
    for (key, _) in std::env::vars() {
        if key.starts_with("SMARTCUT_") {
            cmd.env_remove(key);
        }
    }
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    smartcut(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("probe"));
}

#[test]
fn test_export_help_lists_flags() {
    let dir = TempDir::new().unwrap();
    smartcut(dir.path())
        .args(["export", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--segment"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--no-smart-cut"));
}

#[test]
fn test_missing_job_file_fails() {
    let dir = TempDir::new().unwrap();
    smartcut(dir.path())
        .args(["export", "--job", "missing.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load job file"));
}

#[test]
fn test_inverted_segment_is_rejected() {
    let dir = TempDir::new().unwrap();
    let job = dir.path().join("job.json");
    std::fs::write(
        &job,
        r#"{"input": "movie.mp4", "segments": [{"start": 9, "end": 3}]}"#,
    )
    .unwrap();

    smartcut(dir.path())
        .args(["export", "--job"])
        .arg(&job)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid export job"));
}

#[test]
fn test_job_and_input_conflict() {
    let dir = TempDir::new().unwrap();
    smartcut(dir.path())
        .args(["export", "--job", "a.toml", "--input", "a.mp4", "-s", "1-2"])
        .assert()
        .failure();
}

#[test]
fn test_bad_environment_override_fails() {
    let dir = TempDir::new().unwrap();
    smartcut(dir.path())
        .env("SMARTCUT_SMART_CUT", "maybe")
        .args(["probe", "--input", "a.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_probe_missing_input_fails() {
    let dir = TempDir::new().unwrap();
    smartcut(dir.path())
        .args(["probe", "--input", "nothing.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file does not exist"));
}

#[test]
fn test_dry_run_prints_smart_cut_steps() {
    if !ffmpeg_available() {
        eprintln!("skipping: ffmpeg/ffprobe not available");
        return;
    }
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("clip.mp4");
    let status = std::process::Command::new("ffmpeg")
        .args([
            "-v", "error", "-f", "lavfi", "-i", "testsrc=duration=4:size=160x120:rate=25",
            "-c:v", "libx264", "-g", "25", "-pix_fmt", "yuv420p", "-y",
        ])
        .arg(&input)
        .status()
        .unwrap();
    if !status.success() {
        eprintln!("skipping: libx264 not available");
        return;
    }

    smartcut(dir.path())
        .args(["export", "--dry-run", "--input"])
        .arg(&input)
        .args(["-s", "0.5-3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("smartcut-copy"))
        .stdout(predicate::str::contains("smartcut-encode"))
        .stdout(predicate::str::contains("concat"));

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["clip.mp4".to_string()]);
}
