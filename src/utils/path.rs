//! Path helpers for outputs, transient artifacts and concat lists

use std::path::{Path, PathBuf};

use crate::domain::model::Segment;
use crate::error::ExportResult;
use crate::utils::time::format_for_filename;

/// Make a path absolute against the working directory
pub fn absolute(path: &Path) -> ExportResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// One `file '<path>'` line of a concat list, single quotes escaped
pub fn concat_list_entry(path: &Path) -> String {
    let escaped = path.to_string_lossy().replace('\'', "'\\''");
    format!("file '{}'", escaped)
}

/// Concat list naming every part by absolute path, one per line
pub fn concat_list(paths: &[PathBuf]) -> ExportResult<String> {
    let mut list = String::new();
    for path in paths {
        list.push_str(&concat_list_entry(&absolute(path)?));
        list.push('\n');
    }
    Ok(list)
}

/// Transient artifact next to `output`, namespaced by segment index
pub fn artifact_path(output: &Path, label: &str, segment_index: usize) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "segment".to_string());
    let name = match output.extension() {
        Some(ext) => format!(
            "{}-{}-{}.{}",
            stem,
            label,
            segment_index,
            ext.to_string_lossy()
        ),
        None => format!("{}-{}-{}", stem, label, segment_index),
    };
    output.with_file_name(name)
}

/// Chapter side-file for a batch writing into `out_dir`
pub fn chapters_path(out_dir: &Path, input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "export".to_string());
    out_dir.join(format!("{}-chapters-{}.txt", stem, std::process::id()))
}

/// `<stem>-<from>-<to>.<ext>` in `out_dir`, or beside the input
pub fn default_output_path(
    input: &Path,
    out_dir: Option<&Path>,
    segment: &Segment,
    extension: &str,
) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = format!(
        "{}-{}-{}.{}",
        stem,
        format_for_filename(segment.start),
        format_for_filename(segment.end),
        extension
    );
    match out_dir {
        Some(dir) => dir.join(name),
        None => input.with_file_name(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_entry_escapes_quotes() {
        let entry = concat_list_entry(Path::new("/videos/it's here.mp4"));
        assert_eq!(entry, "file '/videos/it'\\''s here.mp4'");
    }

    #[test]
    fn test_concat_list_one_line_per_part() {
        let list = concat_list(&[PathBuf::from("/a/1.mp4"), PathBuf::from("/a/2.mp4")]).unwrap();
        assert_eq!(list, "file '/a/1.mp4'\nfile '/a/2.mp4'\n");
    }

    #[test]
    fn test_artifact_path_is_namespaced() {
        let out = Path::new("/out/clip.mkv");
        assert_eq!(
            artifact_path(out, "smartcut-encoded", 3),
            PathBuf::from("/out/clip-smartcut-encoded-3.mkv")
        );
        assert_ne!(
            artifact_path(out, "smartcut-encoded", 3),
            artifact_path(out, "smartcut-encoded", 4)
        );
    }

    #[test]
    fn test_default_output_path() {
        let path = default_output_path(
            Path::new("/in/movie.mp4"),
            Some(Path::new("/out")),
            &Segment::new(61.5, 90.0),
            "mp4",
        );
        assert_eq!(
            path,
            PathBuf::from("/out/movie-00.01.01.500-00.01.30.000.mp4")
        );
    }
}
