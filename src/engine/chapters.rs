//! ffmetadata chapter side-file

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::domain::model::Chapter;
use crate::engine::artifacts::ArtifactScope;
use crate::error::ExportResult;
use crate::ports::FsPort;
use crate::utils::time::seconds_to_millis;

/// Escape characters that are special in ffmetadata values
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Render chapters as an ffmetadata document with millisecond timebase
pub fn render_ffmetadata(chapters: &[Chapter]) -> String {
    let blocks: Vec<String> = chapters
        .iter()
        .map(|chapter| {
            let mut block = format!(
                "[CHAPTER]\nTIMEBASE=1/1000\nSTART={}\nEND={}\n",
                seconds_to_millis(chapter.start),
                seconds_to_millis(chapter.end)
            );
            if let Some(name) = chapter.name.as_deref().filter(|n| !n.is_empty()) {
                block.push_str(&format!("title={}\n", escape_value(name)));
            }
            block
        })
        .collect();
    format!(";FFMETADATA1\n{}", blocks.join("\n"))
}

/// Write the side-file into `scope`. Nothing is written for an empty list.
pub async fn write_chapter_file(
    fs: &dyn FsPort,
    scope: &mut ArtifactScope,
    path: &Path,
    chapters: &[Chapter],
) -> ExportResult<Option<PathBuf>> {
    if chapters.is_empty() {
        return Ok(None);
    }
    let path = scope.track(path);
    fs.write_text_atomic(&path, &render_ffmetadata(chapters))
        .await?;
    debug!(path = %path.display(), count = chapters.len(), "wrote chapter file");
    Ok(Some(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_blocks() {
        let chapters = vec![
            Chapter {
                start: 0.0,
                end: 1.5,
                name: Some("Intro".to_string()),
            },
            Chapter {
                start: 1.5,
                end: 3.0,
                name: None,
            },
        ];
        assert_eq!(
            render_ffmetadata(&chapters),
            ";FFMETADATA1\n\
             [CHAPTER]\nTIMEBASE=1/1000\nSTART=0\nEND=1500\ntitle=Intro\n\
             \n\
             [CHAPTER]\nTIMEBASE=1/1000\nSTART=1500\nEND=3000\n"
        );
    }

    #[test]
    fn test_escape_value() {
        assert_eq!(escape_value("a=b;c#d\\e"), "a\\=b\\;c\\#d\\\\e");
        assert_eq!(escape_value("two\nlines"), "two\\\nlines");
    }
}
