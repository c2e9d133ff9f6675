//! Local filesystem adapter

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{ExportError, ExportResult};
use crate::ports::{DeleteOutcome, FsPort};

/// `FsPort` over the local file system
#[derive(Debug, Clone)]
pub struct LocalFs {
    delete_attempts: u32,
    retry_delay: Duration,
}

impl Default for LocalFs {
    fn default() -> Self {
        Self {
            delete_attempts: 3,
            retry_delay: Duration::from_millis(200),
        }
    }
}

impl LocalFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.delete_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    async fn delete_one(&self, path: &Path) -> DeleteOutcome {
        let mut attempt = 1;
        loop {
            match tokio::fs::remove_file(path).await {
                Ok(()) => return DeleteOutcome::Deleted(path.to_path_buf()),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    return DeleteOutcome::Absent(path.to_path_buf())
                }
                Err(e) if attempt >= self.delete_attempts => {
                    return DeleteOutcome::Failed {
                        path: path.to_path_buf(),
                        error: e.to_string(),
                    }
                }
                Err(e) => {
                    debug!(path = %path.display(), attempt, error = %e, "delete failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                }
            }
        }
    }
}

fn write_atomic_blocking(path: PathBuf, contents: String) -> ExportResult<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let mut file = tempfile::NamedTempFile::new_in(&dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(&path).map_err(|e| ExportError::IoError(e.error))?;
    Ok(())
}

#[async_trait]
impl FsPort for LocalFs {
    async fn file_exists(&self, path: &Path) -> ExportResult<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn is_writable(&self, path: &Path) -> ExportResult<bool> {
        match tokio::fs::metadata(path).await {
            Ok(metadata) => Ok(!metadata.permissions().readonly()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_directory(&self, path: &Path) -> ExportResult<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn write_text_atomic(&self, path: &Path, contents: &str) -> ExportResult<()> {
        let path = path.to_path_buf();
        let contents = contents.to_string();
        tokio::task::spawn_blocking(move || write_atomic_blocking(path, contents))
            .await
            .map_err(|e| ExportError::IoError(std::io::Error::other(e.to_string())))?
    }

    async fn delete_with_retry(&self, paths: &[PathBuf]) -> Vec<DeleteOutcome> {
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            outcomes.push(self.delete_one(path).await);
        }
        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_atomic_write_and_delete() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFs::new().with_retry(1, Duration::from_millis(1));
        let path = dir.path().join("chapters.txt");

        fs.write_text_atomic(&path, "first").await.unwrap();
        fs.write_text_atomic(&path, "second").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(fs.file_exists(&path).await.unwrap());
        assert!(fs.is_writable(&path).await.unwrap());

        let missing = dir.path().join("missing.txt");
        let outcomes = fs.delete_with_retry(&[path.clone(), missing.clone()]).await;
        assert_eq!(
            outcomes,
            vec![DeleteOutcome::Deleted(path.clone()), DeleteOutcome::Absent(missing)]
        );
        assert!(!fs.file_exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_readonly_file_is_not_writable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locked.mp4");
        std::fs::write(&path, b"x").unwrap();
        let mut permissions = std::fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        std::fs::set_permissions(&path, permissions).unwrap();

        assert!(!LocalFs::new().is_writable(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_create_nested_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        LocalFs::new().create_directory(&nested).await.unwrap();
        assert!(nested.is_dir());
    }
}
