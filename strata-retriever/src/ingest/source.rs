//! Read-only file system access behind a narrow capability.
//!
//! The ingest engine consumes [`FileSource`] rather than touching the file
//! system directly, which keeps traversal policy (ignore rules, symlinks)
//! out of the pipeline and lets tests substitute their own source. Future
//! document sources (dbt manifests, Git history, warehouse metadata dumps)
//! implement this same trait and feed the same engine.

use crate::error::{PipelineError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Read-only file access consumed by the ingest engine.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Enumerate files under `root` whose extension (without dot,
    /// case-insensitive) is in `extensions`. Order must be deterministic.
    async fn list_files(&self, root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>>;

    /// Read a file as UTF-8 text. Decode failure is `UnsupportedEncoding`;
    /// content is never silently re-coded.
    async fn read_text(&self, path: &Path) -> Result<String>;
}

/// Local-disk implementation. Respects gitignore rules and skips hidden
/// files; results are sorted so runs are reproducible.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSource;

impl LocalFileSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSource for LocalFileSource {
    async fn list_files(&self, root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
        let root = root.to_path_buf();
        let wanted: Vec<String> = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();

        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            for entry in ignore::WalkBuilder::new(&root).build() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        tracing::warn!("skipping unreadable entry: {err}");
                        continue;
                    }
                };
                if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    continue;
                }
                let matches = entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| wanted.iter().any(|w| *w == e.to_ascii_lowercase()))
                    .unwrap_or(false);
                if matches {
                    files.push(entry.into_path());
                }
            }
            files.sort();
            files
        })
        .await?;

        Ok(files)
    }

    async fn read_text(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::document_io(path, e))?;
        String::from_utf8(bytes).map_err(|_| PipelineError::UnsupportedEncoding {
            path: path.to_path_buf(),
        })
    }
}
