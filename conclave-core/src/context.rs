//! Code context extraction
//!
//! Packs the target file (and, in diff mode, the change text against a
//! base reference) into the text block handed to the review agent. Real
//! context packers with dependency traversal plug in behind the trait;
//! the shipped implementation reads the file as-is.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::git::GitRepo;
use crate::{Error, Result};

/// Produces the packed context for one review target
#[async_trait]
pub trait ContextExtractor: Send + Sync {
    /// Extract the context for `path`. With a `diff_base` the context also
    /// carries the patch against that reference, so the agent can focus on
    /// what changed.
    async fn extract(&self, path: &Path, diff_base: Option<&str>) -> Result<String>;
}

/// Extractor that packs the raw file contents
#[derive(Debug, Clone, Default)]
pub struct FileContextExtractor;

impl FileContextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContextExtractor for FileContextExtractor {
    async fn extract(&self, path: &Path, diff_base: Option<&str>) -> Result<String> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound(format!("File not found: {}", path.display()))
            } else {
                Error::Io(e)
            }
        })?;

        let mut context = format!("File: {}\n```\n{}\n```\n", path.display(), content.trim_end());

        if let Some(base) = diff_base {
            let diff = diff_against(path, base).await?;
            if !diff.trim().is_empty() {
                context.push_str(&format!("\nChanges since {}:\n```diff\n{}\n```\n", base, diff));
            }
        }

        Ok(context)
    }
}

/// git2 is blocking, so the diff runs on the blocking pool
async fn diff_against(path: &Path, base: &str) -> Result<String> {
    let path: PathBuf = path.to_path_buf();
    let base = base.to_string();
    tokio::task::spawn_blocking(move || {
        let repo = GitRepo::open(&path)?;
        let relative = path.strip_prefix(repo.root()).unwrap_or(&path);
        repo.diff_text(&base, Some(relative))
    })
    .await
    .map_err(|e| Error::ToolExecution(format!("Diff extraction failed: {}", e)))?
}
