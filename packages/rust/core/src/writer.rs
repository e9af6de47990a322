//! Document write policy: conflict detection, safe mode, dry run, and
//! atomic writes.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use feedport_shared::{Entry, FeedportError, Result};
use tracing::info;

use crate::frontmatter::render_document;

#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub overwrite: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { size: usize },
    /// Dry run: the document was rendered but not written.
    Rendered { size: usize },
    /// Safe mode kept an existing file.
    Skipped,
}

/// Fail if two distinct entries target the same file. Runs over the whole
/// batch before anything is written.
pub fn check_conflicts(entries: &[Entry]) -> Result<()> {
    let mut claimed: HashMap<&Path, &Entry> = HashMap::new();
    for entry in entries {
        let Some(path) = entry.file_path.as_deref() else {
            continue;
        };
        if let Some(first) = claimed.insert(path, entry) {
            if first.uuid != entry.uuid {
                return Err(FeedportError::PathConflict {
                    path: path.to_path_buf(),
                    first_url: first.url.clone(),
                    second_url: entry.url.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Render and write one entry to its `file_path`.
pub async fn write_document(entry: &Entry, opts: WriteOptions) -> Result<WriteOutcome> {
    let path = entry.file_path.as_deref().ok_or_else(|| {
        FeedportError::validation(format!("{} has no output path", entry.url))
    })?;

    if !opts.overwrite && tokio::fs::try_exists(path).await.unwrap_or(false) {
        info!(
            kind = "post",
            local = %path.display(),
            remote = %entry.url,
            "skipping"
        );
        return Ok(WriteOutcome::Skipped);
    }

    let contents = render_document(entry)?;
    let size = contents.len();
    info!(
        kind = "post",
        local = %path.display(),
        remote = %entry.url,
        size,
        dry_run = opts.dry_run,
        "importing"
    );
    if opts.dry_run {
        return Ok(WriteOutcome::Rendered { size });
    }

    write_atomic(path, contents.as_bytes()).await?;
    Ok(WriteOutcome::Written { size })
}

/// Write to a sibling temp file, then rename over the target.
async fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| FeedportError::io(parent, e))?;
    }
    let temp = temp_path(path);
    tokio::fs::write(&temp, contents)
        .await
        .map_err(|e| FeedportError::io(&temp, e))?;
    tokio::fs::rename(&temp, path)
        .await
        .map_err(|e| FeedportError::io(path, e))
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}
