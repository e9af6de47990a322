//! Tracks which downloaded assets survive conversion, and removes the rest.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use feedport_assets::{normalize_path, reference_to_local_path};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Marks {
    keep: HashSet<PathBuf>,
    delete: HashSet<PathBuf>,
}

/// Run-scoped keep/delete sets of local asset paths.
#[derive(Debug)]
pub struct AssetUsage {
    output_folder: PathBuf,
    marks: Mutex<Marks>,
}

impl AssetUsage {
    pub fn new(output_folder: impl Into<PathBuf>) -> Self {
        Self {
            output_folder: output_folder.into(),
            marks: Mutex::new(Marks::default()),
        }
    }

    pub fn keep(&self, reference: &str, document: &Path) {
        if let Some(path) = reference_to_local_path(reference, document, &self.output_folder) {
            self.marks
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .keep
                .insert(path);
        }
    }

    pub fn delete(&self, reference: &str, document: &Path) {
        if let Some(path) = reference_to_local_path(reference, document, &self.output_folder) {
            self.marks
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .delete
                .insert(path);
        }
    }

    /// Paths marked for deletion and not kept by any reference.
    pub fn pending_deletions(&self) -> Vec<PathBuf> {
        let marks = self.marks.lock().unwrap_or_else(|e| e.into_inner());
        let mut paths: Vec<_> = marks.delete.difference(&marks.keep).cloned().collect();
        paths.sort();
        paths
    }

    /// Delete every asset marked for deletion and not kept, then reset both
    /// sets. Returns the number of files removed.
    pub async fn cleanup(&self) -> usize {
        let Marks { keep, delete } =
            std::mem::take(&mut *self.marks.lock().unwrap_or_else(|e| e.into_inner()));

        let root = normalize_path(&self.output_folder);
        let mut cleaned = 0;
        for path in delete.difference(&keep) {
            if !path.starts_with(&root) {
                warn!(path = %path.display(), "refusing to delete outside the output folder");
                continue;
            }
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    debug!(path = %path.display(), "removed unused asset");
                    cleaned += 1;
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "failed to remove unused asset"),
            }
        }

        if cleaned > 0 {
            info!(cleaned, "removed unused assets");
        }
        cleaned
    }
}
