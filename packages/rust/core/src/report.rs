//! Run summary and progress reporting.

use std::fmt;
use std::time::Duration;

/// Result of one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    /// Documents written (or that would have been, in dry-run mode).
    pub documents: usize,
    /// Assets downloaded and written.
    pub assets: usize,
    /// Unused assets removed after conversion.
    pub cleaned: usize,
    /// Failed sources, entries, and asset fetches.
    pub errors: usize,
    /// Source labels, in the order they were added.
    pub sources: Vec<String>,
    pub elapsed: Duration,
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wrote {} and {} from {}",
            plural(self.documents, "document"),
            plural(self.assets, "asset"),
            if self.sources.is_empty() {
                "no sources".to_owned()
            } else {
                self.sources.join(", ")
            },
        )?;
        if self.cleaned > 0 {
            write!(f, ", removed {}", plural(self.cleaned, "unused asset"))?;
        }
        if self.errors > 0 {
            write!(f, " ({})", plural(self.errors, "error"))?;
        }
        write!(f, " in {:.2}s", self.elapsed.as_secs_f64())
    }
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each source finishes fetching.
    fn source_fetched(&self, label: &str, entries: usize);
    /// Called after each document is written (or skipped).
    fn document_written(&self, path: &str, current: usize, total: usize);
    /// Called when the run completes.
    fn done(&self, summary: &ImportSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_fetched(&self, _label: &str, _entries: usize) {}
    fn document_written(&self, _path: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &ImportSummary) {}
}
