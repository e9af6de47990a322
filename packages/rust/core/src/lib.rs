//! Import orchestration for feedport.
//!
//! [`Importer`] drives a run through its phases: fetch every source, compute
//! each entry's output path, transform content (asset localization, then
//! HTML→Markdown), clean up unused assets, sort newest first, and write the
//! documents with their front matter.

pub mod frontmatter;
mod importer;
pub mod paths;
pub mod persist;
pub mod report;
pub mod writer;

pub use importer::{Importer, RunState};
pub use paths::PathPolicy;
pub use persist::{GitHubPersister, Persist, PersistTarget};
pub use report::{ImportSummary, ProgressReporter, SilentProgress};
