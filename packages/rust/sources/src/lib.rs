//! Source adapters: turn feeds and content APIs into canonical entries.
//!
//! Each supported source type implements [`SourceAdapter`]. A [`Source`]
//! pairs an adapter with its per-source options and runs the shared fetch
//! and pagination loop, so adapters only describe where data lives and how
//! one raw item maps onto an [`Entry`](feedport_shared::Entry).

pub mod adapters;
pub mod date;
mod source;
pub mod value;

use async_trait::async_trait;
use feedport_fetch::{BasicAuth, Fetch, FetchKind};
use feedport_shared::{Author, ContentType, EntryStatus, FeedportError, SourceKind};
use serde_json::{Map, Value};

pub use adapters::{
    AtomSource, BlueskySource, CustomSource, EntryMapper, FediverseSource, HostedWordPressSource,
    RssSource, WordPressSource, YouTubeSource, default_file_path,
};
pub use source::{Source, SourceOptions};

// ---------------------------------------------------------------------------
// CleanEntry
// ---------------------------------------------------------------------------

/// An adapter's mapping of one raw item, before dates are parsed and the
/// namespaced uuid is applied.
#[derive(Debug, Clone, Default)]
pub struct CleanEntry {
    /// Source-specific identifier (guid, post id, video id, ...).
    pub id: String,
    pub title: String,
    pub url: String,
    pub authors: Vec<Author>,
    pub date: Option<String>,
    pub date_updated: Option<String>,
    pub content: String,
    pub content_type: Option<ContentType>,
    pub status: Option<EntryStatus>,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Capability interface every source type implements.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// URL of the given page (1-based). Unpaginated sources ignore `page`.
    /// `None` means there is no (further) URL to fetch.
    fn url_for_page(&self, page: u32) -> Option<String>;

    /// Whether [`url_for_page`](Self::url_for_page) should be walked until
    /// a page comes back empty.
    fn paginated(&self) -> bool {
        false
    }

    /// How the payload is decoded.
    fn payload_kind(&self) -> FetchKind {
        FetchKind::Xml
    }

    fn basic_auth(&self) -> Option<BasicAuth> {
        None
    }

    /// Data supplied directly instead of fetched.
    fn inline_data(&self) -> Option<Value> {
        None
    }

    /// Raw items contained in a decoded payload.
    fn entries_from_data<'a>(&self, data: &'a Value) -> Vec<&'a Value>;

    /// Map one raw item. `data` is the whole payload it came from.
    /// May fetch secondary resources through `fetcher`.
    async fn clean_entry(
        &self,
        raw: &Value,
        data: &Value,
        fetcher: &dyn Fetch,
    ) -> feedport_shared::Result<CleanEntry>;

    /// Whether a failed page fetch should fail the source. Returning
    /// `false` ends pagination quietly.
    async fn is_error_worth_worrying_about(&self, _err: &FeedportError) -> bool {
        true
    }
}
