//! Fetching remote feeds, API pages and binary assets.
//!
//! Everything that touches the network goes through the [`Fetch`] trait so
//! adapters and the asset store can be driven by [`HttpFetcher`] in
//! production and by [`StubFetcher`] in tests. Responses are decoded by
//! kind: text, raw bytes, XML (into a JSON-shaped tree, see [`xml`]) or JSON.

mod cache;
mod http;
pub mod stub;
pub mod xml;

use async_trait::async_trait;
use feedport_shared::Result;

pub use http::{HttpFetcher, HttpFetcherOptions};
pub use stub::StubFetcher;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// How a response body should be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchKind {
    #[default]
    Text,
    Buffer,
    Xml,
    Json,
}

/// HTTP basic credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub kind: FetchKind,
    pub headers: Vec<(String, String)>,
    pub basic_auth: Option<BasicAuth>,
    /// Log failures at warn level. Expected failures (pagination probing)
    /// turn this off.
    pub show_errors: bool,
}

impl FetchOptions {
    pub fn new(kind: FetchKind) -> Self {
        Self {
            kind,
            show_errors: true,
            ..Self::default()
        }
    }

    pub fn with_basic_auth(mut self, auth: Option<BasicAuth>) -> Self {
        self.basic_auth = auth;
        self
    }

    pub fn quiet(mut self) -> Self {
        self.show_errors = false;
        self
    }
}

/// A decoded response body.
#[derive(Debug, Clone)]
pub enum Fetched {
    Text(String),
    Buffer {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
    /// XML or JSON, as a `serde_json::Value` tree.
    Parsed(serde_json::Value),
}

impl Fetched {
    /// Unwrap a parsed tree, or fail with a parse error naming the URL.
    pub fn into_value(self, url: &str) -> Result<serde_json::Value> {
        match self {
            Self::Parsed(value) => Ok(value),
            _ => Err(feedport_shared::FeedportError::parse(format!(
                "{url}: expected a structured payload"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Fetch trait
// ---------------------------------------------------------------------------

/// The fetch contract shared by adapters and the asset store.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetch `url` and decode it per `opts.kind`.
    async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<Fetched>;

    /// Number of distinct URLs that failed during this run.
    fn error_count(&self) -> usize;
}
