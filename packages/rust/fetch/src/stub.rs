//! In-memory [`Fetch`] implementation for tests and offline runs.
//!
//! Responses are registered per URL. Any URL without a registered response
//! fails, so tests can never reach the network by accident.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use feedport_shared::{FeedportError, Result};

use crate::http::decode;
use crate::{Fetch, FetchOptions, Fetched};

#[derive(Debug, Clone)]
enum StubResponse {
    Body {
        bytes: Vec<u8>,
        content_type: Option<String>,
    },
    Http {
        status: u16,
        body: String,
    },
}

#[derive(Debug, Default)]
pub struct StubFetcher {
    responses: HashMap<String, StubResponse>,
    latency: Option<Duration>,
    calls: Mutex<HashMap<String, usize>>,
    failed: Mutex<HashSet<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw body, decoded per the requested kind at fetch time.
    pub fn with_body(
        mut self,
        url: impl Into<String>,
        body: impl Into<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Self {
        self.responses.insert(
            url.into(),
            StubResponse::Body {
                bytes: body.into(),
                content_type: content_type.map(str::to_owned),
            },
        );
        self
    }

    pub fn with_json(self, url: impl Into<String>, value: &serde_json::Value) -> Self {
        self.with_body(url, value.to_string(), Some("application/json"))
    }

    pub fn with_xml(self, url: impl Into<String>, xml: &str) -> Self {
        self.with_body(url, xml, Some("application/xml"))
    }

    /// Register a non-success HTTP response.
    pub fn with_http_error(mut self, url: impl Into<String>, status: u16, body: &str) -> Self {
        self.responses.insert(
            url.into(),
            StubResponse::Http {
                status,
                body: body.to_owned(),
            },
        );
        self
    }

    /// Delay every response, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// How many times `url` has been requested.
    pub fn calls(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    fn record_failure(&self, url: &str) {
        self.failed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_owned());
    }
}

#[async_trait]
impl Fetch for StubFetcher {
    async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<Fetched> {
        *self
            .calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(url.to_owned())
            .or_default() += 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.responses.get(url) {
            Some(StubResponse::Body {
                bytes,
                content_type,
            }) => decode(url, bytes.clone(), content_type.clone(), opts.kind).inspect_err(|_| {
                self.record_failure(url);
            }),
            Some(StubResponse::Http { status, body }) => {
                self.record_failure(url);
                Err(FeedportError::Http {
                    url: url.to_owned(),
                    status: *status,
                    body: body.clone(),
                })
            }
            None => {
                self.record_failure(url);
                Err(FeedportError::Network(format!(
                    "no stubbed response for {url}"
                )))
            }
        }
    }

    fn error_count(&self) -> usize {
        self.failed.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FetchKind;

    #[tokio::test]
    async fn decodes_per_requested_kind_and_counts_calls() {
        let stub = StubFetcher::new().with_xml("https://example.com/feed", "<a><b>1</b></a>");
        let value = stub
            .fetch("https://example.com/feed", &FetchOptions::new(FetchKind::Xml))
            .await
            .unwrap()
            .into_value("https://example.com/feed")
            .unwrap();
        assert_eq!(value["a"]["b"], "1");
        assert_eq!(stub.calls("https://example.com/feed"), 1);
    }

    #[tokio::test]
    async fn unknown_url_fails() {
        let stub = StubFetcher::new();
        let err = stub
            .fetch("https://example.com/nope", &FetchOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no stubbed response"));
        assert_eq!(stub.error_count(), 1);
    }
}
