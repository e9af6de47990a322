//! Programmatic sources: caller-supplied data (or URL) plus a mapping
//! closure, for feeds none of the built-in adapters understand.

use std::sync::Arc;

use async_trait::async_trait;
use feedport_fetch::{Fetch, FetchKind};
use feedport_shared::{Result, SourceKind};
use serde_json::Value;

use crate::value::as_list;
use crate::{CleanEntry, SourceAdapter};

/// Maps one raw item to a [`CleanEntry`].
pub type EntryMapper = Arc<dyn Fn(&Value) -> Result<CleanEntry> + Send + Sync>;

pub struct CustomSource {
    data: Option<Value>,
    url: Option<String>,
    payload: FetchKind,
    /// JSON pointer to the item list inside the payload; root when unset.
    entries_pointer: Option<String>,
    mapper: EntryMapper,
}

impl CustomSource {
    /// A source over data already in memory.
    pub fn from_data(data: Value, mapper: EntryMapper) -> Self {
        Self {
            data: Some(data),
            url: None,
            payload: FetchKind::Json,
            entries_pointer: None,
            mapper,
        }
    }

    /// A source fetched from `url` and decoded as `payload`.
    pub fn from_url(url: impl Into<String>, payload: FetchKind, mapper: EntryMapper) -> Self {
        Self {
            data: None,
            url: Some(url.into()),
            payload,
            entries_pointer: None,
            mapper,
        }
    }

    /// Read items from a nested location, e.g. `/items`.
    pub fn entries_at(mut self, pointer: impl Into<String>) -> Self {
        self.entries_pointer = Some(pointer.into());
        self
    }
}

#[async_trait]
impl SourceAdapter for CustomSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Custom
    }

    fn url_for_page(&self, _page: u32) -> Option<String> {
        self.url.clone()
    }

    fn payload_kind(&self) -> FetchKind {
        self.payload
    }

    fn inline_data(&self) -> Option<Value> {
        self.data.clone()
    }

    fn entries_from_data<'a>(&self, data: &'a Value) -> Vec<&'a Value> {
        match &self.entries_pointer {
            Some(pointer) => as_list(data.pointer(pointer)),
            None => as_list(Some(data)),
        }
    }

    async fn clean_entry(&self, raw: &Value, _: &Value, _: &dyn Fetch) -> Result<CleanEntry> {
        (self.mapper)(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Source, SourceOptions};
    use feedport_fetch::StubFetcher;
    use feedport_shared::ContentType;
    use serde_json::json;

    fn mapper() -> EntryMapper {
        Arc::new(|raw: &Value| {
            Ok(CleanEntry {
                id: raw["id"].to_string(),
                title: raw["name"].as_str().unwrap_or_default().to_owned(),
                url: format!("https://example.com/{}/", raw["id"]),
                date: raw["when"].as_str().map(str::to_owned),
                content: raw["body"].as_str().unwrap_or_default().to_owned(),
                content_type: Some(ContentType::Markdown),
                ..CleanEntry::default()
            })
        })
    }

    #[tokio::test]
    async fn inline_data_needs_no_fetch() {
        let data = json!([
            { "id": 1, "name": "One", "when": "2024-01-01", "body": "# One" },
            { "id": 2, "name": "Two", "when": "2024-01-02", "body": "# Two" }
        ]);
        let source = Source::new(
            Box::new(CustomSource::from_data(data, mapper())),
            SourceOptions::default(),
        );
        let entries = source.get_entries(&StubFetcher::new()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].uuid, "feedport::custom::2");
    }

    #[tokio::test]
    async fn fetched_with_entries_pointer() {
        let url = "https://example.com/api.json";
        let fetcher = StubFetcher::new().with_json(
            url,
            &json!({ "items": [{ "id": 3, "name": "Three", "when": "2024-01-03", "body": "x" }] }),
        );
        let source = Source::new(
            Box::new(CustomSource::from_url(url, FetchKind::Json, mapper()).entries_at("/items")),
            SourceOptions::default(),
        );
        let entries = source.get_entries(&fetcher).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Three");
    }
}
