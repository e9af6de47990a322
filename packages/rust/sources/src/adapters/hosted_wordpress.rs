//! WordPress.com hosted sites, via the public v1.1 API. Drafts are not
//! available through this API.

use async_trait::async_trait;
use feedport_fetch::{Fetch, FetchKind};
use feedport_shared::{Author, ContentType, EntryStatus, FeedportError, Result, SourceKind};
use serde_json::{Map, Value, json};
use url::Url;

use crate::value::{as_list, field};
use crate::{CleanEntry, SourceAdapter};

const PER_PAGE: u32 = 100;

#[derive(Debug, Clone)]
pub struct HostedWordPressSource {
    hostname: String,
}

impl HostedWordPressSource {
    /// Whether `url` points at a `*.wordpress.com` site.
    pub fn is_hosted(url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.ends_with(".wordpress.com")))
            .unwrap_or(false)
    }

    pub fn new(url: &str) -> Result<Self> {
        let hostname = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_owned))
            .filter(|h| h.ends_with(".wordpress.com"))
            .ok_or_else(|| {
                FeedportError::validation(format!(
                    "'{url}' is not a .wordpress.com URL; use the wordpress type for self-hosted sites"
                ))
            })?;
        Ok(Self { hostname })
    }
}

fn object_keys(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_object)
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default()
}

#[async_trait]
impl SourceAdapter for HostedWordPressSource {
    fn kind(&self) -> SourceKind {
        SourceKind::HostedWordPress
    }

    fn url_for_page(&self, page: u32) -> Option<String> {
        Some(format!(
            "https://public-api.wordpress.com/rest/v1.1/sites/{}/posts/?page={page}&per_page={PER_PAGE}",
            self.hostname
        ))
    }

    fn paginated(&self) -> bool {
        true
    }

    fn payload_kind(&self) -> FetchKind {
        FetchKind::Json
    }

    fn entries_from_data<'a>(&self, data: &'a Value) -> Vec<&'a Value> {
        as_list(data.get("posts"))
    }

    async fn clean_entry(&self, raw: &Value, _: &Value, _: &dyn Fetch) -> Result<CleanEntry> {
        let url = field(raw, "URL")
            .ok_or_else(|| FeedportError::validation("WordPress.com post has no URL"))?;

        let mut metadata = Map::new();
        metadata.insert("categories".into(), json!(object_keys(raw.get("categories"))));
        metadata.insert("tags".into(), json!(object_keys(raw.get("tags"))));
        if let Some(featured) = field(raw, "featured_image") {
            metadata.insert("featuredImage".into(), Value::String(featured));
        }

        let authors = raw
            .get("author")
            .and_then(|a| {
                Some(Author {
                    name: field(a, "name")?,
                    url: field(a, "profile_URL"),
                    avatar_url: field(a, "avatar_URL"),
                })
            })
            .into_iter()
            .collect();

        Ok(CleanEntry {
            id: field(raw, "guid")
                .or_else(|| field(raw, "ID"))
                .unwrap_or_else(|| url.clone()),
            title: field(raw, "title")
                .map(|t| html_escape::decode_html_entities(&t).into_owned())
                .unwrap_or_default(),
            url,
            authors,
            date: field(raw, "date"),
            date_updated: field(raw, "modified"),
            content: field(raw, "content").unwrap_or_default(),
            content_type: Some(ContentType::Html),
            status: field(raw, "status").map(|s| EntryStatus::from_wordpress(&s)),
            metadata,
            ..CleanEntry::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Source, SourceOptions};
    use feedport_fetch::StubFetcher;

    #[test]
    fn rejects_self_hosted_urls() {
        assert!(HostedWordPressSource::new("https://blog.example.com/").is_err());
        assert!(HostedWordPressSource::is_hosted("https://zach.wordpress.com/"));
    }

    #[tokio::test]
    async fn stops_on_empty_page() {
        let base = "https://public-api.wordpress.com/rest/v1.1/sites/zach.wordpress.com/posts/";
        let fetcher = StubFetcher::new()
            .with_json(
                format!("{base}?page=1&per_page=100"),
                &json!({ "found": 1, "posts": [{
                    "ID": 12,
                    "guid": "https://zach.wordpress.com/?p=12",
                    "URL": "https://zach.wordpress.com/2024/01/01/hello/",
                    "title": "Hello",
                    "content": "<p>Hi</p>",
                    "date": "2024-01-01T10:00:00+00:00",
                    "modified": "2024-01-01T11:00:00+00:00",
                    "status": "publish",
                    "author": { "name": "Zach", "profile_URL": "https://gravatar.com/zach", "avatar_URL": "https://gravatar/z" },
                    "categories": { "Web": {}, "CSS": {} },
                    "tags": {},
                    "featured_image": ""
                }]}),
            )
            .with_json(format!("{base}?page=2&per_page=100"), &json!({ "found": 1, "posts": [] }));

        let source = Source::from_type(
            "wordpressapi-hosted",
            "https://zach.wordpress.com/",
            SourceOptions::default(),
        )
        .unwrap();
        let entries = source.get_entries(&fetcher).await.unwrap();
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.uuid, "feedport::wordpressapi-hosted::https://zach.wordpress.com/?p=12");
        assert_eq!(e.authors[0].avatar_url.as_deref(), Some("https://gravatar/z"));
        let categories = e.metadata["categories"].as_array().unwrap();
        assert_eq!(categories.len(), 2);
        assert!(categories.contains(&json!("Web")));
        assert!(e.metadata.get("featuredImage").is_none());
        assert_eq!(fetcher.calls(&format!("{base}?page=2&per_page=100")), 1);
    }
}
