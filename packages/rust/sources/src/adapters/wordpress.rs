//! Self-hosted WordPress, via the REST API (`/wp-json/wp/v2/`).

use async_trait::async_trait;
use feedport_fetch::{BasicAuth, Fetch, FetchKind, FetchOptions};
use feedport_shared::{Author, ContentType, EntryStatus, FeedportError, Result, SourceKind};
use futures_util::future::join_all;
use serde_json::{Map, Value, json};
use tracing::debug;
use url::Url;

use crate::value::{as_list, field, text};
use crate::{CleanEntry, SourceAdapter};

/// Categories WordPress assigns by default; never exported.
const IGNORED_CATEGORIES: &[&str] = &["Uncategorized"];

/// API error code meaning "page out of range".
const INVALID_PAGE_CODE: &str = "rest_post_invalid_page_number";

const PER_PAGE: u32 = 100;

#[derive(Debug, Clone)]
pub struct WordPressSource {
    base: Url,
    credentials: Option<BasicAuth>,
}

impl WordPressSource {
    /// `url` is the site root. Credentials enable draft import.
    pub fn new(url: &str, credentials: Option<BasicAuth>) -> Result<Self> {
        let mut base = Url::parse(url)
            .map_err(|e| FeedportError::validation(format!("invalid WordPress URL '{url}': {e}")))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        Ok(Self { base, credentials })
    }

    fn api_url(&self, subtype: &str, suffix: &str) -> String {
        self.base
            .join(&format!("wp-json/wp/v2/{subtype}/{suffix}"))
            .map(String::from)
            .unwrap_or_else(|_| format!("{}wp-json/wp/v2/{subtype}/{suffix}", self.base))
    }

    async fn get_json(&self, fetcher: &dyn Fetch, url: &str) -> Result<Value> {
        let opts = FetchOptions::new(FetchKind::Json).with_basic_auth(self.credentials.clone());
        fetcher.fetch(url, &opts).await?.into_value(url)
    }

    /// Stock WordPress is single-author. A failed lookup yields no authors.
    async fn authors(&self, fetcher: &dyn Fetch, author_id: Option<&Value>) -> Vec<Author> {
        let Some(id) = author_id.and_then(|v| text(Some(v))) else {
            return Vec::new();
        };
        let data = match self.get_json(fetcher, &self.api_url("users", &id)).await {
            Ok(data) => data,
            Err(e) => {
                debug!(author = %id, error = %e, "author lookup failed");
                return Vec::new();
            }
        };

        // Largest avatar size wins.
        let avatar_url = data
            .get("avatar_urls")
            .and_then(Value::as_object)
            .and_then(|sizes| {
                sizes
                    .iter()
                    .max_by_key(|(size, _)| size.parse::<u32>().unwrap_or(0))
                    .and_then(|(_, url)| url.as_str().map(str::to_owned))
            });

        match field(&data, "name") {
            Some(name) => vec![Author {
                name,
                url: field(&data, "url").or_else(|| field(&data, "link")),
                avatar_url,
            }],
            None => Vec::new(),
        }
    }

    /// Resolve taxonomy term ids to names. Failed lookups are dropped.
    async fn term_names(&self, fetcher: &dyn Fetch, subtype: &str, ids: Option<&Value>) -> Vec<String> {
        let urls: Vec<String> = as_list(ids)
            .into_iter()
            .filter_map(|v| text(Some(v)))
            .map(|id| self.api_url(subtype, &id))
            .collect();

        join_all(urls.iter().map(|url| self.get_json(fetcher, url)))
            .await
            .into_iter()
            .filter_map(|result| result.ok().and_then(|data| field(&data, "name")))
            .collect()
    }
}

fn decode_entities(s: &str) -> String {
    html_escape::decode_html_entities(s).into_owned()
}

#[async_trait]
impl SourceAdapter for WordPressSource {
    fn kind(&self) -> SourceKind {
        SourceKind::WordPress
    }

    fn url_for_page(&self, page: u32) -> Option<String> {
        let mut query = format!("?page={page}&per_page={PER_PAGE}");
        // Drafts are only visible to authenticated requests.
        if self.credentials.is_some() {
            query.push_str("&status=publish%2Cdraft");
        }
        Some(self.api_url("posts", &query))
    }

    fn paginated(&self) -> bool {
        true
    }

    fn payload_kind(&self) -> FetchKind {
        FetchKind::Json
    }

    fn basic_auth(&self) -> Option<BasicAuth> {
        self.credentials.clone()
    }

    fn entries_from_data<'a>(&self, data: &'a Value) -> Vec<&'a Value> {
        match data {
            Value::Array(items) => items.iter().collect(),
            _ => Vec::new(),
        }
    }

    async fn clean_entry(&self, raw: &Value, _: &Value, fetcher: &dyn Fetch) -> Result<CleanEntry> {
        let url = field(raw, "link")
            .ok_or_else(|| FeedportError::validation("WordPress post has no link"))?;
        let id = text(raw.pointer("/guid/rendered"))
            .or_else(|| field(raw, "id"))
            .unwrap_or_else(|| url.clone());

        let (authors, categories, tags) = futures_util::join!(
            self.authors(fetcher, raw.get("author")),
            self.term_names(fetcher, "categories", raw.get("categories")),
            self.term_names(fetcher, "tags", raw.get("tags")),
        );
        let categories: Vec<String> = categories
            .into_iter()
            .filter(|name| !IGNORED_CATEGORIES.contains(&name.as_str()))
            .collect();

        let mut metadata = Map::new();
        if let Some(featured) = field(raw, "jetpack_featured_media_url") {
            metadata.insert("featuredImage".into(), Value::String(featured));
        }
        if !categories.is_empty() {
            metadata.insert("categories".into(), json!(categories));
        }
        if !tags.is_empty() {
            metadata.insert("tags".into(), json!(tags));
        }
        if let Some(og) = raw.get("og_image").filter(|v| v.is_object()) {
            metadata.insert(
                "opengraphImage".into(),
                json!({
                    "width": og.get("width"),
                    "height": og.get("height"),
                    "src": og.get("url"),
                    "mime": og.get("type"),
                }),
            );
        }

        Ok(CleanEntry {
            id,
            title: text(raw.pointer("/title/rendered"))
                .map(|t| decode_entities(&t))
                .unwrap_or_default(),
            url,
            authors,
            date: field(raw, "date_gmt"),
            date_updated: field(raw, "modified_gmt"),
            content: text(raw.pointer("/content/rendered")).unwrap_or_default(),
            content_type: Some(ContentType::Html),
            status: field(raw, "status").map(|s| EntryStatus::from_wordpress(&s)),
            // WordPress categories become entry tags.
            tags: categories,
            metadata,
        })
    }

    async fn is_error_worth_worrying_about(&self, err: &FeedportError) -> bool {
        err.api_error_code().as_deref() != Some(INVALID_PAGE_CODE)
    }
}
