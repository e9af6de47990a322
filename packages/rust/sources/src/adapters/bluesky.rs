//! Bluesky user timelines, via the profile RSS feed.

use async_trait::async_trait;
use feedport_fetch::Fetch;
use feedport_shared::{ContentType, FeedportError, Result, SourceKind};
use serde_json::Value;
use url::Url;

use super::rss::{channel_author, channel_items};
use crate::value::field;
use crate::{CleanEntry, SourceAdapter};

#[derive(Debug, Clone)]
pub struct BlueskySource {
    username: String,
}

impl BlueskySource {
    pub fn new(username: &str) -> Self {
        Self {
            username: username.strip_prefix('@').unwrap_or(username).to_owned(),
        }
    }

    /// `https://bsky.app/profile/<user>/post/<id>` → `<user>/<id>`.
    pub fn file_path(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let segments: Vec<&str> = parsed.path_segments()?.collect();
        match segments.as_slice() {
            ["profile", user, "post", id, ..] => Some(format!("{user}/{id}")),
            _ => None,
        }
    }
}

#[async_trait]
impl SourceAdapter for BlueskySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Bluesky
    }

    fn url_for_page(&self, _page: u32) -> Option<String> {
        Some(format!("https://bsky.app/profile/{}/rss", self.username))
    }

    fn entries_from_data<'a>(&self, data: &'a Value) -> Vec<&'a Value> {
        channel_items(data)
    }

    async fn clean_entry(&self, raw: &Value, data: &Value, _: &dyn Fetch) -> Result<CleanEntry> {
        let url = field(raw, "link")
            .ok_or_else(|| FeedportError::validation("Bluesky post has no link"))?;
        Ok(CleanEntry {
            id: url.clone(),
            url,
            authors: vec![channel_author(data)],
            date: field(raw, "pubDate"),
            content: field(raw, "description").unwrap_or_default(),
            content_type: Some(ContentType::Text),
            ..CleanEntry::default()
        })
    }
}
