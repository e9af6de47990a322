//! Fediverse (Mastodon-compatible) user timelines, via `/users/<name>.rss`.

use async_trait::async_trait;
use feedport_fetch::Fetch;
use feedport_shared::{ContentType, FeedportError, Result, SourceKind};
use serde_json::Value;
use url::Url;

use super::rss::{channel_author, channel_items};
use crate::value::field;
use crate::{CleanEntry, SourceAdapter};

#[derive(Debug, Clone)]
pub struct FediverseSource {
    username: String,
    hostname: String,
}

impl FediverseSource {
    /// Accepts `@user@host` or `user@host`.
    pub fn new(full_username: &str) -> Result<Self> {
        let trimmed = full_username.strip_prefix('@').unwrap_or(full_username);
        match trimmed.split_once('@') {
            Some((username, hostname)) if !username.is_empty() && !hostname.is_empty() => {
                Ok(Self {
                    username: username.to_owned(),
                    hostname: hostname.to_owned(),
                })
            }
            _ => Err(FeedportError::validation(format!(
                "expected a fediverse handle like @user@host, got '{full_username}'"
            ))),
        }
    }

    /// `https://<host>/@<user>/<postId>` → `<user>@<host>/<postId>`.
    pub fn file_path(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let mut segments = parsed.path_segments()?;
        let user = segments.next()?;
        let user = user.strip_prefix('@').unwrap_or(user);
        let post_id = segments.next()?;
        Some(format!("{user}@{host}/{post_id}"))
    }
}

#[async_trait]
impl SourceAdapter for FediverseSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Fediverse
    }

    fn url_for_page(&self, _page: u32) -> Option<String> {
        Some(format!(
            "https://{}/users/{}.rss",
            self.hostname, self.username
        ))
    }

    fn entries_from_data<'a>(&self, data: &'a Value) -> Vec<&'a Value> {
        channel_items(data)
    }

    async fn clean_entry(&self, raw: &Value, data: &Value, _: &dyn Fetch) -> Result<CleanEntry> {
        let url = field(raw, "link")
            .ok_or_else(|| FeedportError::validation("fediverse post has no link"))?;
        Ok(CleanEntry {
            id: url.clone(),
            url,
            authors: vec![channel_author(data)],
            date: field(raw, "pubDate"),
            content: field(raw, "description").unwrap_or_default(),
            content_type: Some(ContentType::Html),
            ..CleanEntry::default()
        })
    }
}
