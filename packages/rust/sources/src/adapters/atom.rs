//! Atom feeds.

use async_trait::async_trait;
use feedport_fetch::Fetch;
use feedport_shared::{Author, ContentType, FeedportError, Result, SourceKind};
use serde_json::Value;

use crate::value::{as_list, attr, field, is_http_url, text};
use crate::{CleanEntry, SourceAdapter};

#[derive(Debug, Clone)]
pub struct AtomSource {
    url: String,
}

impl AtomSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// The entry's permalink: `id` when it is a URL, else the alternate link.
fn entry_url(raw: &Value, id: &str) -> String {
    if is_http_url(id) {
        return id.to_owned();
    }
    as_list(raw.get("link"))
        .into_iter()
        .filter(|link| matches!(attr(link, "rel"), None | Some("alternate")))
        .filter_map(|link| attr(link, "href"))
        .find(|href| is_http_url(href))
        .map(str::to_owned)
        .unwrap_or_else(|| id.to_owned())
}

fn authors_of(node: Option<&Value>) -> Vec<Author> {
    as_list(node)
        .into_iter()
        .filter_map(|author| match author {
            Value::Object(_) => Some(Author {
                name: field(author, "name")?,
                url: field(author, "uri"),
                avatar_url: None,
            }),
            other => text(Some(other)).map(Author::named),
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for AtomSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Atom
    }

    fn url_for_page(&self, _page: u32) -> Option<String> {
        Some(self.url.clone())
    }

    fn entries_from_data<'a>(&self, data: &'a Value) -> Vec<&'a Value> {
        as_list(data.pointer("/feed/entry"))
    }

    async fn clean_entry(&self, raw: &Value, data: &Value, _: &dyn Fetch) -> Result<CleanEntry> {
        let id = field(raw, "id").ok_or_else(|| FeedportError::validation("Atom entry has no id"))?;

        let mut authors = authors_of(raw.get("author"));
        if authors.is_empty() {
            authors = authors_of(data.pointer("/feed/author"));
        }

        let (content_node, content) = match field(raw, "content") {
            Some(c) => (raw.get("content"), c),
            None => (raw.get("summary"), field(raw, "summary").unwrap_or_default()),
        };
        // RFC 4287: text unless stated otherwise.
        let content_type = match content_node.and_then(|n| attr(n, "type")) {
            Some("html") | Some("xhtml") => ContentType::Html,
            _ => ContentType::Text,
        };

        Ok(CleanEntry {
            url: entry_url(raw, &id),
            id,
            title: field(raw, "title").unwrap_or_default(),
            authors,
            date: field(raw, "published").or_else(|| field(raw, "updated")),
            date_updated: field(raw, "updated"),
            content,
            content_type: Some(content_type),
            ..CleanEntry::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Source, SourceOptions};
    use feedport_fetch::StubFetcher;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example</title>
  <author><name>Feed Author</name></author>
  <entry>
    <title>Tagged</title>
    <id>tag:example.com,2024:post-1</id>
    <link rel="self" href="https://example.com/feed/1.xml"/>
    <link rel="alternate" href="https://example.com/posts/one/"/>
    <published>2024-02-01T10:00:00Z</published>
    <updated>2024-02-03T10:00:00Z</updated>
    <content type="html">&lt;p&gt;One&lt;/p&gt;</content>
  </entry>
  <entry>
    <title>URL id</title>
    <id>https://example.com/posts/two/</id>
    <author><name>Ada</name><uri>https://ada.example</uri></author>
    <updated>2024-02-05T10:00:00Z</updated>
    <summary>Plain summary</summary>
  </entry>
</feed>"#;

    #[tokio::test]
    async fn maps_entries() {
        let url = "https://example.com/feed.xml";
        let fetcher = StubFetcher::new().with_xml(url, FEED);
        let source = Source::new(Box::new(AtomSource::new(url)), SourceOptions::default());
        let entries = source.get_entries(&fetcher).await.unwrap();
        assert_eq!(entries.len(), 2);

        let one = &entries[0];
        assert_eq!(one.uuid, "feedport::atom::tag:example.com,2024:post-1");
        assert_eq!(one.url, "https://example.com/posts/one/");
        assert_eq!(one.authors[0].name, "Feed Author");
        assert_eq!(one.content, "<p>One</p>");
        assert_eq!(one.content_type, Some(ContentType::Html));
        assert!(one.date_updated.is_some());

        let two = &entries[1];
        assert_eq!(two.url, "https://example.com/posts/two/");
        assert_eq!(two.authors[0].url.as_deref(), Some("https://ada.example"));
        assert_eq!(two.content, "Plain summary");
        assert_eq!(two.content_type, Some(ContentType::Text));
        assert_eq!(two.date, two.date_updated.unwrap());
    }
}
