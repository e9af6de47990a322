//! RSS 2.0 feeds.

use async_trait::async_trait;
use feedport_fetch::Fetch;
use feedport_shared::{Author, ContentType, FeedportError, Result, SourceKind};
use serde_json::Value;

use crate::value::{as_list, field, text};
use crate::{CleanEntry, SourceAdapter};

#[derive(Debug, Clone)]
pub struct RssSource {
    url: String,
}

impl RssSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// `rss.channel.item`, single or repeated.
pub(crate) fn channel_items(data: &Value) -> Vec<&Value> {
    as_list(data.pointer("/rss/channel/item"))
}

/// The channel itself, credited as author when an item names none.
pub(crate) fn channel_author(data: &Value) -> Author {
    let channel = data.pointer("/rss/channel").unwrap_or(&Value::Null);
    Author {
        name: field(channel, "title").unwrap_or_default(),
        url: field(channel, "link"),
        avatar_url: None,
    }
}

#[async_trait]
impl SourceAdapter for RssSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Rss
    }

    fn url_for_page(&self, _page: u32) -> Option<String> {
        Some(self.url.clone())
    }

    fn entries_from_data<'a>(&self, data: &'a Value) -> Vec<&'a Value> {
        channel_items(data)
    }

    async fn clean_entry(&self, raw: &Value, data: &Value, _: &dyn Fetch) -> Result<CleanEntry> {
        let url = field(raw, "link").unwrap_or_default();
        let id = field(raw, "guid")
            .or_else(|| (!url.is_empty()).then(|| url.clone()))
            .ok_or_else(|| FeedportError::validation("RSS item has neither guid nor link"))?;

        // https://www.rssboard.org/rss-profile#namespace-elements-dublin-creator
        let mut authors: Vec<Author> = as_list(raw.get("dc:creator"))
            .into_iter()
            .filter_map(|c| text(Some(c)))
            .map(Author::named)
            .collect();
        if authors.is_empty() {
            authors.push(channel_author(data));
        }

        let content = field(raw, "content:encoded")
            .or_else(|| field(raw, "content"))
            .or_else(|| field(raw, "description"))
            .unwrap_or_default();

        Ok(CleanEntry {
            id,
            title: field(raw, "title").unwrap_or_default(),
            url,
            authors,
            date: field(raw, "pubDate").or_else(|| field(raw, "dc:date")),
            content,
            content_type: Some(ContentType::Html),
            tags: as_list(raw.get("category"))
                .into_iter()
                .filter_map(|c| text(Some(c)))
                .collect(),
            ..CleanEntry::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Source, SourceOptions};
    use feedport_fetch::StubFetcher;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel>
  <title>Zach’s Blog</title>
  <link>https://www.zachleat.com/</link>
  <item>
    <title>First</title>
    <link>https://www.zachleat.com/web/first/</link>
    <guid isPermaLink="false">first-guid</guid>
    <pubDate>Mon, 01 Jan 2024 12:00:00 GMT</pubDate>
    <dc:creator>Zach</dc:creator>
    <dc:creator>Ada</dc:creator>
    <category>web</category>
    <description>short</description>
    <content:encoded><![CDATA[<p>Full <b>content</b></p>]]></content:encoded>
  </item>
  <item>
    <link>https://www.zachleat.com/web/second/</link>
    <pubDate>Tue, 02 Jan 2024 12:00:00 GMT</pubDate>
    <description>&lt;p&gt;Only a description&lt;/p&gt;</description>
  </item>
</channel>
</rss>"#;

    #[tokio::test]
    async fn maps_items() {
        let url = "https://www.zachleat.com/web/feed/";
        let fetcher = StubFetcher::new().with_xml(url, FEED);
        let source = Source::new(Box::new(RssSource::new(url)), SourceOptions::default());
        let entries = source.get_entries(&fetcher).await.unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.uuid, "feedport::rss::first-guid");
        assert_eq!(first.title, "First");
        assert_eq!(first.authors.len(), 2);
        assert_eq!(first.authors[1].name, "Ada");
        assert_eq!(first.content, "<p>Full <b>content</b></p>");
        assert_eq!(first.tags, vec!["web".to_string()]);

        let second = &entries[1];
        assert_eq!(second.uuid, "feedport::rss::https://www.zachleat.com/web/second/");
        assert_eq!(second.title, "January 2, 2024 at 12:00:00 PM UTC");
        assert_eq!(second.authors[0].name, "Zach’s Blog");
        assert_eq!(second.content, "<p>Only a description</p>");
    }

    #[tokio::test]
    async fn single_item_feed() {
        let url = "https://example.com/rss";
        let xml = r#"<rss><channel><title>T</title><item><guid>1</guid><link>https://example.com/1</link><pubDate>2024-01-01T00:00:00Z</pubDate></item></channel></rss>"#;
        let fetcher = StubFetcher::new().with_xml(url, xml);
        let source = Source::new(Box::new(RssSource::new(url)), SourceOptions::default());
        assert_eq!(source.get_entries(&fetcher).await.unwrap().len(), 1);
    }
}
