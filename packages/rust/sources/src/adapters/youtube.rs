//! YouTube channel uploads, via the public videos feed.

use async_trait::async_trait;
use feedport_fetch::Fetch;
use feedport_shared::{Author, ContentType, FeedportError, Result, SourceKind};
use serde_json::Value;
use url::Url;

use crate::value::{as_list, field, text};
use crate::{CleanEntry, SourceAdapter};

#[derive(Debug, Clone)]
pub struct YouTubeSource {
    channel_id: String,
}

impl YouTubeSource {
    pub fn new(channel_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_owned(),
        }
    }

    /// The `v` query parameter of a watch URL.
    pub fn file_path(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()?
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned())
    }
}

#[async_trait]
impl SourceAdapter for YouTubeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::YouTube
    }

    fn url_for_page(&self, _page: u32) -> Option<String> {
        Some(format!(
            "https://www.youtube.com/feeds/videos.xml?channel_id={}",
            self.channel_id
        ))
    }

    fn entries_from_data<'a>(&self, data: &'a Value) -> Vec<&'a Value> {
        as_list(data.pointer("/feed/entry"))
    }

    async fn clean_entry(&self, raw: &Value, _: &Value, _: &dyn Fetch) -> Result<CleanEntry> {
        let video_id = field(raw, "yt:videoId")
            .ok_or_else(|| FeedportError::validation("YouTube entry has no video id"))?;

        let authors = raw
            .get("author")
            .and_then(|a| {
                Some(Author {
                    name: field(a, "name")?,
                    url: field(a, "uri"),
                    avatar_url: None,
                })
            })
            .into_iter()
            .collect();

        Ok(CleanEntry {
            url: format!("https://www.youtube.com/watch?v={video_id}"),
            id: video_id,
            title: field(raw, "title").unwrap_or_default(),
            authors,
            date: field(raw, "published"),
            date_updated: field(raw, "updated"),
            content: text(raw.pointer("/media:group/media:description")).unwrap_or_default(),
            content_type: Some(ContentType::Text),
            ..CleanEntry::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Source, SourceOptions};
    use feedport_fetch::StubFetcher;

    #[tokio::test]
    async fn maps_videos() {
        let url = "https://www.youtube.com/feeds/videos.xml?channel_id=UC123";
        let xml = r#"<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
<entry>
  <id>yt:video:abc</id>
  <yt:videoId>abc</yt:videoId>
  <title>A talk</title>
  <author><name>Zach</name><uri>https://www.youtube.com/channel/UC123</uri></author>
  <published>2023-11-01T12:00:00+00:00</published>
  <updated>2023-11-02T12:00:00+00:00</updated>
  <media:group><media:title>A talk</media:title><media:description>Slides and notes</media:description></media:group>
</entry>
</feed>"#;
        let fetcher = StubFetcher::new().with_xml(url, xml);
        let source = Source::new(Box::new(YouTubeSource::new("UC123")), SourceOptions::default());
        let entries = source.get_entries(&fetcher).await.unwrap();
        assert_eq!(entries.len(), 1);
        let video = &entries[0];
        assert_eq!(video.uuid, "feedport::youtube::abc");
        assert_eq!(video.url, "https://www.youtube.com/watch?v=abc");
        assert_eq!(video.content, "Slides and notes");
        assert_eq!(video.authors[0].name, "Zach");
    }
}
