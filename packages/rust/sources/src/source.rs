//! The fetch + pagination loop shared by all adapters.

use std::sync::Arc;

use feedport_fetch::{Fetch, FetchOptions};
use feedport_shared::{
    Entry, FeedportError, FilePathFormatter, Result, SourceKind, SourceOrigin, entry_uuid,
};
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{
    AtomSource, BlueskySource, FediverseSource, HostedWordPressSource, RssSource,
    WordPressSource, YouTubeSource,
};
use crate::date::{parse_date, readable_date};
use crate::{CleanEntry, SourceAdapter};

/// Upper bound on pages walked for one source.
const MAX_PAGES: u32 = 1000;

/// Per-source options supplied when the source is registered.
#[derive(Clone, Default)]
pub struct SourceOptions {
    /// Copied onto each entry as `sourceLabel`.
    pub label: Option<String>,
    pub filepath_format: Option<FilePathFormatter>,
    /// WordPress credentials; enables draft import.
    pub credentials: Option<feedport_fetch::BasicAuth>,
}

/// A configured source: one adapter plus its options.
pub struct Source {
    adapter: Box<dyn SourceAdapter>,
    origin: Arc<SourceOrigin>,
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source").field("origin", &self.origin).finish()
    }
}

impl Source {
    pub fn new(adapter: Box<dyn SourceAdapter>, opts: SourceOptions) -> Self {
        let origin = Arc::new(SourceOrigin {
            kind: adapter.kind(),
            label: opts.label,
            filepath_format: opts.filepath_format,
        });
        Self { adapter, origin }
    }

    /// Build a source from a CLI type name and its target
    /// (URL, username or channel id).
    pub fn from_type(type_name: &str, target: &str, opts: SourceOptions) -> Result<Self> {
        let adapter: Box<dyn SourceAdapter> = match type_name {
            "atom" => Box::new(AtomSource::new(target)),
            "rss" => Box::new(RssSource::new(target)),
            "wordpress" => {
                if HostedWordPressSource::is_hosted(target) {
                    Box::new(HostedWordPressSource::new(target)?)
                } else {
                    Box::new(WordPressSource::new(target, opts.credentials.clone())?)
                }
            }
            "wordpressapi-hosted" => Box::new(HostedWordPressSource::new(target)?),
            "fediverse" => Box::new(FediverseSource::new(target)?),
            "bluesky" => Box::new(BlueskySource::new(target)),
            "youtube" | "youtubeuser" => Box::new(YouTubeSource::new(target)),
            other => return Err(FeedportError::UnsupportedSource(other.to_owned())),
        };
        Ok(Self::new(adapter, opts))
    }

    pub fn kind(&self) -> SourceKind {
        self.origin.kind
    }

    pub fn origin(&self) -> &Arc<SourceOrigin> {
        &self.origin
    }

    /// How the source is named in logs and run summaries: its label, else
    /// its first URL, else its type.
    pub fn label(&self) -> String {
        self.origin
            .label
            .clone()
            .or_else(|| self.adapter.url_for_page(1))
            .unwrap_or_else(|| self.kind().display_name().to_owned())
    }

    /// Fetch (all pages of) this source and return normalized entries.
    #[instrument(skip_all, fields(source = %self.kind()))]
    pub async fn get_entries(&self, fetcher: &dyn Fetch) -> Result<Vec<Entry>> {
        if let Some(data) = self.adapter.inline_data() {
            return Ok(self.clean_all(&data, fetcher).await);
        }

        if !self.adapter.paginated() {
            let url = self.adapter.url_for_page(1).ok_or_else(|| {
                FeedportError::validation(format!("{} source has no URL", self.kind()))
            })?;
            let data = self.fetch_data(&url, fetcher, true).await?;
            let entries = self.clean_all(&data, fetcher).await;
            info!(count = entries.len(), %url, "source fetched");
            return Ok(entries);
        }

        let mut entries = Vec::new();
        let mut page = 1;
        while let Some(url) = self.adapter.url_for_page(page) {
            if page > MAX_PAGES {
                warn!(page, "page limit reached, stopping");
                break;
            }
            match self.fetch_data(&url, fetcher, false).await {
                Ok(data) => {
                    let found = self.clean_all(&data, fetcher).await;
                    debug!(page, count = found.len(), "page fetched");
                    if found.is_empty() {
                        break;
                    }
                    entries.extend(found);
                    page += 1;
                }
                Err(e) => {
                    if self.adapter.is_error_worth_worrying_about(&e).await {
                        error!(page, error = %e, "source failed");
                        return Err(e);
                    }
                    debug!(page, error = %e, "pagination ended");
                    break;
                }
            }
        }

        info!(count = entries.len(), pages = page, "source fetched");
        Ok(entries)
    }

    async fn fetch_data(&self, url: &str, fetcher: &dyn Fetch, show_errors: bool) -> Result<Value> {
        let mut opts = FetchOptions::new(self.adapter.payload_kind())
            .with_basic_auth(self.adapter.basic_auth());
        opts.show_errors = show_errors;
        fetcher.fetch(url, &opts).await?.into_value(url)
    }

    /// Map every raw item of a payload. A failing item is skipped.
    async fn clean_all(&self, data: &Value, fetcher: &dyn Fetch) -> Vec<Entry> {
        let raws = self.adapter.entries_from_data(data);
        let cleaned = join_all(
            raws.iter()
                .map(|raw| self.adapter.clean_entry(raw, data, fetcher)),
        )
        .await;

        cleaned
            .into_iter()
            .filter_map(|result| match result.and_then(|c| self.to_entry(c)) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(error = %e, "skipping malformed entry");
                    None
                }
            })
            .collect()
    }

    fn to_entry(&self, clean: CleanEntry) -> Result<Entry> {
        let raw_date = clean.date.as_deref().unwrap_or_default();
        let date = parse_date(raw_date).ok_or_else(|| {
            FeedportError::validation(format!(
                "entry {} has an unreadable date '{raw_date}'",
                clean.url
            ))
        })?;
        let date_updated = clean.date_updated.as_deref().and_then(parse_date);

        let title = if clean.title.trim().is_empty() {
            readable_date(&date)
        } else {
            clean.title
        };

        Ok(Entry {
            uuid: entry_uuid(self.kind(), &clean.id),
            kind: self.kind(),
            title,
            url: clean.url,
            authors: clean.authors,
            date,
            date_updated,
            content: clean.content,
            content_type: clean.content_type,
            status: clean.status,
            tags: clean.tags,
            metadata: clean.metadata,
            file_path: None,
            source_label: self.origin.label.clone(),
            origin: Some(Arc::clone(&self.origin)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedport_fetch::StubFetcher;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Blog</title><link>https://example.com/</link>
<item><title>Good</title><link>https://example.com/good/</link><guid>g1</guid><pubDate>Tue, 05 Mar 2024 16:07:09 GMT</pubDate><description>ok</description></item>
<item><title>Bad date</title><link>https://example.com/bad/</link><guid>g2</guid><pubDate>someday</pubDate></item>
</channel></rss>"#;

    #[tokio::test]
    async fn unsupported_type_is_rejected() {
        let err = Source::from_type("gopher", "x", SourceOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "gopher is not a supported type");
    }

    #[tokio::test]
    async fn malformed_entry_is_skipped_and_label_applied() {
        let url = "https://example.com/feed.xml";
        let fetcher = StubFetcher::new().with_xml(url, RSS);
        let source = Source::from_type(
            "rss",
            url,
            SourceOptions {
                label: Some("my blog".into()),
                ..SourceOptions::default()
            },
        )
        .unwrap();

        let entries = source.get_entries(&fetcher).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].uuid, "feedport::rss::g1");
        assert_eq!(entries[0].source_label.as_deref(), Some("my blog"));
        assert!(entries[0].origin.is_some());
    }

    #[tokio::test]
    async fn single_url_failure_fails_the_source() {
        let fetcher = StubFetcher::new();
        let source =
            Source::from_type("atom", "https://example.com/feed.atom", SourceOptions::default())
                .unwrap();
        assert!(source.get_entries(&fetcher).await.is_err());
    }

    #[tokio::test]
    async fn wordpress_com_targets_use_the_hosted_api() {
        let source = Source::from_type(
            "wordpress",
            "https://example.wordpress.com/",
            SourceOptions::default(),
        )
        .unwrap();
        assert_eq!(source.kind(), SourceKind::HostedWordPress);
    }
}
