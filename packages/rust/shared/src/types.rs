//! Core domain types: the canonical entry every source is normalized into.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FeedportError;

/// Namespace prefix for entry identifiers (`feedport::<type>::<id>`).
pub const UUID_NAMESPACE: &str = "feedport";

// ---------------------------------------------------------------------------
// SourceKind
// ---------------------------------------------------------------------------

/// The source type an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "atom")]
    Atom,
    #[serde(rename = "rss")]
    Rss,
    #[serde(rename = "wordpress")]
    WordPress,
    #[serde(rename = "wordpressapi-hosted")]
    HostedWordPress,
    #[serde(rename = "fediverse")]
    Fediverse,
    #[serde(rename = "bluesky")]
    Bluesky,
    #[serde(rename = "youtube")]
    YouTube,
    #[serde(rename = "custom")]
    Custom,
}

impl SourceKind {
    /// Machine tag used in identifiers and front matter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Atom => "atom",
            Self::Rss => "rss",
            Self::WordPress => "wordpress",
            Self::HostedWordPress => "wordpressapi-hosted",
            Self::Fediverse => "fediverse",
            Self::Bluesky => "bluesky",
            Self::YouTube => "youtube",
            Self::Custom => "custom",
        }
    }

    /// Human-readable label used in run summaries.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Atom => "Atom",
            Self::Rss => "RSS",
            Self::WordPress => "WordPress",
            Self::HostedWordPress => "WordPress.com",
            Self::Fediverse => "Fediverse",
            Self::Bluesky => "Bluesky",
            Self::YouTube => "YouTube",
            Self::Custom => "Custom",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the namespaced identifier for an entry: `feedport::<type>::<id>`.
pub fn entry_uuid(kind: SourceKind, id: &str) -> String {
    format!("{UUID_NAMESPACE}::{}::{id}", kind.as_str())
}

// ---------------------------------------------------------------------------
// Small enums
// ---------------------------------------------------------------------------

/// Format of an entry's `content` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Html,
    Markdown,
    Text,
}

/// Publication status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Draft,
    Publish,
}

impl EntryStatus {
    /// Map a WordPress post status onto the two states feedport knows.
    /// Anything not publicly published is treated as a draft.
    pub fn from_wordpress(status: &str) -> Self {
        match status {
            "publish" => Self::Publish,
            _ => Self::Draft,
        }
    }
}

/// Target document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Html,
}

impl OutputFormat {
    /// File extension, including the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Markdown => ".md",
            Self::Html => ".html",
        }
    }

    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Markdown => ContentType::Markdown,
            Self::Html => ContentType::Html,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = FeedportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" | "md" => Ok(Self::Markdown),
            "html" => Ok(Self::Html),
            other => Err(FeedportError::config(format!(
                "unknown output format '{other}' (expected markdown or html)"
            ))),
        }
    }
}

/// How rewritten asset references are written into documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetRefMode {
    /// Relative to the referring document's directory.
    #[default]
    Relative,
    /// Root-relative path under the output folder.
    Absolute,
    /// Stored beside the referring document.
    Colocate,
}

impl FromStr for AssetRefMode {
    type Err = FeedportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relative" => Ok(Self::Relative),
            "absolute" => Ok(Self::Absolute),
            "colocate" => Ok(Self::Colocate),
            other => Err(FeedportError::config(format!(
                "unknown asset reference mode '{other}' (expected relative, absolute or colocate)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Author
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl Author {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
            avatar_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// SourceOrigin
// ---------------------------------------------------------------------------

/// Optional per-source path formatter: `(url, default_path) -> path`.
/// Returning `None` tells the importer to skip the entry.
pub type FilePathFormatter = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

/// Back-reference from an entry to the source that produced it.
pub struct SourceOrigin {
    pub kind: SourceKind,
    pub label: Option<String>,
    pub filepath_format: Option<FilePathFormatter>,
}

impl fmt::Debug for SourceOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceOrigin")
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("filepath_format", &self.filepath_format.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// The canonical post record. Every source adapter produces these.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// `feedport::<type>::<source-specific id>`.
    pub uuid: String,
    #[serde(rename = "type")]
    pub kind: SourceKind,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<Author>,
    pub date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_updated: Option<DateTime<Utc>>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Output location, computed by the importer before transformation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_label: Option<String>,
    #[serde(skip)]
    pub origin: Option<Arc<SourceOrigin>>,
}

impl Entry {
    pub fn is_draft(&self) -> bool {
        self.status == Some(EntryStatus::Draft)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_entry() -> Entry {
        Entry {
            uuid: entry_uuid(SourceKind::Rss, "https://example.com/a/"),
            kind: SourceKind::Rss,
            title: "Hello".into(),
            url: "https://example.com/a/".into(),
            authors: vec![Author::named("Zach")],
            date: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            date_updated: None,
            content: "<p>Hi</p>".into(),
            content_type: Some(ContentType::Html),
            status: None,
            tags: vec![],
            metadata: serde_json::Map::new(),
            file_path: None,
            source_label: None,
            origin: None,
        }
    }

    #[test]
    fn uuid_is_namespaced() {
        assert_eq!(
            entry_uuid(SourceKind::YouTube, "abc123"),
            "feedport::youtube::abc123"
        );
    }

    #[test]
    fn entry_serializes_camel_case_and_skips_empty() {
        let json = serde_json::to_value(sample_entry()).expect("serialize");
        assert_eq!(json["type"], "rss");
        assert_eq!(json["contentType"], "html");
        assert_eq!(json["authors"][0]["name"], "Zach");
        assert_eq!(json["date"], "2024-01-02T03:04:05Z");
        assert!(json.get("tags").is_none());
        assert!(json.get("dateUpdated").is_none());
        assert!(json.get("origin").is_none());
    }

    #[test]
    fn parses_cli_enums() {
        assert_eq!("html".parse::<OutputFormat>().unwrap(), OutputFormat::Html);
        assert_eq!(
            "colocate".parse::<AssetRefMode>().unwrap(),
            AssetRefMode::Colocate
        );
        assert!("pdf".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Markdown.extension(), ".md");
    }

    #[test]
    fn wordpress_status_mapping() {
        assert_eq!(EntryStatus::from_wordpress("publish"), EntryStatus::Publish);
        assert_eq!(EntryStatus::from_wordpress("future"), EntryStatus::Draft);
        assert_eq!(EntryStatus::from_wordpress("draft"), EntryStatus::Draft);
    }
}
