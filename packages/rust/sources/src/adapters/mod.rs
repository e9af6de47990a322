//! Built-in source adapters, one per supported source type.

mod atom;
mod bluesky;
mod custom;
mod fediverse;
mod hosted_wordpress;
mod rss;
mod wordpress;
mod youtube;

use feedport_shared::SourceKind;

pub use atom::AtomSource;
pub use bluesky::BlueskySource;
pub use custom::{CustomSource, EntryMapper};
pub use fediverse::FediverseSource;
pub use hosted_wordpress::HostedWordPressSource;
pub use rss::RssSource;
pub use wordpress::WordPressSource;
pub use youtube::YouTubeSource;

/// Type-specific default output path (without extension) for an entry URL.
///
/// `None` means the type has no opinion and the URL's own path is used.
pub fn default_file_path(kind: SourceKind, url: &str) -> Option<String> {
    match kind {
        SourceKind::Bluesky => BlueskySource::file_path(url),
        SourceKind::Fediverse => FediverseSource::file_path(url),
        SourceKind::YouTube => YouTubeSource::file_path(url),
        _ => None,
    }
}
