//! Output path computation.
//!
//! Pure: the path depends only on the entry URL, status and source type,
//! the source's optional formatter, and the import configuration.

use std::path::{Component, Path, PathBuf};

use feedport_assets::normalize_path;
use feedport_shared::{Entry, OutputFormat, short_hash};
use feedport_sources::default_file_path;
use url::Url;

#[derive(Debug, Clone)]
pub struct PathPolicy {
    pub output_folder: PathBuf,
    pub drafts_folder: String,
    pub format: OutputFormat,
    /// Give each document its own directory (`<stem>/index.<ext>`).
    pub colocate: bool,
}

impl PathPolicy {
    /// Where `entry` is written, or `None` when its source's formatter
    /// declines it.
    pub fn file_path(&self, entry: &Entry) -> Option<PathBuf> {
        let default_path = default_file_path(entry.kind, &entry.url)
            .unwrap_or_else(|| url_path(&entry.url));

        let mut base = self.output_folder.clone();
        if entry.is_draft() && !self.drafts_folder.is_empty() {
            base.push(&self.drafts_folder);
        }

        let formatter = entry
            .origin
            .as_ref()
            .and_then(|origin| origin.filepath_format.as_ref());
        if let Some(formatter) = formatter {
            // Custom paths are taken as given, extension included.
            let custom = formatter(&entry.url, &default_path)?;
            return Some(normalize_path(&base.join(contained(&custom))));
        }

        let trimmed = default_path.trim_matches('/');
        let stem = if trimmed.is_empty() {
            short_hash(&entry.url)
        } else {
            trimmed.to_owned()
        };
        let stem = contained(&stem);
        let extension = self.format.extension();

        let path = if self.colocate {
            base.join(stem).join(format!("index{extension}"))
        } else {
            let mut file = base.join(stem).into_os_string();
            file.push(extension);
            PathBuf::from(file)
        };
        Some(normalize_path(&path))
    }
}

/// The URL's path, or `/` when it has none (or does not parse).
fn url_path(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_owned())
        .unwrap_or_else(|_| "/".to_owned())
}

/// A relative path with no root and no `..`, so joining it can never
/// escape the output folder.
fn contained(path: &str) -> PathBuf {
    Path::new(path)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}
