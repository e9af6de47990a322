//! Deterministic asset naming and reference forms.
//!
//! A local filename depends only on the remote URL (plus a content-type
//! fallback for the extension), so the same URL always lands in the same
//! place and resolution never needs a network round-trip when the URL
//! carries its own extension.

use std::path::{Component, Path, PathBuf};

use feedport_shared::{AssetRefMode, FeedportError, Result, short_hash};
use url::Url;

/// Longest basename (in chars) kept from the remote URL.
pub const MAX_URL_FILENAME_LENGTH: usize = 30;

/// Longest extension kept, so names stay well under 255 bytes.
const MAX_EXTENSION_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Filenames
// ---------------------------------------------------------------------------

fn sanitize(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Split the last non-empty path segment into a sanitized stem and a
/// lowercased extension.
fn url_basename(url: &Url) -> (String, Option<String>) {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .unwrap_or("");

    match last.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LENGTH
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (sanitize(stem), Some(ext.to_ascii_lowercase()))
        }
        _ => (sanitize(last), None),
    }
}

/// File extension (without dot) for a declared content type.
///
/// Simple subtypes are used directly (`image/webp` → `webp`,
/// `image/svg+xml` → `svg`); anything else goes through `mime_guess`.
pub fn extension_from_content_type(content_type: &str) -> Option<String> {
    let essence = content_type.split(';').next()?.trim().to_ascii_lowercase();
    let (_, subtype) = essence.split_once('/')?;
    let subtype = subtype.split('+').next().unwrap_or(subtype);
    if !subtype.is_empty()
        && subtype.len() <= MAX_EXTENSION_LENGTH
        && subtype.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Some(subtype.to_owned());
    }
    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first())
        .map(|ext| (*ext).to_owned())
}

/// Whether the URL's own path carries a usable extension.
pub fn has_url_extension(remote_url: &str) -> bool {
    Url::parse(remote_url)
        .map(|u| url_basename(&u).1.is_some())
        .unwrap_or(false)
}

/// Local filename for a remote asset: `<basename ≤30>-<hash>.<ext>`.
pub fn asset_filename(remote_url: &str, content_type: Option<&str>) -> Result<String> {
    let url = Url::parse(remote_url)
        .map_err(|e| FeedportError::validation(format!("invalid asset URL '{remote_url}': {e}")))?;

    let (stem, ext) = url_basename(&url);
    let stem: String = stem.chars().take(MAX_URL_FILENAME_LENGTH).collect();
    let hash = short_hash(remote_url);
    let ext = ext.or_else(|| content_type.and_then(extension_from_content_type));

    let base = if stem.is_empty() {
        hash
    } else {
        format!("{stem}-{hash}")
    };
    Ok(match ext {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    })
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Lexically normalize a path: drop `.`, fold `..` where possible.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(out.components().next_back(), Some(Component::Normal(_)))
                    && out.pop();
                if !popped {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `/`-separated reference from `from_dir` to `to`.
pub fn relative_reference(from_dir: &Path, to: &Path) -> String {
    let from = normalize_path(from_dir);
    let to = normalize_path(to);
    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = std::iter::repeat_n("..".to_owned(), from_parts.len() - common)
        .collect();
    parts.extend(
        to_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

fn document_dir(document_path: &Path) -> PathBuf {
    document_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// Map a reference found in a document back to the local file it names.
///
/// Remote (`scheme://`, protocol-relative) and `data:` references have no
/// local file. Root-relative references resolve against `output_folder`,
/// everything else against the document's directory.
pub fn reference_to_local_path(
    reference: &str,
    document_path: &Path,
    output_folder: &Path,
) -> Option<PathBuf> {
    let reference = reference.trim();
    if reference.is_empty()
        || reference.contains("://")
        || reference.starts_with("//")
        || reference.starts_with("data:")
        || reference.starts_with('#')
    {
        return None;
    }
    let reference = reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference);

    let path = match reference.strip_prefix('/') {
        Some(rooted) => output_folder.join(rooted),
        None => document_dir(document_path).join(reference),
    };
    Some(normalize_path(&path))
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Where assets live and how documents refer to them.
#[derive(Debug, Clone)]
pub struct AssetLayout {
    pub output_folder: PathBuf,
    pub assets_folder: String,
    pub mode: AssetRefMode,
}

impl AssetLayout {
    /// Directory an asset referenced by `document_path` is stored in.
    pub fn asset_dir(&self, document_path: Option<&Path>) -> PathBuf {
        match (self.mode, document_path) {
            (AssetRefMode::Colocate, Some(doc)) => normalize_path(&document_dir(doc)),
            _ => normalize_path(&self.output_folder.join(&self.assets_folder)),
        }
    }

    /// Reference string a document should use for `local_path`.
    pub fn reference(&self, local_path: &Path, document_path: Option<&Path>) -> String {
        match (self.mode, document_path) {
            (AssetRefMode::Colocate, Some(_)) => local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            (AssetRefMode::Relative, Some(doc)) => {
                relative_reference(&document_dir(doc), local_path)
            }
            _ => {
                let root = normalize_path(&self.output_folder);
                let local = normalize_path(local_path);
                let rel = local.strip_prefix(&root).unwrap_or(&local);
                format!("/{}", relative_reference(Path::new(""), rel))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedport_shared::SHORT_HASH_LENGTH;

    #[test]
    fn filename_keeps_basename_hash_and_extension() {
        let url = "https://example.com/wp-content/uploads/photo.JPG?w=300";
        let name = asset_filename(url, None).unwrap();
        let hash = short_hash(url);
        assert_eq!(name, format!("photo-{hash}.jpg"));
    }

    #[test]
    fn long_basenames_are_truncated() {
        let url = format!("https://example.com/{}.png", "a".repeat(80));
        let name = asset_filename(&url, None).unwrap();
        assert_eq!(
            name.len(),
            MAX_URL_FILENAME_LENGTH + 1 + SHORT_HASH_LENGTH + ".png".len()
        );
        assert!(name.len() < 255);
    }

    #[test]
    fn extension_falls_back_to_content_type() {
        let url = "https://cdn.example.com/image/upload/abc";
        assert!(!has_url_extension(url));
        let name = asset_filename(url, Some("image/webp")).unwrap();
        assert!(name.starts_with("abc-"));
        assert!(name.ends_with(".webp"));

        assert_eq!(extension_from_content_type("image/svg+xml").as_deref(), Some("svg"));
        assert_eq!(
            extension_from_content_type("image/jpeg; charset=binary").as_deref(),
            Some("jpeg")
        );
        assert_eq!(extension_from_content_type("image/x-icon").as_deref(), Some("ico"));
    }

    #[test]
    fn same_url_same_name_different_url_different_name() {
        let a = asset_filename("https://a.example/x.png", None).unwrap();
        let b = asset_filename("https://b.example/x.png", None).unwrap();
        assert_eq!(a, asset_filename("https://a.example/x.png", None).unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn normalization_and_relative_references() {
        assert_eq!(
            normalize_path(Path::new("./out/posts/../assets/a.png")),
            PathBuf::from("out/assets/a.png")
        );
        assert_eq!(
            relative_reference(Path::new("out/posts"), Path::new("out/assets/a.png")),
            "../assets/a.png"
        );
        assert_eq!(
            relative_reference(Path::new("."), Path::new("assets/a.png")),
            "assets/a.png"
        );
    }

    #[test]
    fn reference_forms() {
        let doc = Path::new("out/posts/hello.md");
        let mut layout = AssetLayout {
            output_folder: PathBuf::from("out"),
            assets_folder: "assets".into(),
            mode: AssetRefMode::Relative,
        };
        let local = layout.asset_dir(Some(doc)).join("a.png");
        assert_eq!(local, PathBuf::from("out/assets/a.png"));
        assert_eq!(layout.reference(&local, Some(doc)), "../assets/a.png");

        layout.mode = AssetRefMode::Absolute;
        assert_eq!(layout.reference(&local, Some(doc)), "/assets/a.png");

        layout.mode = AssetRefMode::Colocate;
        let local = layout.asset_dir(Some(doc)).join("a.png");
        assert_eq!(local, PathBuf::from("out/posts/a.png"));
        assert_eq!(layout.reference(&local, Some(doc)), "a.png");
    }

    #[test]
    fn references_map_back_to_local_files() {
        let doc = Path::new("out/posts/hello.md");
        let out = Path::new("out");
        assert_eq!(
            reference_to_local_path("../assets/a.png", doc, out),
            Some(PathBuf::from("out/assets/a.png"))
        );
        assert_eq!(
            reference_to_local_path("/assets/a.png?v=2", doc, out),
            Some(PathBuf::from("out/assets/a.png"))
        );
        assert_eq!(
            reference_to_local_path("a.png", doc, out),
            Some(PathBuf::from("out/posts/a.png"))
        );
        assert_eq!(reference_to_local_path("https://x.example/a.png", doc, out), None);
        assert_eq!(reference_to_local_path("data:image/png;base64,AAA", doc, out), None);
    }
}
