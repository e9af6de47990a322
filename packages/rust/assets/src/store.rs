//! Run-scoped asset registry: each asset is fetched and written at most once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use feedport_fetch::{Fetch, FetchKind, FetchOptions, Fetched};
use feedport_shared::{AssetRefMode, FeedportError, Result, short_hash};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};
use url::Url;

use crate::resolver::{AssetLayout, asset_filename, has_url_extension};

/// A resolved asset, as seen from one referring document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub source_url: String,
    /// Short hash of `source_url` embedded in the filename.
    pub content_hash: String,
    pub local_path: PathBuf,
    /// What the document should write in place of `source_url`.
    pub reference: String,
}

#[derive(Debug, Clone)]
pub struct AssetStoreOptions {
    pub output_folder: PathBuf,
    pub assets_folder: String,
    pub mode: AssetRefMode,
    pub overwrite: bool,
    pub dry_run: bool,
}

/// Outcome shared by every caller of one slot: local path or error text.
type SlotOutcome = std::result::Result<PathBuf, String>;

/// One slot per (asset directory, remote URL). A slot is registered
/// before its fetch starts, so concurrent callers for the same asset await
/// the same fetch and write.
type Slots = HashMap<(PathBuf, String), Arc<OnceCell<SlotOutcome>>>;

pub struct AssetStore {
    fetcher: Arc<dyn Fetch>,
    layout: AssetLayout,
    overwrite: bool,
    dry_run: bool,
    slots: Mutex<Slots>,
    written: AtomicUsize,
    failed: AtomicUsize,
}

impl AssetStore {
    pub fn new(fetcher: Arc<dyn Fetch>, opts: AssetStoreOptions) -> Self {
        Self {
            fetcher,
            layout: AssetLayout {
                output_folder: opts.output_folder,
                assets_folder: opts.assets_folder,
                mode: opts.mode,
            },
            overwrite: opts.overwrite,
            dry_run: opts.dry_run,
            slots: Mutex::new(HashMap::new()),
            written: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    pub fn layout(&self) -> &AssetLayout {
        &self.layout
    }

    /// Number of asset files written during this run.
    pub fn assets_written(&self) -> usize {
        self.written.load(Ordering::Relaxed)
    }

    /// Number of distinct assets that could not be fetched or written.
    pub fn assets_failed(&self) -> usize {
        self.failed.load(Ordering::Relaxed)
    }

    /// Resolve `remote_url` to a local asset for the document at
    /// `document_path`, fetching and writing it if needed.
    pub async fn resolve(
        &self,
        remote_url: &str,
        content_type_hint: Option<&str>,
        document_path: Option<&Path>,
    ) -> Result<AssetRecord> {
        let parsed = Url::parse(remote_url)
            .map_err(|e| FeedportError::validation(format!("invalid asset URL '{remote_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FeedportError::validation(format!(
                "not a remote asset: {remote_url}"
            )));
        }

        let dir = self.layout.asset_dir(document_path);
        let slot = self
            .slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry((dir.clone(), remote_url.to_owned()))
            .or_default()
            .clone();

        let outcome = slot
            .get_or_init(|| async move {
                let outcome = self.materialize(remote_url, content_type_hint, dir).await;
                if outcome.is_err() {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                }
                outcome
            })
            .await;

        match outcome {
            Ok(local_path) => Ok(AssetRecord {
                source_url: remote_url.to_owned(),
                content_hash: short_hash(remote_url),
                reference: self.layout.reference(local_path, document_path),
                local_path: local_path.clone(),
            }),
            Err(message) => Err(FeedportError::Network(message.clone())),
        }
    }

    /// Fetch and write one asset. Runs at most once per slot.
    #[instrument(skip_all, fields(remote = %remote_url))]
    async fn materialize(
        &self,
        remote_url: &str,
        content_type_hint: Option<&str>,
        dir: PathBuf,
    ) -> SlotOutcome {
        let known_name = has_url_extension(remote_url) || content_type_hint.is_some();

        if !self.overwrite {
            let existing = if known_name {
                let path = dir.join(asset_filename(remote_url, content_type_hint).map_err(|e| e.to_string())?);
                path.exists().then_some(path)
            } else {
                find_extensionless_match(&dir, remote_url)
            };
            if let Some(path) = existing {
                debug!(kind = "asset", local = %path.display(), "skipping existing file");
                return Ok(path);
            }
        }

        let fetched = self
            .fetcher
            .fetch(remote_url, &FetchOptions::new(FetchKind::Buffer))
            .await
            .map_err(|e| e.to_string())?;
        let (bytes, content_type) = match fetched {
            Fetched::Buffer {
                bytes,
                content_type,
            } => (bytes, content_type),
            Fetched::Text(text) => (text.into_bytes(), None),
            Fetched::Parsed(value) => (value.to_string().into_bytes(), None),
        };

        let filename = asset_filename(
            remote_url,
            content_type_hint.or(content_type.as_deref()),
        )
        .map_err(|e| e.to_string())?;
        let path = dir.join(filename);

        info!(
            kind = "asset",
            local = %path.display(),
            remote = %remote_url,
            size = bytes.len(),
            dry_run = self.dry_run,
            "importing"
        );

        if !self.dry_run {
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| FeedportError::io(&dir, e).to_string())?;
            tokio::fs::write(&path, &bytes)
                .await
                .map_err(|e| FeedportError::io(&path, e).to_string())?;
            self.written.fetch_add(1, Ordering::Relaxed);
        }

        Ok(path)
    }
}

/// An earlier run may have named an extension-less URL after its response
/// content type; find that file by its `<stem>-<hash>` prefix.
fn find_extensionless_match(dir: &Path, remote_url: &str) -> Option<PathBuf> {
    let base = asset_filename(remote_url, None).ok()?;
    std::fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n == base || n.starts_with(&format!("{base}.")))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedport_fetch::StubFetcher;
    use std::time::Duration;

    const IMG: &str = "https://cdn.example.com/uploads/photo.png";

    fn store(
        dir: &tempfile::TempDir,
        fetcher: Arc<StubFetcher>,
        mode: AssetRefMode,
        overwrite: bool,
        dry_run: bool,
    ) -> AssetStore {
        AssetStore::new(
            fetcher,
            AssetStoreOptions {
                output_folder: dir.path().to_path_buf(),
                assets_folder: "assets".into(),
                mode,
                overwrite,
                dry_run,
            },
        )
    }

    #[tokio::test]
    async fn writes_once_and_returns_relative_reference() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(StubFetcher::new().with_body(IMG, vec![1, 2, 3], Some("image/png")));
        let store = store(&dir, fetcher.clone(), AssetRefMode::Relative, false, false);
        let doc = dir.path().join("posts/hello.md");

        let record = store.resolve(IMG, None, Some(&doc)).await.unwrap();
        assert!(record.reference.starts_with("../assets/photo-"));
        assert!(record.reference.ends_with(".png"));
        assert_eq!(std::fs::read(&record.local_path).unwrap(), vec![1, 2, 3]);

        let again = store.resolve(IMG, None, Some(&doc)).await.unwrap();
        assert_eq!(again, record);
        assert_eq!(fetcher.calls(IMG), 1);
        assert_eq!(store.assets_written(), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(
            StubFetcher::new()
                .with_body(IMG, vec![9], Some("image/png"))
                .with_latency(Duration::from_millis(50)),
        );
        let store = store(&dir, fetcher.clone(), AssetRefMode::Absolute, true, false);
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");

        let (ra, rb) = tokio::join!(
            store.resolve(IMG, None, Some(&a)),
            store.resolve(IMG, None, Some(&b))
        );
        assert_eq!(ra.unwrap().local_path, rb.unwrap().local_path);
        assert_eq!(fetcher.calls(IMG), 1);
        assert_eq!(store.assets_written(), 1);
    }

    #[tokio::test]
    async fn safe_mode_keeps_existing_file_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir
            .path()
            .join("assets")
            .join(asset_filename(IMG, None).unwrap());
        std::fs::create_dir_all(existing.parent().unwrap()).unwrap();
        std::fs::write(&existing, b"old").unwrap();

        let fetcher = Arc::new(StubFetcher::new().with_body(IMG, b"new".to_vec(), None));
        let store = store(&dir, fetcher.clone(), AssetRefMode::Absolute, false, false);
        let record = store.resolve(IMG, None, None).await.unwrap();

        assert_eq!(record.local_path, existing);
        assert_eq!(std::fs::read(&existing).unwrap(), b"old");
        assert_eq!(fetcher.calls(IMG), 0);
        assert_eq!(store.assets_written(), 0);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(StubFetcher::new().with_body(IMG, vec![1], None));
        let store = store(&dir, fetcher, AssetRefMode::Relative, true, true);
        let record = store.resolve(IMG, None, None).await.unwrap();
        assert!(!record.local_path.exists());
        assert_eq!(store.assets_written(), 0);
    }

    #[tokio::test]
    async fn extensionless_url_named_from_response_type() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://images.example.com/render/abc123";
        let fetcher = Arc::new(StubFetcher::new().with_body(url, vec![0], Some("image/avif")));
        let store = store(&dir, fetcher.clone(), AssetRefMode::Colocate, false, false);
        let doc = dir.path().join("post/index.md");

        let record = store.resolve(url, None, Some(&doc)).await.unwrap();
        assert!(record.reference.starts_with("abc123-"));
        assert!(record.reference.ends_with(".avif"));
        assert_eq!(record.local_path.parent().unwrap(), dir.path().join("post"));

        // A second run in safe mode finds the file without fetching.
        let fetcher2 = Arc::new(StubFetcher::new());
        let store2 = AssetStore::new(
            fetcher2.clone(),
            AssetStoreOptions {
                output_folder: dir.path().to_path_buf(),
                assets_folder: "assets".into(),
                mode: AssetRefMode::Colocate,
                overwrite: false,
                dry_run: false,
            },
        );
        let again = store2.resolve(url, None, Some(&doc)).await.unwrap();
        assert_eq!(again.local_path, record.local_path);
        assert_eq!(fetcher2.calls(url), 0);
    }

    #[tokio::test]
    async fn failures_are_reported_per_asset() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        let store = store(&dir, fetcher, AssetRefMode::Relative, false, false);
        assert!(store.resolve(IMG, None, None).await.is_err());
        assert!(store.resolve(IMG, None, None).await.is_err());
        assert!(store.resolve("data:image/png;base64,AA", None, None).await.is_err());
        assert_eq!(store.assets_failed(), 1);
    }
}
