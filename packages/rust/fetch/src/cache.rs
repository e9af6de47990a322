//! On-disk response cache.
//!
//! Each URL maps to `<sha256>.body` (raw bytes) and `<sha256>.json`
//! (fetch time + content type). Cache failures never fail a fetch.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use feedport_shared::{CacheDuration, sha256_hex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct CacheMeta {
    url: String,
    fetched_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
}

/// A cached response body.
#[derive(Debug)]
pub(crate) struct CachedBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DiskCache {
    dir: PathBuf,
    duration: CacheDuration,
}

impl DiskCache {
    pub fn new(dir: PathBuf, duration: CacheDuration) -> Self {
        Self { dir, duration }
    }

    pub fn duration(&self) -> CacheDuration {
        self.duration
    }

    fn paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let key = sha256_hex(url);
        (
            self.dir.join(format!("{key}.body")),
            self.dir.join(format!("{key}.json")),
        )
    }

    /// Return the cached body if present and still fresh.
    pub async fn get(&self, url: &str) -> Option<CachedBody> {
        if self.duration == CacheDuration::Disabled {
            return None;
        }
        let (body_path, meta_path) = self.paths(url);
        let meta_raw = tokio::fs::read(&meta_path).await.ok()?;
        let meta: CacheMeta = serde_json::from_slice(&meta_raw).ok()?;

        let age = (Utc::now() - meta.fetched_at).to_std().unwrap_or_default();
        if !self.duration.is_fresh(age) {
            debug!(%url, age_secs = age.as_secs(), "cache entry expired");
            return None;
        }

        let bytes = tokio::fs::read(&body_path).await.ok()?;
        Some(CachedBody {
            bytes,
            content_type: meta.content_type,
        })
    }

    /// Store a response body. Errors are logged and swallowed.
    pub async fn put(&self, url: &str, bytes: &[u8], content_type: Option<&str>) {
        if self.duration == CacheDuration::Disabled {
            return;
        }
        let (body_path, meta_path) = self.paths(url);
        let meta = CacheMeta {
            url: url.to_owned(),
            fetched_at: Utc::now(),
            content_type: content_type.map(str::to_owned),
        };

        let result = async {
            tokio::fs::create_dir_all(&self.dir).await?;
            tokio::fs::write(&body_path, bytes).await?;
            let meta_json = serde_json::to_vec(&meta).map_err(std::io::Error::other)?;
            tokio::fs::write(&meta_path, meta_json).await
        }
        .await;

        if let Err(e) = result {
            warn!(%url, error = %e, "failed to write fetch cache");
        }
    }
}
