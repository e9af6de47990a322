//! reqwest-backed [`Fetch`] implementation with an on-disk cache.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use feedport_shared::{CacheDuration, FeedportError, Result};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, instrument, warn};

use crate::cache::DiskCache;
use crate::{Fetch, FetchKind, FetchOptions, Fetched, xml};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User-Agent string for all requests.
const USER_AGENT: &str = concat!("feedport/", env!("CARGO_PKG_VERSION"));

/// Configuration for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcherOptions {
    pub cache_dir: PathBuf,
    pub cache_duration: CacheDuration,
    pub timeout_secs: u64,
}

impl Default for HttpFetcherOptions {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".cache"),
            cache_duration: CacheDuration::Ttl(Duration::from_secs(24 * 60 * 60)),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Production fetcher: HTTP via reqwest, responses cached on disk.
pub struct HttpFetcher {
    client: Client,
    cache: DiskCache,
    /// URLs already announced in the log.
    announced: Mutex<HashSet<String>>,
    /// URLs that failed at least once.
    failed: Mutex<HashSet<String>>,
}

impl HttpFetcher {
    pub fn new(opts: HttpFetcherOptions) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .timeout(Duration::from_secs(opts.timeout_secs))
            .build()
            .map_err(|e| FeedportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            cache: DiskCache::new(opts.cache_dir, opts.cache_duration),
            announced: Mutex::new(HashSet::new()),
            failed: Mutex::new(HashSet::new()),
        })
    }

    fn announce(&self, url: &str, opts: &FetchOptions) {
        let first = self
            .announced
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_owned());
        if first {
            info!(
                %url,
                auth = opts.basic_auth.is_some(),
                cache = ?self.cache.duration(),
                "fetching"
            );
        }
    }

    fn fail(&self, url: &str, opts: &FetchOptions, err: FeedportError) -> FeedportError {
        self.failed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_owned());
        if opts.show_errors {
            warn!(%url, error = %err, "fetch failed");
        } else {
            debug!(%url, error = %err, "fetch failed");
        }
        err
    }

    async fn fetch_remote(&self, url: &str, opts: &FetchOptions) -> Result<(Vec<u8>, Option<String>)> {
        let mut request = self.client.get(url);
        for (name, value) in &opts.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &opts.basic_auth {
            request = request.basic_auth(&auth.username, Some(&auth.password));
        }

        let response = request
            .send()
            .await
            .map_err(|e| FeedportError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedportError::Http {
                url: url.to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FeedportError::Network(format!("{url}: failed to read body: {e}")))?;

        Ok((bytes.to_vec(), content_type))
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    #[instrument(skip_all, fields(url = %url, kind = ?opts.kind))]
    async fn fetch(&self, url: &str, opts: &FetchOptions) -> Result<Fetched> {
        if let Some(hit) = self.cache.get(url).await {
            debug!("served from cache");
            return decode(url, hit.bytes, hit.content_type, opts.kind)
                .map_err(|e| self.fail(url, opts, e));
        }

        self.announce(url, opts);

        let (bytes, content_type) = self
            .fetch_remote(url, opts)
            .await
            .map_err(|e| self.fail(url, opts, e))?;

        self.cache.put(url, &bytes, content_type.as_deref()).await;

        decode(url, bytes, content_type, opts.kind).map_err(|e| self.fail(url, opts, e))
    }

    fn error_count(&self) -> usize {
        self.failed.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Decode a raw body per the requested kind.
pub(crate) fn decode(
    url: &str,
    bytes: Vec<u8>,
    content_type: Option<String>,
    kind: FetchKind,
) -> Result<Fetched> {
    match kind {
        FetchKind::Buffer => Ok(Fetched::Buffer {
            bytes,
            content_type,
        }),
        FetchKind::Text => Ok(Fetched::Text(String::from_utf8_lossy(&bytes).into_owned())),
        FetchKind::Xml => {
            let text = String::from_utf8_lossy(&bytes);
            xml::parse_xml(&text)
                .map(Fetched::Parsed)
                .map_err(|e| FeedportError::parse(format!("{url}: {e}")))
        }
        FetchKind::Json => serde_json::from_slice(&bytes)
            .map(Fetched::Parsed)
            .map_err(|e| FeedportError::parse(format!("{url}: invalid JSON: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher(dir: &tempfile::TempDir, duration: CacheDuration) -> HttpFetcher {
        HttpFetcher::new(HttpFetcherOptions {
            cache_dir: dir.path().to_path_buf(),
            cache_duration: duration,
            timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<rss><channel><title>Blog</title></channel></rss>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&dir, CacheDuration::Forever);
        let url = format!("{}/feed.xml", server.uri());
        let opts = FetchOptions::new(FetchKind::Xml);

        for _ in 0..2 {
            let value = fetcher.fetch(&url, &opts).await.unwrap().into_value(&url).unwrap();
            assert_eq!(value["rss"]["channel"]["title"], "Blog");
        }
        assert_eq!(fetcher.error_count(), 0);
    }

    #[tokio::test]
    async fn disabled_cache_always_hits_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"id":1}]"#))
            .expect(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&dir, CacheDuration::Disabled);
        let url = format!("{}/posts", server.uri());
        let opts = FetchOptions::new(FetchKind::Json);

        fetcher.fetch(&url, &opts).await.unwrap();
        let value = fetcher.fetch(&url, &opts).await.unwrap().into_value(&url).unwrap();
        assert_eq!(value[0]["id"], 1);
    }

    #[tokio::test]
    async fn http_error_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_string(r#"{"code":"rest_post_invalid_page_number"}"#),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&dir, CacheDuration::Disabled);
        let url = format!("{}/wp-json/wp/v2/posts/?page=4", server.uri());

        let err = fetcher
            .fetch(&url, &FetchOptions::new(FetchKind::Json).quiet())
            .await
            .unwrap_err();
        match &err {
            FeedportError::Http { status, .. } => assert_eq!(*status, 400),
            other => panic!("expected Http error, got {other:?}"),
        }
        assert_eq!(
            err.api_error_code().as_deref(),
            Some("rest_post_invalid_page_number")
        );
        assert_eq!(fetcher.error_count(), 1);
    }

    #[tokio::test]
    async fn buffer_keeps_content_type_and_sends_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img"))
            .and(header("Authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let fetcher = fetcher(&dir, CacheDuration::Disabled);
        let url = format!("{}/img", server.uri());
        let opts = FetchOptions::new(FetchKind::Buffer).with_basic_auth(Some(crate::BasicAuth {
            username: "user".into(),
            password: "pass".into(),
        }));

        match fetcher.fetch(&url, &opts).await.unwrap() {
            Fetched::Buffer {
                bytes,
                content_type,
            } => {
                assert_eq!(bytes.len(), 4);
                assert_eq!(content_type.as_deref(), Some("image/png"));
            }
            other => panic!("expected buffer, got {other:?}"),
        }
    }
}
