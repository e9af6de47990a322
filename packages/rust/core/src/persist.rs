//! Optional remote persistence of written documents.
//!
//! A target is addressed as `<host>:<owner>/<repo>[#<branch>]`. GitHub is
//! the only host: files go through the repository contents API, which
//! creates the file or updates it in place when its blob `sha` is supplied.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use feedport_shared::{Entry, FeedportError, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, instrument};

const GITHUB_API: &str = "https://api.github.com";

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistTarget {
    pub owner: String,
    pub repo: String,
    /// `None` commits to the repository's default branch.
    pub branch: Option<String>,
}

impl FromStr for PersistTarget {
    type Err = FeedportError;

    fn from_str(s: &str) -> Result<Self> {
        let (host, rest) = s.split_once(':').ok_or_else(|| {
            FeedportError::config(format!(
                "invalid persist target '{s}' (expected github:owner/repo#branch)"
            ))
        })?;
        if host != "github" {
            return Err(FeedportError::config(format!("Invalid persist type: {host}")));
        }

        let (repo_part, branch) = match rest.split_once('#') {
            Some((repo, branch)) if !branch.is_empty() => (repo, Some(branch.to_owned())),
            Some((repo, _)) => (repo, None),
            None => (rest, None),
        };
        match repo_part.split_once('/') {
            Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
                Ok(Self {
                    owner: owner.to_owned(),
                    repo: repo.to_owned(),
                    branch,
                })
            }
            _ => Err(FeedportError::config(format!(
                "invalid persist repository '{repo_part}' (expected owner/repo)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Persist trait
// ---------------------------------------------------------------------------

/// Commits one rendered document to a remote store.
#[async_trait]
pub trait Persist: Send + Sync {
    /// `path` is relative to the output folder, with `/` separators.
    async fn persist_file(&self, path: &str, content: &str, entry: &Entry) -> Result<()>;
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

pub struct GitHubPersister {
    client: reqwest::Client,
    api_base: String,
    token: String,
    target: PersistTarget,
}

#[derive(Deserialize)]
struct ContentsResponse {
    sha: String,
}

impl GitHubPersister {
    pub fn new(target: PersistTarget, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("feedport/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FeedportError::Persist(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            api_base: GITHUB_API.to_owned(),
            token: token.into(),
            target,
        })
    }

    /// Point at a different API root (GitHub Enterprise, or a mock server).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_owned();
        self
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            self.target.owner,
            self.target.repo,
            path.trim_start_matches('/')
        )
    }

    /// Blob sha of the file currently at `path`, if there is one.
    async fn existing_sha(&self, url: &str) -> Result<Option<String>> {
        let mut request = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json");
        if let Some(branch) = &self.target.branch {
            request = request.query(&[("ref", branch)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FeedportError::Persist(format!("GET {url}: {e}")))?;

        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: ContentsResponse = response
                    .json()
                    .await
                    .map_err(|e| FeedportError::Persist(format!("GET {url}: {e}")))?;
                Ok(Some(body.sha))
            }
            status => Err(FeedportError::Persist(format!("GET {url}: HTTP {status}"))),
        }
    }
}

#[async_trait]
impl Persist for GitHubPersister {
    #[instrument(skip_all, fields(path = %path, repo = %self.target.repo))]
    async fn persist_file(&self, path: &str, content: &str, entry: &Entry) -> Result<()> {
        let url = self.contents_url(path);
        let sha = self.existing_sha(&url).await?;
        debug!(update = sha.is_some(), "persisting");

        let mut body = json!({
            "message": format!("feedport: {} ({})", entry.title, entry.url),
            "content": base64::engine::general_purpose::STANDARD.encode(content),
        });
        if let Some(branch) = &self.target.branch {
            body["branch"] = json!(branch);
        }
        if let Some(sha) = sha {
            body["sha"] = json!(sha);
        }

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| FeedportError::Persist(format!("PUT {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(FeedportError::Persist(format!("PUT {url}: HTTP {status}: {text}")));
        }

        info!(
            path,
            owner = %self.target.owner,
            branch = self.target.branch.as_deref().unwrap_or("(default)"),
            "persisted"
        );
        Ok(())
    }
}
