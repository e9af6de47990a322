//! Application configuration for feedport.
//!
//! User config lives at `~/.feedport/feedport.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{FeedportError, Result};
use crate::types::{AssetRefMode, OutputFormat};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "feedport.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".feedport";

// ---------------------------------------------------------------------------
// Config structs (matching feedport.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// WordPress credentials lookup.
    #[serde(default)]
    pub wordpress: WordPressConfig,

    /// Remote persistence settings.
    #[serde(default)]
    pub persist: PersistConfig,

    /// Markdown conversion settings.
    #[serde(default)]
    pub markdown: MarkdownConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Output folder for documents.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Subfolder (of the output folder) for drafts.
    #[serde(default = "default_drafts_folder")]
    pub drafts_folder: String,

    /// Subfolder (of the output folder) for shared assets.
    #[serde(default = "default_assets_folder")]
    pub assets_folder: String,

    /// How long fetched responses stay fresh, e.g. `24h`, `30m`, `0s`, `*`.
    #[serde(default = "default_cache_duration")]
    pub cache_duration: String,

    /// Where the fetch cache lives.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// `markdown` or `html`.
    #[serde(default = "default_format")]
    pub format: String,

    /// `relative`, `absolute` or `colocate`.
    #[serde(default = "default_asset_refs")]
    pub asset_refs: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            drafts_folder: default_drafts_folder(),
            assets_folder: default_assets_folder(),
            cache_duration: default_cache_duration(),
            cache_dir: default_cache_dir(),
            format: default_format(),
            asset_refs: default_asset_refs(),
        }
    }
}

fn default_output_dir() -> String {
    ".".into()
}
fn default_drafts_folder() -> String {
    "drafts".into()
}
fn default_assets_folder() -> String {
    "assets".into()
}
fn default_cache_duration() -> String {
    "24h".into()
}
fn default_cache_dir() -> String {
    ".cache".into()
}
fn default_format() -> String {
    "markdown".into()
}
fn default_asset_refs() -> String {
    "relative".into()
}

/// `[wordpress]` section. Names of env vars, never the secrets themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPressConfig {
    #[serde(default = "default_wp_username_env")]
    pub username_env: String,
    #[serde(default = "default_wp_password_env")]
    pub password_env: String,
}

impl Default for WordPressConfig {
    fn default() -> Self {
        Self {
            username_env: default_wp_username_env(),
            password_env: default_wp_password_env(),
        }
    }
}

fn default_wp_username_env() -> String {
    "WORDPRESS_USERNAME".into()
}
fn default_wp_password_env() -> String {
    "WORDPRESS_PASSWORD".into()
}

/// `[persist]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistConfig {
    /// Name of the env var holding the repository token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
        }
    }
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}

/// `[markdown]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Elements emitted verbatim as HTML inside Markdown output.
    #[serde(default = "default_preserved_tags")]
    pub preserved_tags: Vec<String>,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            preserved_tags: default_preserved_tags(),
        }
    }
}

/// Tags Markdown has no syntax for, kept as raw HTML.
pub fn default_preserved_tags() -> Vec<String> {
    ["table", "details", "abbr", "del", "ins", "kbd", "sup", "sub", "mark"]
        .into_iter()
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Cache duration
// ---------------------------------------------------------------------------

static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*([smhdwy])$").expect("valid regex"));

/// Freshness window for cached fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDuration {
    /// Always hit the network (`0s`).
    Disabled,
    /// Cached responses younger than this are reused.
    Ttl(Duration),
    /// Cached responses never expire (`*`).
    Forever,
}

impl CacheDuration {
    /// Whether a cached response of the given age may be served.
    pub fn is_fresh(&self, age: Duration) -> bool {
        match self {
            Self::Disabled => false,
            Self::Ttl(ttl) => age < *ttl,
            Self::Forever => true,
        }
    }
}

impl FromStr for CacheDuration {
    type Err = FeedportError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s == "*" {
            return Ok(Self::Forever);
        }
        let caps = DURATION_RE
            .captures(s)
            .ok_or_else(|| FeedportError::config(format!("invalid cache duration '{s}'")))?;
        let n: u64 = caps[1]
            .parse()
            .map_err(|_| FeedportError::config(format!("invalid cache duration '{s}'")))?;
        let unit = match &caps[2] {
            "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            "d" => 24 * 60 * 60,
            "w" => 7 * 24 * 60 * 60,
            _ => 365 * 24 * 60 * 60,
        };
        if n == 0 {
            return Ok(Self::Disabled);
        }
        Ok(Self::Ttl(Duration::from_secs(n.saturating_mul(unit))))
    }
}

// ---------------------------------------------------------------------------
// Import config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime import configuration, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Root folder documents are written under.
    pub output_folder: PathBuf,
    /// Drafts subfolder name.
    pub drafts_folder: String,
    /// Shared assets subfolder name.
    pub assets_folder: String,
    pub cache_duration: CacheDuration,
    pub cache_dir: PathBuf,
    /// When false (safe mode), existing files are never replaced.
    pub overwrite: bool,
    /// Compute everything, write nothing.
    pub dry_run: bool,
    pub asset_refs: AssetRefMode,
    pub format: OutputFormat,
    pub preserved_tags: Vec<String>,
    /// Remote persistence target, e.g. `github:owner/repo#main`.
    pub persist: Option<String>,
}

impl ImportConfig {
    /// Safe mode is the inverse of `overwrite`.
    pub fn safe_mode(&self) -> bool {
        !self.overwrite
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            output_folder: PathBuf::from(default_output_dir()),
            drafts_folder: default_drafts_folder(),
            assets_folder: default_assets_folder(),
            cache_duration: CacheDuration::Ttl(Duration::from_secs(24 * 60 * 60)),
            cache_dir: PathBuf::from(default_cache_dir()),
            overwrite: false,
            dry_run: false,
            asset_refs: AssetRefMode::default(),
            format: OutputFormat::default(),
            preserved_tags: default_preserved_tags(),
            persist: None,
        }
    }
}

impl TryFrom<&AppConfig> for ImportConfig {
    type Error = FeedportError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let d = &config.defaults;
        Ok(Self {
            output_folder: PathBuf::from(&d.output_dir),
            drafts_folder: d.drafts_folder.clone(),
            assets_folder: d.assets_folder.clone(),
            cache_duration: d.cache_duration.parse()?,
            cache_dir: PathBuf::from(&d.cache_dir),
            overwrite: false,
            dry_run: false,
            asset_refs: d.asset_refs.parse()?,
            format: d.format.parse()?,
            preserved_tags: config.markdown.preserved_tags.clone(),
            persist: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.feedport/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FeedportError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.feedport/feedport.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FeedportError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FeedportError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FeedportError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FeedportError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FeedportError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a non-empty environment variable.
pub fn env_secret(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.is_empty())
}
