//! Shared types, error model, and configuration for feedport.
//!
//! This crate is the foundation depended on by all other feedport crates.
//! It provides:
//! - [`FeedportError`], the unified error type
//! - Domain types ([`Entry`], [`Author`], [`SourceKind`], [`SourceOrigin`])
//! - Configuration ([`AppConfig`], [`ImportConfig`], config loading)
//! - Deterministic hashing used for filenames and cache keys

pub mod config;
pub mod error;
pub mod hash;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CacheDuration, DefaultsConfig, ImportConfig, MarkdownConfig, PersistConfig,
    WordPressConfig, config_dir, config_file_path, default_preserved_tags, env_secret,
    init_config, load_config, load_config_from,
};
pub use error::{FeedportError, Result};
pub use hash::{SHORT_HASH_LENGTH, sha256_hex, short_hash};
pub use types::{
    AssetRefMode, Author, ContentType, Entry, EntryStatus, FilePathFormatter, OutputFormat,
    SourceKind, SourceOrigin, UUID_NAMESPACE, entry_uuid,
};
