//! Error types for feedport.
//!
//! Library crates use [`FeedportError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all feedport operations.
#[derive(Debug, thiserror::Error)]
pub enum FeedportError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport failure (DNS, TLS, timeout, connection reset).
    #[error("network error: {0}")]
    Network(String),

    /// The remote answered with a non-success status.
    ///
    /// The body is kept so adapters can inspect API error codes.
    #[error("HTTP {status} from {url}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    /// Feed, JSON, or HTML parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad identifier, malformed entry, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// HTML-to-Markdown conversion or code formatting error.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// Requested source type is not registered.
    #[error("{0} is not a supported type")]
    UnsupportedSource(String),

    /// Two entries of the same run resolved to the same output file.
    #[error(
        "Multiple entries attempted to write to the same place: {path} (originally via {first_url}, now via {second_url})"
    )]
    PathConflict {
        path: PathBuf,
        first_url: String,
        second_url: String,
    },

    /// Remote persistence (repository upload) error.
    #[error("persist error: {0}")]
    Persist(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FeedportError>;

impl FeedportError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The upstream API error code, when the response body is a JSON
    /// object carrying a `code` field (WordPress REST style).
    pub fn api_error_code(&self) -> Option<String> {
        match self {
            Self::Http { body, .. } => serde_json::from_str::<serde_json::Value>(body)
                .ok()?
                .get("code")?
                .as_str()
                .map(str::to_owned),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = FeedportError::config("missing token");
        assert_eq!(err.to_string(), "config error: missing token");

        let err = FeedportError::UnsupportedSource("gopher".into());
        assert_eq!(err.to_string(), "gopher is not a supported type");
    }

    #[test]
    fn path_conflict_names_both_urls() {
        let err = FeedportError::PathConflict {
            path: PathBuf::from("out/hello.md"),
            first_url: "https://a.example/hello/".into(),
            second_url: "https://b.example/hello/".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("out/hello.md"));
        assert!(msg.contains("https://a.example/hello/"));
        assert!(msg.contains("https://b.example/hello/"));
    }

    #[test]
    fn api_error_code_from_http_body() {
        let err = FeedportError::Http {
            url: "https://example.com/wp-json/wp/v2/posts/?page=9".into(),
            status: 400,
            body: r#"{"code":"rest_post_invalid_page_number","message":"out of range"}"#.into(),
        };
        assert_eq!(
            err.api_error_code().as_deref(),
            Some("rest_post_invalid_page_number")
        );

        let err = FeedportError::Network("timed out".into());
        assert_eq!(err.api_error_code(), None);
    }
}
