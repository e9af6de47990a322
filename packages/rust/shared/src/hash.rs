//! Deterministic hashing helpers.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

/// Length of the short hash embedded in generated filenames.
pub const SHORT_HASH_LENGTH: usize = 12;

/// Short, filename-safe hash of `input`.
///
/// SHA-256, base64-encoded, reduced to `[A-Za-z0-9]` and truncated to
/// [`SHORT_HASH_LENGTH`] characters. Stable across runs and platforms.
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    STANDARD
        .encode(digest)
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(SHORT_HASH_LENGTH)
        .collect()
}

/// Full hex SHA-256 of `input`, used for cache keys.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_hash_is_stable_and_alphanumeric() {
        let a = short_hash("https://example.com/image.jpg");
        let b = short_hash("https://example.com/image.jpg");
        assert_eq!(a, b);
        assert_eq!(a.len(), SHORT_HASH_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn short_hash_differs_per_input() {
        assert_ne!(
            short_hash("https://example.com/a.png"),
            short_hash("https://example.com/b.png")
        );
    }

    #[test]
    fn hex_digest_length() {
        assert_eq!(sha256_hex("feedport").len(), 64);
    }
}
