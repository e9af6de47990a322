//! Remote asset handling: naming, downloading, and rewriting references.
//!
//! - [`resolver`] derives deterministic local filenames and the reference
//!   string a document should use for a local asset.
//! - [`AssetStore`] downloads each asset at most once per run and writes it
//!   under the configured safe-write policy.
//! - [`HtmlAssetRewriter`] finds asset URLs in HTML and swaps in local
//!   references, leaving all other markup untouched.

pub mod resolver;
mod rewriter;
mod store;
mod tokenizer;

pub use resolver::{
    AssetLayout, MAX_URL_FILENAME_LENGTH, asset_filename, extension_from_content_type,
    normalize_path, reference_to_local_path, relative_reference,
};
pub use rewriter::HtmlAssetRewriter;
pub use store::{AssetRecord, AssetStore, AssetStoreOptions};
