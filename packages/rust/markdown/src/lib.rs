//! HTML-to-Markdown downgrading with asset bookkeeping.
//!
//! [`MarkdownDowngrader::to_markdown`] walks the HTML with an ordered rule
//! list (code blocks, pictures, images, icons, preserved tags), converts the
//! rest with `htmd`, and runs the cleanup passes. While walking it records
//! which local assets the Markdown still references and which it dropped;
//! [`MarkdownDowngrader::cleanup`] then deletes the dropped ones.

mod cleanup;
pub mod code;
mod rules;
mod usage;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use feedport_shared::{Entry, FeedportError, Result, default_preserved_tags};
use htmd::options::{BulletListMarker, HeadingStyle, Options};
use scraper::Html;
use tracing::{debug, instrument};

pub use code::{CodeFormatter, JsonFormatter, canonical_language, language_from_class};
pub use usage::AssetUsage;

use rules::{Conversion, PLACEHOLDER_RE};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DowngradeOptions {
    /// Root of the import; asset references resolve against it and cleanup
    /// never deletes outside it.
    pub output_folder: PathBuf,
    /// Tags kept verbatim instead of flattened.
    pub preserved_tags: Vec<String>,
}

impl Default for DowngradeOptions {
    fn default() -> Self {
        Self {
            output_folder: PathBuf::from("."),
            preserved_tags: default_preserved_tags(),
        }
    }
}

// ---------------------------------------------------------------------------
// Downgrader
// ---------------------------------------------------------------------------

pub struct MarkdownDowngrader {
    output_folder: PathBuf,
    preserved: HashSet<String>,
    formatters: HashMap<String, Arc<dyn CodeFormatter>>,
    usage: AssetUsage,
}

impl MarkdownDowngrader {
    /// A downgrader with the built-in JSON formatter registered.
    pub fn new(opts: DowngradeOptions) -> Self {
        let downgrader = Self {
            usage: AssetUsage::new(&opts.output_folder),
            output_folder: opts.output_folder,
            preserved: opts
                .preserved_tags
                .iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            formatters: HashMap::new(),
        };
        downgrader.with_formatter(Arc::new(JsonFormatter))
    }

    /// Register a formatter for each language it declares, replacing any
    /// formatter already registered for that language.
    pub fn with_formatter(mut self, formatter: Arc<dyn CodeFormatter>) -> Self {
        for language in formatter.languages() {
            self.formatters
                .insert(canonical_language(language), Arc::clone(&formatter));
        }
        self
    }

    pub fn usage(&self) -> &AssetUsage {
        &self.usage
    }

    pub(crate) fn preserves(&self, tag: &str) -> bool {
        self.preserved.contains(tag)
    }

    pub(crate) fn formatter(&self, language: &str) -> Option<&dyn CodeFormatter> {
        self.formatters.get(language).map(|f| f.as_ref())
    }

    /// Convert one entry's HTML to Markdown.
    #[instrument(skip_all, fields(url = %entry.url))]
    pub fn to_markdown(&self, html: &str, entry: &Entry) -> Result<String> {
        let fallback_document;
        let document = match entry.file_path.as_deref() {
            Some(path) => path,
            None => {
                fallback_document = self.output_folder.join("index.md");
                fallback_document.as_path()
            }
        };

        let fragment = Html::parse_fragment(html);
        let mut conversion = Conversion {
            downgrader: self,
            document,
            slots: Vec::new(),
        };
        let mut prepared = String::with_capacity(html.len());
        conversion.render_children(fragment.root_element(), &mut prepared);

        let converter = htmd::HtmlToMarkdown::builder()
            .options(Options {
                heading_style: HeadingStyle::Atx,
                bullet_list_marker: BulletListMarker::Dash,
                ..Options::default()
            })
            .skip_tags(vec!["script", "style", "noscript", "iframe"])
            .build();
        let raw_markdown = converter
            .convert(&prepared)
            .map_err(|e| FeedportError::Conversion(format!("htmd conversion failed: {e}")))?;

        let slots = conversion.slots;
        let substituted = PLACEHOLDER_RE.replace_all(&raw_markdown, |caps: &regex::Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| slots.get(i))
                .cloned()
                .unwrap_or_default()
        });

        let markdown = cleanup::run_pipeline(&substituted);
        debug!(
            html_len = html.len(),
            markdown_len = markdown.len(),
            rules_applied = slots.len(),
            "converted to markdown"
        );
        Ok(markdown)
    }

    /// Delete assets dropped during conversion and not referenced anywhere
    /// else. Returns the number of files removed.
    pub async fn cleanup(&self) -> usize {
        self.usage.cleanup().await
    }
}

impl Default for MarkdownDowngrader {
    fn default() -> Self {
        Self::new(DowngradeOptions::default())
    }
}
