//! The import run: sources → entries → transformed documents → files.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use feedport_assets::{AssetStore, AssetStoreOptions, HtmlAssetRewriter, normalize_path};
use feedport_fetch::Fetch;
use feedport_markdown::{CodeFormatter, DowngradeOptions, MarkdownDowngrader};
use feedport_shared::{AssetRefMode, ContentType, Entry, ImportConfig, OutputFormat, Result};
use feedport_sources::Source;
use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::frontmatter::render_document;
use crate::paths::PathPolicy;
use crate::persist::Persist;
use crate::report::{ImportSummary, ProgressReporter};
use crate::writer::{WriteOptions, WriteOutcome, check_conflicts, write_document};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Configured,
    Fetching,
    Transforming,
    Writing,
    Reported,
}

pub struct Importer {
    config: ImportConfig,
    fetcher: Arc<dyn Fetch>,
    rewriter: HtmlAssetRewriter,
    downgrader: MarkdownDowngrader,
    paths: PathPolicy,
    persister: Option<Arc<dyn Persist>>,
    sources: Vec<Source>,
    state: RunState,
}

impl Importer {
    pub fn new(config: ImportConfig, fetcher: Arc<dyn Fetch>) -> Self {
        let store = Arc::new(AssetStore::new(
            Arc::clone(&fetcher),
            AssetStoreOptions {
                output_folder: config.output_folder.clone(),
                assets_folder: config.assets_folder.clone(),
                mode: config.asset_refs,
                overwrite: config.overwrite,
                dry_run: config.dry_run,
            },
        ));
        let downgrader = MarkdownDowngrader::new(DowngradeOptions {
            output_folder: config.output_folder.clone(),
            preserved_tags: config.preserved_tags.clone(),
        });
        let paths = PathPolicy {
            output_folder: config.output_folder.clone(),
            drafts_folder: config.drafts_folder.clone(),
            format: config.format,
            colocate: config.asset_refs == AssetRefMode::Colocate,
        };
        Self {
            config,
            fetcher,
            rewriter: HtmlAssetRewriter::new(store),
            downgrader,
            paths,
            persister: None,
            sources: Vec::new(),
            state: RunState::Configured,
        }
    }

    /// Also commit every written non-draft document through `persister`.
    pub fn with_persister(mut self, persister: Arc<dyn Persist>) -> Self {
        self.persister = Some(persister);
        self
    }

    /// Register a code formatter with the Markdown downgrader.
    pub fn with_formatter(mut self, formatter: Arc<dyn CodeFormatter>) -> Self {
        self.downgrader = self.downgrader.with_formatter(formatter);
        self
    }

    pub fn add_source(&mut self, source: Source) {
        self.sources.push(source);
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Run the whole import.
    ///
    /// Failed sources and entries are logged, counted and skipped. The only
    /// run-level failure is a path conflict, which is detected before any
    /// asset or document is written.
    #[instrument(skip_all, fields(sources = self.sources.len(), dry_run = self.config.dry_run))]
    pub async fn run(&mut self, progress: &dyn ProgressReporter) -> Result<ImportSummary> {
        let start = Instant::now();
        let mut errors = 0;

        // --- Fetching ---
        self.state = RunState::Fetching;
        progress.phase("Fetching sources");
        let (entries, failed_sources) = self.fetch_all(progress).await;
        errors += failed_sources;

        // --- Paths ---
        let entries: Vec<Entry> = entries
            .into_iter()
            .filter_map(|mut entry| match self.paths.file_path(&entry) {
                Some(path) => {
                    entry.file_path = Some(path);
                    Some(entry)
                }
                None => {
                    debug!(url = %entry.url, "skipped by path formatter");
                    None
                }
            })
            .collect();
        check_conflicts(&entries)?;

        // --- Transforming ---
        self.state = RunState::Transforming;
        progress.phase("Transforming entries");
        let transformed = join_all(entries.into_iter().map(|entry| self.transform(entry))).await;
        let mut entries = Vec::with_capacity(transformed.len());
        for (url, outcome) in transformed {
            match outcome {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!(%url, error = %e, "entry dropped");
                    errors += 1;
                }
            }
        }
        let cleaned = if self.config.dry_run {
            0
        } else {
            self.downgrader.cleanup().await
        };
        entries.sort_by(|a, b| b.date.cmp(&a.date));

        // --- Writing ---
        self.state = RunState::Writing;
        progress.phase("Writing documents");
        let opts = WriteOptions {
            overwrite: self.config.overwrite,
            dry_run: self.config.dry_run,
        };
        let total = entries.len();
        let mut documents = 0;
        for (i, entry) in entries.iter().enumerate() {
            let path = entry
                .file_path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            match write_document(entry, opts).await {
                Ok(WriteOutcome::Written { .. }) => {
                    documents += 1;
                    if !self.persist(entry).await {
                        errors += 1;
                    }
                }
                Ok(WriteOutcome::Rendered { .. }) => documents += 1,
                Ok(WriteOutcome::Skipped) => {}
                Err(e) => {
                    warn!(url = %entry.url, error = %e, "write failed");
                    errors += 1;
                }
            }
            progress.document_written(&path, i + 1, total);
        }

        // --- Reported ---
        self.state = RunState::Reported;
        let store = self.rewriter.store();
        let summary = ImportSummary {
            documents,
            assets: store.assets_written(),
            cleaned,
            errors: errors + store.assets_failed(),
            sources: self.sources.iter().map(Source::label).collect(),
            elapsed: start.elapsed(),
        };
        info!(
            documents = summary.documents,
            assets = summary.assets,
            cleaned = summary.cleaned,
            errors = summary.errors,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "import complete"
        );
        progress.done(&summary);
        Ok(summary)
    }

    /// Fetch every source concurrently. Returns the entries in source order
    /// and the number of sources that failed.
    async fn fetch_all(&self, progress: &dyn ProgressReporter) -> (Vec<Entry>, usize) {
        let fetcher = self.fetcher.as_ref();
        let results = join_all(self.sources.iter().map(|source| source.get_entries(fetcher))).await;

        let mut entries = Vec::new();
        let mut failed = 0;
        for (source, result) in self.sources.iter().zip(results) {
            let label = source.label();
            match result {
                Ok(found) => {
                    progress.source_fetched(&label, found.len());
                    entries.extend(found);
                }
                Err(e) => {
                    warn!(source = %label, error = %e, "source failed");
                    failed += 1;
                }
            }
        }
        (entries, failed)
    }

    /// Rewrite assets, downgrade to Markdown when asked, and localize the
    /// featured image. Returns the entry URL alongside the outcome.
    async fn transform(&self, mut entry: Entry) -> (String, Result<Entry>) {
        let url = entry.url.clone();
        if entry.content_type == Some(ContentType::Html) {
            entry.content = self.rewriter.rewrite(&entry.content, &entry).await;
            if self.config.format == OutputFormat::Markdown {
                match self.downgrader.to_markdown(&entry.content, &entry) {
                    Ok(markdown) => entry.content = markdown,
                    Err(e) => return (url, Err(e)),
                }
            }
            entry.content_type = Some(self.config.format.content_type());
        }
        self.localize_featured_image(&mut entry).await;
        (url, Ok(entry))
    }

    async fn localize_featured_image(&self, entry: &mut Entry) {
        let Some(remote) = entry
            .metadata
            .get("featuredImage")
            .and_then(Value::as_str)
            .map(str::to_owned)
        else {
            return;
        };
        match self
            .rewriter
            .store()
            .resolve(&remote, None, entry.file_path.as_deref())
            .await
        {
            Ok(record) => {
                entry
                    .metadata
                    .insert("featuredImage".into(), Value::String(record.reference));
            }
            Err(e) => warn!(url = %entry.url, image = %remote, error = %e, "featured image left remote"),
        }
    }

    /// Returns false when a persister is configured and failed.
    async fn persist(&self, entry: &Entry) -> bool {
        let Some(persister) = &self.persister else {
            return true;
        };
        if entry.is_draft() {
            return true;
        }
        let Some(path) = entry.file_path.as_deref() else {
            return true;
        };
        let root = normalize_path(&self.config.output_folder);
        let relative: PathBuf = path.strip_prefix(&root).unwrap_or(path).to_path_buf();
        let remote_path = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let result = match render_document(entry) {
            Ok(contents) => persister.persist_file(&remote_path, &contents, entry).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(url = %entry.url, path = %remote_path, error = %e, "persist failed");
                false
            }
        }
    }
}
