//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use feedport_core::{
    GitHubPersister, ImportSummary, Importer, PersistTarget, ProgressReporter,
};
use feedport_fetch::{BasicAuth, HttpFetcher, HttpFetcherOptions};
use feedport_shared::{AppConfig, ImportConfig, env_secret, init_config, load_config};
use feedport_sources::{Source, SourceOptions};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// feedport: turn feeds into files.
#[derive(Parser)]
#[command(
    name = "feedport",
    version,
    about = "Import RSS, Atom, WordPress, Fediverse, Bluesky and YouTube feeds as Markdown or HTML files.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Import entries from one source.
    Import(ImportArgs),

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args)]
pub(crate) struct ImportArgs {
    /// Source type: atom, rss, wordpress, wordpressapi-hosted, fediverse,
    /// bluesky, youtubeuser.
    #[arg(value_name = "TYPE")]
    pub kind: String,

    /// Feed URL, site URL, @user@host, handle, or channel id.
    pub target: String,

    /// Output folder (defaults to the config file, then the current directory).
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Fetch and convert everything but write nothing.
    #[arg(long = "dryrun")]
    pub dry_run: bool,

    /// Replace existing documents and assets.
    #[arg(long)]
    pub overwrite: bool,

    /// How long fetched responses stay cached, e.g. 30m, 24h, 1w, `*`.
    #[arg(long = "cacheduration")]
    pub cache_duration: Option<String>,

    /// Output format: markdown or html.
    #[arg(long)]
    pub format: Option<String>,

    /// Asset references: relative, absolute or colocate.
    #[arg(long = "assetrefs")]
    pub asset_refs: Option<String>,

    /// Commit written documents to a repository, e.g. github:owner/repo#main.
    #[arg(long)]
    pub persist: Option<String>,
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => "feedport=warn",
        (false, 0) => "feedport=info",
        (false, 1) => "feedport=debug",
        _ => "feedport=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Import(args) => cmd_import(args, cli.quiet).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

/// Merge CLI flags over the config file.
fn import_config(args: &ImportArgs, app: &AppConfig) -> Result<ImportConfig> {
    let mut config = ImportConfig::try_from(app)?;
    if let Some(output) = &args.output {
        config.output_folder = output.clone();
    }
    if let Some(duration) = &args.cache_duration {
        config.cache_duration = duration.parse()?;
    }
    if let Some(format) = &args.format {
        config.format = format.parse()?;
    }
    if let Some(refs) = &args.asset_refs {
        config.asset_refs = refs.parse()?;
    }
    config.overwrite = args.overwrite;
    config.dry_run = args.dry_run;
    config.persist = args.persist.clone().filter(|p| !p.is_empty());
    Ok(config)
}

async fn cmd_import(args: ImportArgs, quiet: bool) -> Result<()> {
    let app = load_config()?;
    let config = import_config(&args, &app)?;

    let fetcher = Arc::new(HttpFetcher::new(HttpFetcherOptions {
        cache_dir: config.cache_dir.clone(),
        cache_duration: config.cache_duration,
        ..HttpFetcherOptions::default()
    })?);

    let credentials = match (
        env_secret(&app.wordpress.username_env),
        env_secret(&app.wordpress.password_env),
    ) {
        (Some(username), Some(password)) => Some(BasicAuth { username, password }),
        _ => None,
    };
    debug!(
        kind = %args.kind,
        target = %args.target,
        credentials = credentials.is_some(),
        "configuring source"
    );
    let source = Source::from_type(
        &args.kind,
        &args.target,
        SourceOptions {
            credentials,
            ..SourceOptions::default()
        },
    )?;

    let persist = config.persist.clone();
    let dry_run = config.dry_run;
    let mut importer = Importer::new(config, fetcher);
    if let Some(address) = persist.filter(|_| !dry_run) {
        let target: PersistTarget = address.parse()?;
        let token = env_secret(&app.persist.token_env).ok_or_else(|| {
            eyre!(
                "persisting to {address} needs a token in ${}",
                app.persist.token_env
            )
        })?;
        importer = importer.with_persister(Arc::new(GitHubPersister::new(target, token)?));
    }
    importer.add_source(source);

    let progress = CliProgress::new(quiet);
    let summary = importer.run(&progress).await?;
    info!(%summary, "done");
    if !quiet {
        println!("{summary}");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Progress reporter (indicatif spinner)
// ---------------------------------------------------------------------------

struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new(hidden: bool) -> Self {
        if hidden {
            return Self {
                spinner: ProgressBar::hidden(),
            };
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn source_fetched(&self, label: &str, entries: usize) {
        self.spinner
            .set_message(format!("Fetched {entries} entries from {label}"));
    }

    fn document_written(&self, path: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Writing [{current}/{total}] {path}"));
    }

    fn done(&self, _summary: &ImportSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn import_flags_override_config() {
        let cli = parse(&[
            "feedport",
            "import",
            "rss",
            "https://blog.example/feed.xml",
            "--output",
            "site",
            "--format",
            "html",
            "--assetrefs",
            "colocate",
            "--cacheduration",
            "30m",
            "--dryrun",
        ]);
        let Command::Import(args) = cli.command else {
            panic!("expected import");
        };
        let config = import_config(&args, &AppConfig::default()).unwrap();
        assert_eq!(config.output_folder, PathBuf::from("site"));
        assert_eq!(config.format, feedport_shared::OutputFormat::Html);
        assert_eq!(config.asset_refs, feedport_shared::AssetRefMode::Colocate);
        assert!(config.dry_run);
        assert!(!config.overwrite);
    }

    #[test]
    fn bad_flag_values_are_rejected() {
        let cli = parse(&["feedport", "import", "rss", "x", "--format", "pdf"]);
        let Command::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert!(import_config(&args, &AppConfig::default()).is_err());
    }

    #[test]
    fn global_flags_parse_anywhere() {
        let cli = parse(&["feedport", "-vv", "config", "show", "--log-format", "json"]);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.log_format, LogFormat::Json));
    }
}
