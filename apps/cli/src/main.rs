//! feedport CLI: import feeds and content APIs into Markdown or HTML files.
//!
//! Each entry becomes one document with YAML front matter; referenced
//! media is downloaded next to the documents and links are rewritten.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
