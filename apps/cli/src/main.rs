//! tagdocs CLI: versioned documentation builds from repository tags.
//!
//! Resolves requested versions to tags, assembles each version's sidebar
//! and documents, and writes page instructions for a site renderer.

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
