//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use tagdocs_core::pipeline::{BuildSummary, ProgressReporter};
use tagdocs_core::{JsonLinesSink, MemorySink};
use tagdocs_markdown::FrontmatterParser;
use tagdocs_repository::{GitCli, GithubRepository, Repository};
use tagdocs_shared::{AppConfig, SourceKind, TagdocsError, init_config, load_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// tagdocs: build versioned documentation from repository tags.
#[derive(Parser)]
#[command(
    name = "tagdocs",
    version,
    about = "Build versioned documentation page instructions from repository tags.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to tagdocs.toml (defaults to the working directory).
    #[arg(long, env = "TAGDOCS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

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
    /// Build every requested version and write page instructions.
    Build {
        /// Resolve and assemble, but only print the pages that would be emitted.
        #[arg(long)]
        dry_run: bool,

        /// Output file (overrides build.output).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show how requested versions resolve to tags.
    Versions,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
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

    let filter = match cli.verbose {
        0 => "tagdocs=info",
        1 => "tagdocs=debug",
        _ => "tagdocs=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Build { dry_run, out } => cmd_build(config_path, dry_run, out.as_deref()).await,
        Command::Versions => cmd_versions(config_path).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(config_path),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Construct the configured repository backend.
fn open_repository(config: &AppConfig) -> Result<Arc<dyn Repository>> {
    match config.source.kind {
        SourceKind::Git => {
            debug!(path = %config.source.path, "using local git backend");
            Ok(Arc::new(GitCli::new(&config.source.path)))
        }
        SourceKind::Github => {
            let github = config
                .github
                .as_ref()
                .ok_or_else(|| eyre!("source.kind = \"github\" requires a [github] section"))?;
            let token = std::env::var(&github.token_env).ok().filter(|t| !t.is_empty());
            if token.is_none() {
                info!(env = %github.token_env, "no GitHub token set, using anonymous requests");
            }
            Ok(Arc::new(GithubRepository::from_config(github, token)?))
        }
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_build(config_path: Option<&Path>, dry_run: bool, out: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let repo = open_repository(&config)?;
    let parser = Arc::new(FrontmatterParser);

    let output = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.build.output));

    info!(
        versions = config.site.versions.len(),
        backend = repo.name(),
        dry_run,
        "building documentation"
    );

    let reporter = CliProgress::new();

    if dry_run {
        let mut sink = MemorySink::default();
        let summary =
            tagdocs_core::build_site(&config, repo, parser, &mut sink, &reporter).await?;
        for page in &sink.pages {
            println!("{}\t{}", page.path, page.context.file_path);
        }
        print_summary(&summary, None);
        return Ok(());
    }

    let mut sink = JsonLinesSink::create(&output)?;
    let summary = tagdocs_core::build_site(&config, repo, parser, &mut sink, &reporter).await?;
    print_summary(&summary, Some(sink.path()));
    Ok(())
}

fn print_summary(summary: &BuildSummary, output: Option<&Path>) {
    println!();
    println!("  Build finished");
    println!("  Built:    {}", summary.versions_built.join(", "));
    if !summary.versions_skipped.is_empty() {
        println!("  Skipped:  {}", summary.versions_skipped.join(", "));
    }
    println!("  Pages:    {}", summary.pages_emitted);
    println!("  Anchors:  {}", summary.anchors_skipped);
    if let Some(path) = output {
        println!("  Output:   {}", path.display());
    }
    println!("  Time:     {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

async fn cmd_versions(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let repo = open_repository(&config)?;
    let versions = tagdocs_core::prepare_versions(&config, repo.as_ref()).await?;

    println!("{:<16} {:<24} {:<12} {}", "VERSION", "TAG", "MATCH", "PATH");
    for v in &versions {
        println!(
            "{:<16} {:<24} {:<12} {}{}",
            v.id,
            v.tag,
            v.semver_match.as_deref().unwrap_or("-"),
            v.base_path(),
            if v.is_current { "  (current)" } else { "" },
        );
    }
    Ok(())
}

fn cmd_config_init(config_path: Option<&Path>) -> Result<()> {
    let dir = match config_path.and_then(Path::parent) {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}"))?,
    };
    let path = init_config(&dir)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn version_built(&self, id: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Assembled [{current}/{total}] {id}"));
    }

    fn version_skipped(&self, id: &str, reason: &TagdocsError) {
        self.spinner.println(format!("  skipped {id}: {reason}"));
    }

    fn done(&self, _summary: &BuildSummary) {
        self.spinner.finish_and_clear();
    }
}
