//! Project configuration for tagdocs.
//!
//! A project is configured by `tagdocs.toml` in its working directory.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, TagdocsError};
use crate::types::SidebarCategories;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "tagdocs.toml";

// ---------------------------------------------------------------------------
// Config structs (matching tagdocs.toml schema)
// ---------------------------------------------------------------------------

/// Top-level project config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Site layout and requested versions.
    #[serde(default)]
    pub site: SiteConfig,

    /// Where repository content comes from.
    #[serde(default)]
    pub source: SourceConfig,

    /// Hosted repository settings (only read when `source.kind = "github"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubConfig>,

    /// Build tuning and output.
    #[serde(default)]
    pub build: BuildConfig,

    /// Navigation for the current version.
    #[serde(default)]
    pub sidebar_categories: SidebarCategories,
}

/// `[site]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Docs root; per-tag sidebar config files live here.
    #[serde(default = "default_root_dir")]
    pub root_dir: String,

    /// Directory holding the markdown sources, relative to the repo root.
    #[serde(default = "default_content_dir")]
    pub content_dir: String,

    /// Package name used in monorepo tags (`<repo_name>@1.2.3`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,

    /// Versions to build. Empty means "current revision only".
    #[serde(default)]
    pub versions: Vec<String>,

    /// Template passed through to every page instruction.
    #[serde(default = "default_component")]
    pub component: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            content_dir: default_content_dir(),
            repo_name: None,
            versions: Vec::new(),
            component: default_component(),
        }
    }
}

fn default_root_dir() -> String {
    "docs".into()
}
fn default_content_dir() -> String {
    "docs/source".into()
}
fn default_component() -> String {
    "src/templates/doc.js".into()
}

/// Repository backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Local clone, read through the `git` binary.
    #[default]
    Git,
    /// Hosted repository, read through the REST API.
    Github,
}

/// `[source]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// Working directory of the local clone.
    #[serde(default = "default_source_path")]
    pub path: String,

    /// Remote to register and fetch before resolving versions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteConfig>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            path: default_source_path(),
            remote: None,
        }
    }
}

fn default_source_path() -> String {
    ".".into()
}

/// `[source.remote]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub name: String,
    pub url: String,
}

/// `[github]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub owner: String,
    pub repo: String,

    /// API root; override for GitHub Enterprise.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Name of the env var holding the API token (never store the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_api_url() -> String {
    "https://api.github.com".into()
}
fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}

/// `[build]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Upper bound on in-flight repository reads.
    #[serde(default = "default_max_concurrent_reads")]
    pub max_concurrent_reads: usize,

    /// JSON-lines file receiving page instructions.
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            max_concurrent_reads: default_max_concurrent_reads(),
            output: default_output(),
        }
    }
}

fn default_max_concurrent_reads() -> usize {
    8
}
fn default_output() -> String {
    "public/pages.jsonl".into()
}

impl AppConfig {
    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.site.content_dir.trim_matches('/').is_empty() {
            return Err(TagdocsError::config("site.content_dir must not be empty"));
        }
        if self.build.max_concurrent_reads == 0 {
            return Err(TagdocsError::config(
                "build.max_concurrent_reads must be at least 1",
            ));
        }
        if self.source.kind == SourceKind::Github {
            let github = self.github.as_ref().ok_or_else(|| {
                TagdocsError::config("source.kind = \"github\" requires a [github] section")
            })?;
            if github.owner.is_empty() || github.repo.is_empty() {
                return Err(TagdocsError::config("github.owner and github.repo are required"));
            }
            Url::parse(&github.api_url).map_err(|e| {
                TagdocsError::config(format!("invalid github.api_url '{}': {e}", github.api_url))
            })?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Path of the config file inside a project directory.
pub fn config_file_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE_NAME)
}

/// Load the config from `path`, or from the working directory when `None`.
/// Returns defaults if the default file does not exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return load_config_from(path);
    }

    let cwd = std::env::current_dir().map_err(|e| TagdocsError::io(".", e))?;
    let path = config_file_path(&cwd);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load and validate the config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| TagdocsError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        TagdocsError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    config.validate()?;
    Ok(config)
}

/// Write a default config file into `dir`. Refuses to overwrite.
/// Returns the path to the created file.
pub fn init_config(dir: &Path) -> Result<PathBuf> {
    let path = config_file_path(dir);
    if path.exists() {
        return Err(TagdocsError::validation(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| TagdocsError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| TagdocsError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
