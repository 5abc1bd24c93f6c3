//! Error types for tagdocs.
//!
//! Library crates use [`TagdocsError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all tagdocs operations.
#[derive(Debug, thiserror::Error)]
pub enum TagdocsError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// No recognized sidebar config file exists in a tagged tree.
    #[error("no sidebar config found for tag {tag}")]
    ConfigNotFound { tag: String },

    /// A sidebar entry references a document absent from the tagged tree.
    #[error("doc not found for tag {tag}: {path}")]
    DocNotFound { tag: String, path: String },

    /// A document's front-matter block could not be parsed.
    #[error("invalid front-matter in {path}: {message}")]
    Frontmatter { path: String, message: String },

    /// A tagged sidebar config parsed as YAML but is not a category mapping.
    #[error("invalid sidebar in {path} at {tag}: {message}")]
    SidebarShape {
        tag: String,
        path: String,
        message: String,
    },

    /// A file is absent at the requested revision.
    #[error("{path} does not exist at {revision}")]
    NotFound { revision: String, path: String },

    /// The `git` binary failed or returned unexpected output.
    #[error("git error: {0}")]
    Git(String),

    /// Network/HTTP error talking to a hosted repository service.
    #[error("network error: {0}")]
    Network(String),

    /// Malformed structured input (sidebar config, API payload).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A page sink rejected an instruction.
    #[error("sink error: {0}")]
    Sink(String),

    /// A spawned build task panicked or was cancelled.
    #[error("task failed: {0}")]
    Task(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, TagdocsError>;

impl TagdocsError {
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

    /// Errors that only invalidate the version being built.
    ///
    /// The pipeline drops that version and keeps going; every other kind
    /// aborts the run.
    pub fn is_version_scoped(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound { .. }
                | Self::DocNotFound { .. }
                | Self::Frontmatter { .. }
                | Self::SidebarShape { .. }
        )
    }
}
