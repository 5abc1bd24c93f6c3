//! Repository access for tagdocs.
//!
//! This crate provides:
//! - [`Repository`]: the async interface the build pipeline reads through
//! - [`tree`]: tree listing indexer and per-revision lookup index
//! - [`GitCli`]: local clone backend driving the `git` binary
//! - [`GithubRepository`]: hosted backend over the GitHub REST API
//! - [`MemoryRepository`]: in-memory revisions for tests and dry runs

pub mod git;
pub mod github;
pub mod memory;
pub mod tree;

use async_trait::async_trait;

use tagdocs_shared::Result;

pub use git::GitCli;
pub use github::{GithubClient, GithubRepository};
pub use memory::MemoryRepository;
pub use tree::{TreeIndex, index_tree, load_tree};

/// Read access to a repository's tags, trees, and file contents.
///
/// Reads are expected to be idempotent: historical revisions are immutable,
/// so callers may issue them concurrently without coordination.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Tag names, most recent first.
    async fn list_tags(&self) -> Result<Vec<String>>;

    /// Raw recursive tree listing at `revision`, one `<mode> <type> <id>\t<path>`
    /// line per entry. Empty when the revision does not exist.
    async fn list_tree(&self, revision: &str) -> Result<String>;

    /// Text content of `path` at `revision`. For symlinks this is the link
    /// target. Fails with `TagdocsError::NotFound` when absent.
    async fn read_file(&self, revision: &str, path: &str) -> Result<String>;

    /// Register a remote unless one with that name already exists.
    async fn ensure_remote(&self, name: &str, url: &str) -> Result<()>;

    /// Bring tags and refs up to date with configured remotes.
    async fn fetch(&self) -> Result<()>;

    /// Backend name for tracing.
    fn name(&self) -> &str;
}
