//! In-memory repository backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use tagdocs_shared::{Result, SYMLINK_MODE, TagdocsError};

use crate::Repository;

const FILE_MODE: &str = "100644";

#[derive(Debug, Clone)]
struct Entry {
    mode: &'static str,
    content: String,
}

/// Revisions held in memory, built with chained `with_*` calls.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tags: Vec<String>,
    revisions: HashMap<String, BTreeMap<String, Entry>>,
    remotes: Mutex<Vec<(String, String)>>,
    reads: Mutex<Vec<(String, String)>>,
    fetches: AtomicUsize,
    listings: AtomicUsize,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag name. Tags are listed in insertion order.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add a regular file at `revision`.
    pub fn with_file(
        mut self,
        revision: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        self.insert(revision.into(), path.into(), FILE_MODE, content.into());
        self
    }

    /// Add a symlink at `revision` pointing to `target` (relative path).
    pub fn with_symlink(
        mut self,
        revision: impl Into<String>,
        path: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.insert(revision.into(), path.into(), SYMLINK_MODE, target.into());
        self
    }

    fn insert(&mut self, revision: String, path: String, mode: &'static str, content: String) {
        self.revisions
            .entry(revision)
            .or_default()
            .insert(path, Entry { mode, content });
    }

    /// Every `(revision, path)` passed to `read_file`, in call order.
    pub fn reads(&self) -> Vec<(String, String)> {
        self.reads.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Remotes registered through `ensure_remote`.
    pub fn remotes(&self) -> Vec<(String, String)> {
        self.remotes.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of `list_tree` calls so far.
    pub fn tree_listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_tags(&self) -> Result<Vec<String>> {
        Ok(self.tags.clone())
    }

    async fn list_tree(&self, revision: &str) -> Result<String> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        let Some(files) = self.revisions.get(revision) else {
            return Ok(String::new());
        };
        Ok(files
            .iter()
            .enumerate()
            .map(|(i, (path, entry))| format!("{} blob {i:040x}\t{path}", entry.mode))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    async fn read_file(&self, revision: &str, path: &str) -> Result<String> {
        if let Ok(mut reads) = self.reads.lock() {
            reads.push((revision.to_string(), path.to_string()));
        }
        self.revisions
            .get(revision)
            .and_then(|files| files.get(path))
            .map(|entry| entry.content.clone())
            .ok_or_else(|| TagdocsError::NotFound {
                revision: revision.to_string(),
                path: path.to_string(),
            })
    }

    async fn ensure_remote(&self, name: &str, url: &str) -> Result<()> {
        let mut remotes = self
            .remotes
            .lock()
            .map_err(|_| TagdocsError::Git("remote registry poisoned".into()))?;
        if !remotes.iter().any(|(n, _)| n == name) {
            remotes.push((name.to_string(), url.to_string()));
        }
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
