//! Local clone backend driving the `git` binary.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use tagdocs_shared::{Result, TagdocsError};

use crate::Repository;

/// Reads tags, trees, and blobs from a local clone.
#[derive(Debug, Clone)]
pub struct GitCli {
    workdir: PathBuf,
    git_bin: String,
}

impl GitCli {
    /// Backend rooted at the working directory of a clone.
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            git_bin: "git".to_string(),
        }
    }

    /// Use a specific `git` executable.
    pub fn with_git_bin(mut self, git_bin: impl Into<String>) -> Self {
        self.git_bin = git_bin.into();
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(?args, "running git");
        Command::new(&self.git_bin)
            .args(args)
            .current_dir(&self.workdir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                TagdocsError::Git(format!(
                    "failed to spawn `{}`: {e}. Is git installed?",
                    self.git_bin
                ))
            })
    }

    /// Run and require success, returning stdout.
    async fn run_ok(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args).await?;
        if !output.status.success() {
            return Err(TagdocsError::Git(format!(
                "`git {}` failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Turn `ls-tree -z` output into the newline listing [`Repository`] returns.
///
/// NUL termination keeps paths unquoted. Paths holding a newline cannot be
/// expressed in the listing and are skipped.
fn nul_listing(stdout: &str) -> String {
    stdout
        .split('\0')
        .filter(|record| !record.is_empty())
        .filter(|record| {
            let keep = !record.contains('\n');
            if !keep {
                debug!(record, "skipping tree entry with newline in path");
            }
            keep
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// stderr fragments git prints when an object or path is absent.
fn is_missing_object(stderr: &str) -> bool {
    stderr.contains("Not a valid object name")
        || stderr.contains("does not exist")
        || stderr.contains("exists on disk, but not in")
        || stderr.contains("not a tree object")
        || stderr.contains("bad revision")
}

#[async_trait]
impl Repository for GitCli {
    async fn list_tags(&self) -> Result<Vec<String>> {
        let stdout = self
            .run_ok(&["tag", "--list", "--sort=-creatordate"])
            .await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn list_tree(&self, revision: &str) -> Result<String> {
        let output = self
            .run(&["ls-tree", "-r", "-z", "--full-tree", revision])
            .await?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            if is_missing_object(&stderr) {
                debug!(revision, "revision not found, empty tree");
                return Ok(String::new());
            }
            return Err(TagdocsError::Git(format!(
                "ls-tree {revision} failed: {}",
                stderr.trim()
            )));
        }

        Ok(nul_listing(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn read_file(&self, revision: &str, path: &str) -> Result<String> {
        let object = format!("{revision}:{path}");
        let output = self.run(&["cat-file", "-p", &object]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing_object(&stderr) {
                return Err(TagdocsError::NotFound {
                    revision: revision.to_string(),
                    path: path.to_string(),
                });
            }
            return Err(TagdocsError::Git(format!(
                "cat-file {object} failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    #[instrument(skip(self))]
    async fn ensure_remote(&self, name: &str, url: &str) -> Result<()> {
        let existing = self.run(&["remote", "get-url", name]).await?;
        if existing.status.success() {
            debug!(name, "remote already configured");
            return Ok(());
        }

        self.run_ok(&["remote", "add", name, url]).await?;
        info!(name, url, "added remote");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch(&self) -> Result<()> {
        self.run_ok(&["fetch", "--all", "--tags", "--quiet"]).await?;
        info!("fetched remotes");
        Ok(())
    }

    fn name(&self) -> &str {
        "git"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static REPO_COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn git(dir: &Path, args: &[&str]) {
        let status = std::process::Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .expect("spawn git");
        assert!(
            status.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&status.stderr)
        );
    }

    /// Scratch repo with one tagged commit holding a doc and a symlink to it.
    fn scratch_repo() -> PathBuf {
        let n = REPO_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!("tagdocs-git-{}-{n}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("docs/source")).expect("create dirs");

        git(&dir, &["init", "--quiet"]);
        git(&dir, &["config", "user.email", "docs@example.com"]);
        git(&dir, &["config", "user.name", "Docs"]);
        git(&dir, &["config", "commit.gpgsign", "false"]);
        git(&dir, &["config", "tag.gpgsign", "false"]);

        std::fs::write(dir.join("docs/source/intro.md"), "---\ntitle: Intro\n---\nHello\n")
            .expect("write doc");
        #[cfg(unix)]
        std::os::unix::fs::symlink("intro.md", dir.join("docs/source/alias.md"))
            .expect("symlink");

        std::fs::write(dir.join("docs/source/café.md"), "Café\n").expect("write doc");

        git(&dir, &["add", "."]);
        git(&dir, &["commit", "--quiet", "-m", "docs"]);
        git(&dir, &["tag", "v1.0.0"]);
        dir
    }

    #[tokio::test]
    async fn lists_tags_and_tree() {
        if !git_available() {
            return;
        }
        let dir = scratch_repo();
        let repo = GitCli::new(&dir);

        let tags = repo.list_tags().await.unwrap();
        assert_eq!(tags, vec!["v1.0.0"]);

        let listing = repo.list_tree("v1.0.0").await.unwrap();
        assert!(listing.contains("\tdocs/source/intro.md"));
        #[cfg(unix)]
        assert!(listing.contains("120000 blob"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn non_ascii_paths_are_listed_verbatim() {
        if !git_available() {
            return;
        }
        let dir = scratch_repo();
        let repo = GitCli::new(&dir);

        let listing = repo.list_tree("v1.0.0").await.unwrap();
        assert!(!listing.contains('"'));
        let index = crate::TreeIndex::from_listing(&listing);
        assert!(index.is_markdown_path("docs/source/café.md"));

        let content = repo.read_file("v1.0.0", "docs/source/café.md").await.unwrap();
        assert_eq!(content, "Café\n");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_revision_is_empty_tree() {
        if !git_available() {
            return;
        }
        let dir = scratch_repo();
        let repo = GitCli::new(&dir);

        let listing = repo.list_tree("v9.9.9").await.unwrap();
        assert!(listing.is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn reads_files_and_link_targets() {
        if !git_available() {
            return;
        }
        let dir = scratch_repo();
        let repo = GitCli::new(&dir);

        let content = repo.read_file("v1.0.0", "docs/source/intro.md").await.unwrap();
        assert!(content.contains("title: Intro"));

        #[cfg(unix)]
        {
            let target = repo.read_file("v1.0.0", "docs/source/alias.md").await.unwrap();
            assert_eq!(target, "intro.md");
        }

        let err = repo
            .read_file("v1.0.0", "docs/source/missing.md")
            .await
            .unwrap_err();
        assert!(matches!(err, TagdocsError::NotFound { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn ensure_remote_is_idempotent() {
        if !git_available() {
            return;
        }
        let dir = scratch_repo();
        let repo = GitCli::new(&dir);

        repo.ensure_remote("upstream", "https://example.com/docs.git")
            .await
            .unwrap();
        repo.ensure_remote("upstream", "https://example.com/other.git")
            .await
            .unwrap();

        let url = repo.run_ok(&["remote", "get-url", "upstream"]).await.unwrap();
        assert_eq!(url.trim(), "https://example.com/docs.git");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn nul_records_become_lines() {
        let raw = "100644 blob aa\tdocs/a b.md\0120000 blob bb\tdocs/café.md\0100644 blob cc\tbad\nname.md\0";
        assert_eq!(
            nul_listing(raw),
            "100644 blob aa\tdocs/a b.md\n120000 blob bb\tdocs/café.md"
        );
        assert_eq!(nul_listing(""), "");
    }

    #[test]
    fn missing_object_detection() {
        assert!(is_missing_object("fatal: Not a valid object name v2.0.0"));
        assert!(is_missing_object(
            "fatal: path 'docs/a.md' does not exist in 'v1.0.0'"
        ));
        assert!(!is_missing_object("fatal: not a git repository"));
    }
}
