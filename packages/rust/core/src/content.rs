//! Content assembly: sidebar + tagged tree → page records.
//!
//! Categories are walked in order. Items within a category are resolved
//! concurrently and collected back in sidebar order, so the output depends
//! only on the tag, tree, and sidebar.

use std::sync::Arc;

use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, instrument, trace};

use tagdocs_markdown::DocumentParser;
use tagdocs_repository::{Repository, TreeIndex, load_tree};
use tagdocs_shared::{
    AnchorRecord, ContentCategory, DocRecord, PageRecord, ResolvedVersion, Result,
    SidebarCategories, SidebarItem, TagdocsError, TreeObject, VersionBuild,
};

use crate::sidebar::resolve_sidebar;

/// Record fields that front-matter may not override. `anchor` would make a
/// serialized document read back as an anchor record.
const RESERVED_KEYS: &[&str] = &["content", "path", "file_path", "anchor"];

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Shared, read-only inputs for building versions.
#[derive(Clone)]
pub struct AssemblyContext {
    pub repo: Arc<dyn Repository>,
    pub parser: Arc<dyn DocumentParser>,
    /// Bounds concurrent repository calls (tree listings and file reads)
    /// across every version.
    pub reads: Arc<Semaphore>,
    /// Directory holding per-tag sidebar config files.
    pub root_dir: String,
    /// Directory sidebar names are resolved against.
    pub content_dir: String,
    /// Navigation for the current version.
    pub current_sidebar: Arc<SidebarCategories>,
}

impl AssemblyContext {
    async fn permit(&self) -> Result<SemaphorePermit<'_>> {
        self.reads
            .acquire()
            .await
            .map_err(|_| TagdocsError::Task("read limiter closed".into()))
    }

    pub(crate) async fn read(&self, revision: &str, path: &str) -> Result<String> {
        let _permit = self.permit().await?;
        self.repo.read_file(revision, path).await
    }

    async fn tree(&self, revision: &str) -> Result<TreeIndex> {
        let _permit = self.permit().await?;
        load_tree(self.repo.as_ref(), revision).await
    }

    /// Repository path of the document a sidebar name refers to.
    pub fn doc_path(&self, name: &str) -> String {
        format!("{}/{name}.md", self.content_dir.trim_end_matches('/'))
    }
}

/// What a single sidebar item turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Page(PageRecord),
    /// Symlink whose target is not a markdown file in the tree. Dropped.
    Unresolved,
}

/// One built version plus the markdown files under its content directory.
#[derive(Debug, Clone)]
pub struct AssembledVersion {
    pub build: VersionBuild,
    pub docs: Vec<TreeObject>,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Resolve a symlink's target text against the link's directory.
///
/// Returns `None` for absolute targets and targets that climb above the
/// repository root.
pub fn resolve_link(link_path: &str, target: &str) -> Option<String> {
    let target = target.trim_end_matches(['\n', '\r']);
    if target.is_empty() || target.starts_with('/') {
        return None;
    }

    let mut parts: Vec<&str> = link_path.split('/').collect();
    parts.pop();

    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    Some(parts.join("/"))
}

/// Site URL of a document: `base_path` plus the sidebar name, with a
/// trailing `index` segment dropped.
pub fn page_path(base_path: &str, name: &str) -> String {
    let trimmed = if name == "index" {
        ""
    } else {
        name.strip_suffix("/index")
            .map_or(name, |dir| &name[..dir.len() + 1])
    };
    format!("{base_path}{trimmed}")
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

fn doc_record(
    mut frontmatter: tagdocs_markdown::Frontmatter,
    content: String,
    path: String,
    file_path: String,
) -> DocRecord {
    for key in RESERVED_KEYS {
        if frontmatter.remove(*key).is_some() {
            debug!(%file_path, key, "front-matter key shadows a record field, ignored");
        }
    }
    DocRecord {
        frontmatter,
        content,
        path,
        file_path,
    }
}

/// Resolve one sidebar item at `tag`.
pub async fn resolve_item(
    ctx: &AssemblyContext,
    tree: &TreeIndex,
    tag: &str,
    base_path: &str,
    item: &SidebarItem,
) -> Result<ItemOutcome> {
    let name = match item {
        SidebarItem::Anchor { title, href } => {
            return Ok(ItemOutcome::Page(PageRecord::Anchor(AnchorRecord::new(
                title.clone(),
                href.clone(),
            ))));
        }
        SidebarItem::Doc(name) => name,
    };

    let candidate = ctx.doc_path(name);
    let Some(object) = tree.get(&candidate) else {
        return Err(TagdocsError::DocNotFound {
            tag: tag.to_string(),
            path: candidate,
        });
    };

    let source = if object.is_symlink() {
        let target = ctx.read(tag, &candidate).await?;
        match resolve_link(&candidate, &target) {
            Some(resolved) if tree.is_markdown_path(&resolved) => {
                trace!(link = %candidate, %resolved, "following symlink");
                resolved
            }
            _ => return Ok(ItemOutcome::Unresolved),
        }
    } else {
        candidate.clone()
    };

    let raw = ctx.read(tag, &source).await?;
    let parsed = ctx.parser.parse(&source, &raw)?;

    Ok(ItemOutcome::Page(PageRecord::Doc(doc_record(
        parsed.frontmatter,
        parsed.body,
        page_path(base_path, name),
        candidate,
    ))))
}

// ---------------------------------------------------------------------------
// Versions
// ---------------------------------------------------------------------------

/// Resolve every category of `sidebar` against `tree`.
///
/// All items of a category are awaited before the first error (in sidebar
/// order) is returned.
pub async fn assemble_contents(
    ctx: &AssemblyContext,
    version: &ResolvedVersion,
    sidebar: &SidebarCategories,
    tree: Arc<TreeIndex>,
) -> Result<Vec<ContentCategory>> {
    let base_path = version.base_path();
    let mut contents = Vec::with_capacity(sidebar.len());

    for category in sidebar.iter() {
        let mut handles = Vec::with_capacity(category.items.len());
        for item in &category.items {
            let ctx = ctx.clone();
            let tree = Arc::clone(&tree);
            let tag = version.tag.clone();
            let base_path = base_path.clone();
            let item = item.clone();
            handles.push(tokio::spawn(async move {
                resolve_item(&ctx, &tree, &tag, &base_path, &item).await
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(TagdocsError::Task(e.to_string())),
            });
        }

        let mut pages = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            match outcome? {
                ItemOutcome::Page(page) => pages.push(page),
                ItemOutcome::Unresolved => {}
            }
        }

        contents.push(ContentCategory {
            title: category.name.clone(),
            pages,
        });
    }

    Ok(contents)
}

/// Build one version: tree, sidebar, contents.
#[instrument(skip_all, fields(version = %version.id, tag = %version.tag))]
pub async fn assemble_version(
    ctx: &AssemblyContext,
    version: &ResolvedVersion,
) -> Result<AssembledVersion> {
    let tree = Arc::new(ctx.tree(&version.tag).await?);

    let sidebar = resolve_sidebar(ctx, version, &tree)
        .await?
        .ok_or_else(|| TagdocsError::ConfigNotFound {
        tag: version.tag.clone(),
    })?;

    let contents = assemble_contents(ctx, version, &sidebar, Arc::clone(&tree)).await?;
    let docs = tree.markdown_under(&ctx.content_dir);

    let build = VersionBuild {
        id: version.id.clone(),
        base_path: version.base_path(),
        contents,
        tag: version.tag.clone(),
        semver_match: version.semver_match.clone(),
    };
    debug!(pages = build.docs().count(), "version assembled");

    Ok(AssembledVersion { build, docs })
}

#[cfg(test)]
mod tests {
    use tagdocs_markdown::FrontmatterParser;
    use tagdocs_repository::MemoryRepository;

    use super::*;

    fn context(repo: Arc<MemoryRepository>, sidebar: &str) -> AssemblyContext {
        AssemblyContext {
            repo,
            parser: Arc::new(FrontmatterParser),
            reads: Arc::new(Semaphore::new(4)),
            root_dir: "docs".into(),
            content_dir: "docs/source".into(),
            current_sidebar: Arc::new(toml::from_str(sidebar).unwrap()),
        }
    }

    fn current() -> ResolvedVersion {
        ResolvedVersion {
            id: "2.0".into(),
            tag: "v2.0.0".into(),
            is_current: true,
            semver_match: Some("2.0.0".into()),
        }
    }

    fn older() -> ResolvedVersion {
        ResolvedVersion {
            id: "1.0".into(),
            tag: "v1.0.0".into(),
            is_current: false,
            semver_match: Some("1.0.0".into()),
        }
    }

    fn doc(page: &PageRecord) -> &DocRecord {
        match page {
            PageRecord::Doc(doc) => doc,
            PageRecord::Anchor(a) => panic!("expected doc, got anchor {a:?}"),
        }
    }

    #[test]
    fn page_paths_drop_index_segment() {
        assert_eq!(page_path("/", "index"), "/");
        assert_eq!(page_path("/v2.0.0/", "index"), "/v2.0.0/");
        assert_eq!(page_path("/", "guides/index"), "/guides/");
        assert_eq!(page_path("/", "guides/setup"), "/guides/setup");
        assert_eq!(page_path("/", "reindex"), "/reindex");
        assert_eq!(page_path("/", "guides/myindex"), "/guides/myindex");
    }

    #[test]
    fn link_resolution() {
        assert_eq!(
            resolve_link("docs/source/a.md", "b.md").as_deref(),
            Some("docs/source/b.md")
        );
        assert_eq!(
            resolve_link("docs/source/guide/a.md", "../../shared/x.md\n").as_deref(),
            Some("docs/shared/x.md")
        );
        assert_eq!(
            resolve_link("docs/source/a.md", "./nested/./b.md").as_deref(),
            Some("docs/source/nested/b.md")
        );
        assert_eq!(resolve_link("a.md", "../b.md"), None);
        assert_eq!(resolve_link("docs/a.md", "/etc/passwd"), None);
    }

    #[tokio::test]
    async fn assembles_docs_anchors_and_index() {
        let repo = Arc::new(
            MemoryRepository::new()
                .with_file("v2.0.0", "docs/source/index.md", "---\ntitle: Home\n---\nWelcome")
                .with_file(
                    "v2.0.0",
                    "docs/source/guides/setup.md",
                    "---\ntitle: Setup\ndescription: Install it\npath: /hijack\n---\nSteps",
                )
                .with_file("v2.0.0", "README.md", "not docs"),
        );
        let ctx = context(
            repo,
            r#"
Guides = ["guides/setup", { title = "Ref", href = "https://x" }]
null = ["index"]
"#,
        );

        let assembled = assemble_version(&ctx, &current()).await.unwrap();
        let build = &assembled.build;
        assert_eq!(build.base_path, "/");
        assert_eq!(build.contents.len(), 2);

        let home = doc(&build.contents[1].pages[0]);
        assert_eq!(build.contents[1].title, None);
        assert_eq!(home.path, "/");
        assert_eq!(home.content, "Welcome");
        assert_eq!(home.frontmatter_str("title"), Some("Home"));

        let guides = &build.contents[0];
        assert_eq!(guides.title.as_deref(), Some("Guides"));
        let setup = doc(&guides.pages[0]);
        assert_eq!(setup.path, "/guides/setup");
        assert_eq!(setup.file_path, "docs/source/guides/setup.md");
        assert!(!setup.frontmatter.contains_key("path"));
        assert_eq!(
            guides.pages[1],
            PageRecord::Anchor(AnchorRecord::new("Ref", "https://x"))
        );

        let docs: Vec<_> = assembled.docs.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(docs, vec!["docs/source/guides/setup.md", "docs/source/index.md"]);
    }

    #[tokio::test]
    async fn symlinks_follow_to_target_and_keep_link_path() {
        let repo = Arc::new(
            MemoryRepository::new()
                .with_file("v2.0.0", "docs/shared/intro.md", "---\ntitle: Shared\n---\nShared body")
                .with_symlink("v2.0.0", "docs/source/intro.md", "../shared/intro.md"),
        );
        let ctx = context(Arc::clone(&repo), r#"null = ["intro"]"#);

        let assembled = assemble_version(&ctx, &current()).await.unwrap();
        let intro = doc(&assembled.build.contents[0].pages[0]);
        assert_eq!(intro.content, "Shared body");
        assert_eq!(intro.file_path, "docs/source/intro.md");
        assert_eq!(intro.path, "/intro");
    }

    #[tokio::test]
    async fn dangling_symlink_is_dropped_without_reading_target() {
        let repo = Arc::new(
            MemoryRepository::new()
                .with_file("v2.0.0", "docs/source/a.md", "A")
                .with_symlink("v2.0.0", "docs/source/gone.md", "missing.md")
                .with_file("v2.0.0", "docs/source/c.md", "C"),
        );
        let ctx = context(Arc::clone(&repo), r#"Docs = ["a", "gone", "c"]"#);

        let assembled = assemble_version(&ctx, &current()).await.unwrap();
        let pages = &assembled.build.contents[0].pages;
        assert_eq!(pages.len(), 2);
        assert_eq!(doc(&pages[0]).content, "A");
        assert_eq!(doc(&pages[1]).content, "C");

        let read_paths: Vec<_> = repo.reads().into_iter().map(|(_, p)| p).collect();
        assert!(!read_paths.iter().any(|p| p == "docs/source/missing.md"));
    }

    #[tokio::test]
    async fn symlink_to_non_markdown_file_is_dropped() {
        let repo = Arc::new(
            MemoryRepository::new()
                .with_file("v2.0.0", "docs/notes.txt", "plain text")
                .with_symlink("v2.0.0", "docs/source/notes.md", "../notes.txt")
                .with_file("v2.0.0", "docs/source/c.md", "C"),
        );
        let ctx = context(Arc::clone(&repo), r#"Docs = ["notes", "c"]"#);

        let assembled = assemble_version(&ctx, &current()).await.unwrap();
        let pages = &assembled.build.contents[0].pages;
        assert_eq!(pages.len(), 1);
        assert_eq!(doc(&pages[0]).content, "C");

        let read_paths: Vec<_> = repo.reads().into_iter().map(|(_, p)| p).collect();
        assert!(!read_paths.iter().any(|p| p == "docs/notes.txt"));
    }

    #[tokio::test]
    async fn anchor_key_in_frontmatter_is_stripped() {
        let repo = Arc::new(MemoryRepository::new().with_file(
            "v2.0.0",
            "docs/source/a.md",
            "---\ntitle: A\nanchor: true\n---\nBody",
        ));
        let ctx = context(repo, r#"Docs = ["a"]"#);

        let assembled = assemble_version(&ctx, &current()).await.unwrap();
        let page = &assembled.build.contents[0].pages[0];
        assert!(!doc(page).frontmatter.contains_key("anchor"));

        let json = serde_json::to_string(page).unwrap();
        let back: PageRecord = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, PageRecord::Doc(_)));
    }

    #[tokio::test]
    async fn tree_listing_waits_for_a_read_permit() {
        let repo = Arc::new(MemoryRepository::new().with_file("v2.0.0", "docs/source/a.md", "A"));
        let mut ctx = context(Arc::clone(&repo), r#"Docs = ["a"]"#);
        ctx.reads = Arc::new(Semaphore::new(1));

        let held = Arc::clone(&ctx.reads).acquire_owned().await.unwrap();
        let task = {
            let ctx = ctx.clone();
            tokio::spawn(async move { assemble_version(&ctx, &current()).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!task.is_finished());
        assert_eq!(repo.tree_listings(), 0);

        drop(held);
        let assembled = task.await.unwrap().unwrap();
        assert_eq!(doc(&assembled.build.contents[0].pages[0]).content, "A");
    }

    #[tokio::test]
    async fn missing_primary_doc_fails_version() {
        let repo = Arc::new(MemoryRepository::new().with_file("v2.0.0", "docs/source/a.md", "A"));
        let ctx = context(repo, r#"Docs = ["a", "absent"]"#);

        let err = assemble_version(&ctx, &current()).await.unwrap_err();
        match &err {
            TagdocsError::DocNotFound { tag, path } => {
                assert_eq!(tag, "v2.0.0");
                assert_eq!(path, "docs/source/absent.md");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.is_version_scoped());
    }

    #[tokio::test]
    async fn older_version_without_config_is_config_not_found() {
        let repo = Arc::new(MemoryRepository::new().with_file("v1.0.0", "docs/source/a.md", "A"));
        let ctx = context(repo, r#"Docs = ["a"]"#);

        let err = assemble_version(&ctx, &older()).await.unwrap_err();
        assert!(matches!(err, TagdocsError::ConfigNotFound { .. }));
    }

    #[tokio::test]
    async fn older_version_uses_tagged_sidebar() {
        let repo = Arc::new(
            MemoryRepository::new()
                .with_file("v1.0.0", "docs/_config.yml", "sidebar_categories:\n  Start:\n    - index\n")
                .with_file("v1.0.0", "docs/source/index.md", "Old home"),
        );
        let ctx = context(repo, r#"Docs = ["something-else"]"#);

        let assembled = assemble_version(&ctx, &older()).await.unwrap();
        let build = &assembled.build;
        assert_eq!(build.base_path, "/v1.0/");
        assert_eq!(build.contents[0].title.as_deref(), Some("Start"));
        assert_eq!(doc(&build.contents[0].pages[0]).path, "/v1.0/");
    }

    #[tokio::test]
    async fn assembly_is_deterministic() {
        let mut repo = MemoryRepository::new();
        let mut names = Vec::new();
        for i in 0..20 {
            repo = repo.with_file("v2.0.0", format!("docs/source/p{i}.md"), format!("page {i}"));
            names.push(format!("\"p{i}\""));
        }
        let ctx = context(Arc::new(repo), &format!("Docs = [{}]", names.join(", ")));

        let first = assemble_version(&ctx, &current()).await.unwrap().build;
        let second = assemble_version(&ctx, &current()).await.unwrap().build;
        assert_eq!(first, second);
        let contents: Vec<_> = first.docs().map(|d| d.content.clone()).collect();
        assert_eq!(contents[0], "page 0");
        assert_eq!(contents[19], "page 19");
    }

    #[tokio::test]
    async fn bad_frontmatter_is_version_scoped() {
        let repo = Arc::new(
            MemoryRepository::new().with_file("v2.0.0", "docs/source/a.md", "---\n[broken\n---\n"),
        );
        let ctx = context(repo, r#"Docs = ["a"]"#);
        let err = assemble_version(&ctx, &current()).await.unwrap_err();
        assert!(matches!(err, TagdocsError::Frontmatter { .. }));
    }
}
