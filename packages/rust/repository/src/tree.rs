//! Tree listing parsing and per-revision path index.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use tagdocs_shared::{Result, TreeObject};

use crate::Repository;

/// Parse a raw tree listing into records.
///
/// Each line is `<mode> <type> <id>\t<path>`: the mode is everything before
/// the first space and the path everything after the last tab. Modes are
/// not validated. An empty listing yields a single record with empty fields,
/// so callers should check for empty output first (see [`load_tree`]).
pub fn index_tree(raw: &str) -> Vec<TreeObject> {
    raw.split('\n')
        .map(|line| {
            let mode = line.split_once(' ').map_or(line, |(mode, _)| mode);
            let path = line.rsplit_once('\t').map_or(line, |(_, path)| path);
            TreeObject {
                mode: mode.to_string(),
                path: path.to_string(),
            }
        })
        .collect()
}

/// Path lookup over one revision's tree.
#[derive(Debug, Clone, Default)]
pub struct TreeIndex {
    objects: Vec<TreeObject>,
    by_path: HashMap<String, usize>,
    markdown: HashSet<String>,
}

impl TreeIndex {
    pub fn new(objects: Vec<TreeObject>) -> Self {
        let by_path = objects
            .iter()
            .enumerate()
            .map(|(i, o)| (o.path.clone(), i))
            .collect();
        let markdown = objects
            .iter()
            .filter(|o| o.is_markdown())
            .map(|o| o.path.clone())
            .collect();
        Self {
            objects,
            by_path,
            markdown,
        }
    }

    /// Index a raw listing, treating blank output as an empty tree.
    pub fn from_listing(raw: &str) -> Self {
        let trimmed = raw.trim_end();
        if trimmed.is_empty() {
            return Self::default();
        }
        Self::new(index_tree(trimmed))
    }

    pub fn get(&self, path: &str) -> Option<&TreeObject> {
        self.by_path.get(path).map(|&i| &self.objects[i])
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// Whether `path` is a known markdown file in this tree.
    pub fn is_markdown_path(&self, path: &str) -> bool {
        self.markdown.contains(path)
    }

    /// Markdown objects under `dir`, in listing order.
    pub fn markdown_under(&self, dir: &str) -> Vec<TreeObject> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.objects
            .iter()
            .filter(|o| o.is_markdown() && o.path.starts_with(&prefix))
            .cloned()
            .collect()
    }

    pub fn objects(&self) -> &[TreeObject] {
        &self.objects
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }
}

/// List and index the tree at `revision`.
pub async fn load_tree(repo: &dyn Repository, revision: &str) -> Result<TreeIndex> {
    let raw = repo.list_tree(revision).await?;
    let index = TreeIndex::from_listing(&raw);
    debug!(revision, entries = index.len(), "tree indexed");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_line() {
        let objects = index_tree("100644 blob abcd\tdocs/intro.md");
        assert_eq!(
            objects,
            vec![TreeObject {
                mode: "100644".into(),
                path: "docs/intro.md".into()
            }]
        );
    }

    #[test]
    fn path_may_contain_spaces() {
        let objects = index_tree("100644 blob abcd\tdocs/my file.md\n120000 blob ef01\tdocs/link.md");
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].path, "docs/my file.md");
        assert_eq!(objects[1].mode, "120000");
        assert!(objects[1].is_symlink());
    }

    #[test]
    fn empty_listing_yields_degenerate_record() {
        let objects = index_tree("");
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].path, "");
    }

    #[test]
    fn from_listing_guards_blank_output() {
        assert!(TreeIndex::from_listing("").is_empty());
        assert!(TreeIndex::from_listing("\n").is_empty());

        let index = TreeIndex::from_listing("100644 blob a\tdocs/source/a.md\n");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn index_lookups() {
        let raw = "100644 blob a\tdocs/_config.yml\n\
                   100644 blob b\tdocs/source/index.md\n\
                   120000 blob c\tdocs/source/link.md\n\
                   100644 blob d\tREADME.md";
        let index = TreeIndex::from_listing(raw);

        assert!(index.contains("docs/_config.yml"));
        assert!(index.get("docs/source/link.md").expect("link").is_symlink());
        assert!(index.is_markdown_path("README.md"));
        assert!(!index.is_markdown_path("docs/_config.yml"));

        let docs: Vec<_> = index
            .markdown_under("docs/source/")
            .into_iter()
            .map(|o| o.path)
            .collect();
        assert_eq!(docs, vec!["docs/source/index.md", "docs/source/link.md"]);
    }
}
