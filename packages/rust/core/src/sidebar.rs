//! Per-version sidebar lookup.
//!
//! The current version uses the navigation from `tagdocs.toml`. Older
//! versions carry their own sidebar in a config file under the docs root of
//! the tagged tree; the first recognized file present wins.

use serde_yaml::Value;
use tracing::{debug, warn};

use tagdocs_repository::TreeIndex;
use tagdocs_shared::{ResolvedVersion, Result, SidebarCategories, TagdocsError};

use crate::content::AssemblyContext;

/// YAML key holding the sidebar in `_config.yml`.
const SIDEBAR_KEY: &str = "sidebar_categories";

/// How a config file is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML with a top-level `sidebar_categories` mapping.
    Yaml,
    /// Executable site config. Recognized but never evaluated.
    Script,
}

/// Recognized config files, in lookup order.
pub const CONFIG_FILES: &[(&str, ConfigFormat)] = &[
    ("gatsby-config.js", ConfigFormat::Script),
    ("_config.yml", ConfigFormat::Yaml),
];

fn join_root(root_dir: &str, name: &str) -> String {
    let root = root_dir.trim_end_matches('/');
    if root.is_empty() {
        name.to_string()
    } else {
        format!("{root}/{name}")
    }
}

/// First recognized config file present in `tree`.
pub fn find_config(tree: &TreeIndex, root_dir: &str) -> Option<(String, ConfigFormat)> {
    CONFIG_FILES.iter().find_map(|(name, format)| {
        let path = join_root(root_dir, name);
        tree.contains(&path).then_some((path, *format))
    })
}

/// Extract the sidebar from YAML config text read at `tag`.
///
/// An empty document or a missing key is `None`. YAML that does not parse
/// is a `Parse` error; a `sidebar_categories` value that is not a mapping of
/// lists is `SidebarShape`, which only drops this version.
pub fn parse_yaml_sidebar(tag: &str, path: &str, text: &str) -> Result<Option<SidebarCategories>> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    let doc: Value = serde_yaml::from_str(text)
        .map_err(|e| TagdocsError::parse(format!("{path}: {e}")))?;

    let Some(section) = doc.get(SIDEBAR_KEY) else {
        return Ok(None);
    };
    if section.is_null() {
        return Ok(None);
    }

    let sidebar: SidebarCategories =
        serde_yaml::from_value(section.clone()).map_err(|e| TagdocsError::SidebarShape {
            tag: tag.to_string(),
            path: path.to_string(),
            message: format!("{SIDEBAR_KEY}: {e}"),
        })?;
    Ok(Some(sidebar))
}

/// Sidebar for `version`, or `None` when the tagged tree has none.
///
/// The current version never touches the repository.
pub async fn resolve_sidebar(
    ctx: &AssemblyContext,
    version: &ResolvedVersion,
    tree: &TreeIndex,
) -> Result<Option<SidebarCategories>> {
    let current = ctx.current_sidebar.as_ref();
    let root_dir = ctx.root_dir.as_str();
    if version.is_current {
        if current.is_empty() {
            warn!(version = %version.id, "current version has no sidebar categories");
        }
        return Ok(Some(current.clone()));
    }

    let Some((path, format)) = find_config(tree, root_dir) else {
        debug!(tag = %version.tag, root_dir, "no sidebar config in tree");
        return Ok(None);
    };

    match format {
        ConfigFormat::Script => {
            debug!(tag = %version.tag, %path, "script config is not supported");
            Ok(None)
        }
        ConfigFormat::Yaml => {
            let text = ctx.read(&version.tag, &path).await?;
            let sidebar = parse_yaml_sidebar(&version.tag, &path, &text)?;
            debug!(
                tag = %version.tag,
                %path,
                categories = sidebar.as_ref().map_or(0, SidebarCategories::len),
                "sidebar loaded"
            );
            Ok(sidebar)
        }
    }
}
