//! Core domain types for versioned documentation builds.

use std::fmt;

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Tree mode git uses for symbolic links.
pub const SYMLINK_MODE: &str = "120000";

/// Revision built when no versions are requested.
pub const CURRENT_REVISION: &str = "HEAD";

/// Version id used when no versions are requested.
pub const CURRENT_VERSION_ID: &str = "current";

/// Category key that stands for "no title".
const UNTITLED_CATEGORY: &str = "null";

// ---------------------------------------------------------------------------
// TreeObject
// ---------------------------------------------------------------------------

/// One entry of a repository tree listing at a specific revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeObject {
    /// File mode as printed by the tree listing (e.g. `100644`, `120000`).
    pub mode: String,
    /// Repository-relative path.
    pub path: String,
}

impl TreeObject {
    pub fn is_symlink(&self) -> bool {
        self.mode == SYMLINK_MODE
    }

    pub fn is_markdown(&self) -> bool {
        self.path.ends_with(".md")
    }
}

// ---------------------------------------------------------------------------
// ResolvedVersion
// ---------------------------------------------------------------------------

/// A requested version matched to a concrete repository tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedVersion {
    /// The identifier the caller asked for (e.g. `2.6`, `^1.0`, `main`).
    pub id: String,
    /// Tag (or revision) the version is built from.
    pub tag: String,
    /// Whether this is the current version, served at `/`.
    pub is_current: bool,
    /// Bare semantic version the identifier matched, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semver_match: Option<String>,
}

impl ResolvedVersion {
    /// URL prefix for every page of this version.
    pub fn base_path(&self) -> String {
        if self.is_current {
            "/".to_string()
        } else {
            format!("/v{}/", self.id)
        }
    }
}

// ---------------------------------------------------------------------------
// Sidebar
// ---------------------------------------------------------------------------

/// One navigation entry.
///
/// Strings and other scalars (YAML reads `- 404` as a number) are document
/// references. Every other shape is an anchor; a mapping supplies `title`
/// and `href`, and whichever is missing is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SidebarItem {
    /// Document reference relative to the content directory, without `.md`.
    Doc(String),
    /// Link that never produces a page.
    Anchor { title: String, href: String },
}

impl SidebarItem {
    fn anchor(title: Option<String>, href: Option<String>) -> Self {
        Self::Anchor {
            title: title.unwrap_or_default(),
            href: href.unwrap_or_default(),
        }
    }
}

/// Scalar rendered as text; `None` for null and nested values.
struct LooseText(Option<String>);

impl<'de> Deserialize<'de> for LooseText {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TextVisitor;

        impl<'de> Visitor<'de> for TextVisitor {
            type Value = LooseText;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("any value")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(LooseText(Some(v.to_string())))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(LooseText(Some(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(LooseText(Some(v.to_string())))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(LooseText(Some(v.to_string())))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(LooseText(Some(v.to_string())))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(LooseText(Some(v.to_string())))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(LooseText(None))
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(LooseText(None))
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
                LooseText::deserialize(d)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(LooseText(None))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
                Ok(LooseText(None))
            }
        }

        deserializer.deserialize_any(TextVisitor)
    }
}

impl<'de> Deserialize<'de> for SidebarItem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ItemVisitor;

        impl<'de> Visitor<'de> for ItemVisitor {
            type Value = SidebarItem;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a document name or an anchor")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(SidebarItem::Doc(v.to_string()))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(SidebarItem::Doc(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(SidebarItem::Doc(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(SidebarItem::Doc(v.to_string()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(SidebarItem::Doc(v.to_string()))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(SidebarItem::Doc(v.to_string()))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(SidebarItem::anchor(None, None))
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(SidebarItem::anchor(None, None))
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
                SidebarItem::deserialize(d)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
                while seq.next_element::<IgnoredAny>()?.is_some() {}
                Ok(SidebarItem::anchor(None, None))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut title = None;
                let mut href = None;
                while let Some(key) = map.next_key::<LooseText>()? {
                    match key.0.as_deref() {
                        Some("title") => title = map.next_value::<LooseText>()?.0,
                        Some("href") => href = map.next_value::<LooseText>()?.0,
                        _ => {
                            map.next_value::<IgnoredAny>()?;
                        }
                    }
                }
                Ok(SidebarItem::anchor(title, href))
            }
        }

        deserializer.deserialize_any(ItemVisitor)
    }
}

/// A named, ordered group of sidebar items. `name` is `None` when untitled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarCategory {
    pub name: Option<String>,
    pub items: Vec<SidebarItem>,
}

/// Ordered sidebar categories for one version of the docs.
///
/// Source order is kept, whatever map type the config format deserializes
/// into. A key of `null` (YAML null or the literal string) is untitled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SidebarCategories(pub Vec<SidebarCategory>);

impl SidebarCategories {
    pub fn iter(&self) -> impl Iterator<Item = &SidebarCategory> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

fn canonical_category(name: Option<String>) -> Option<String> {
    name.filter(|n| n != UNTITLED_CATEGORY)
}

/// Map key that accepts strings, numbers, booleans, and null.
struct CategoryKey(Option<String>);

impl<'de> Deserialize<'de> for CategoryKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct KeyVisitor;

        impl Visitor<'_> for KeyVisitor {
            type Value = CategoryKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a category name or null")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(CategoryKey(Some(v.to_string())))
            }

            fn visit_string<E: de::Error>(self, v: String) -> Result<Self::Value, E> {
                Ok(CategoryKey(Some(v)))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(CategoryKey(Some(v.to_string())))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(CategoryKey(Some(v.to_string())))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(CategoryKey(Some(v.to_string())))
            }

            fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
                Ok(CategoryKey(Some(v.to_string())))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(CategoryKey(None))
            }

            fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(CategoryKey(None))
            }
        }

        deserializer.deserialize_any(KeyVisitor)
    }
}

impl<'de> Deserialize<'de> for SidebarCategories {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CategoriesVisitor;

        impl<'de> Visitor<'de> for CategoriesVisitor {
            type Value = SidebarCategories;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of category name to sidebar items")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut categories = Vec::new();
                while let Some((key, items)) = map.next_entry::<CategoryKey, Vec<SidebarItem>>()? {
                    categories.push(SidebarCategory {
                        name: canonical_category(key.0),
                        items,
                    });
                }
                Ok(SidebarCategories(categories))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
                Ok(SidebarCategories::default())
            }
        }

        deserializer.deserialize_map(CategoriesVisitor)
    }
}

impl Serialize for SidebarCategories {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for category in &self.0 {
            let key = category.name.as_deref().unwrap_or(UNTITLED_CATEGORY);
            map.serialize_entry(key, &category.items)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Page records
// ---------------------------------------------------------------------------

/// A resolved document page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocRecord {
    /// Front-matter keys, flattened into the record.
    #[serde(flatten)]
    pub frontmatter: serde_json::Map<String, serde_json::Value>,
    /// Markdown body without the front-matter block.
    pub content: String,
    /// Site URL of the page.
    pub path: String,
    /// Repository path the sidebar referenced (never the symlink target).
    pub file_path: String,
}

impl DocRecord {
    /// String-valued front-matter field.
    pub fn frontmatter_str(&self, key: &str) -> Option<&str> {
        self.frontmatter.get(key).and_then(serde_json::Value::as_str)
    }
}

/// A sidebar link that is shown in navigation but never rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    /// Link target.
    pub path: String,
    pub title: String,
    /// Always `true`; lets downstream consumers tell anchors apart.
    pub anchor: bool,
}

impl AnchorRecord {
    pub fn new(title: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            path: href.into(),
            title: title.into(),
            anchor: true,
        }
    }
}

/// One entry of a category's page list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageRecord {
    Anchor(AnchorRecord),
    Doc(DocRecord),
}

/// Resolved pages of one sidebar category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentCategory {
    /// `None` for the untitled category.
    pub title: Option<String>,
    pub pages: Vec<PageRecord>,
}

// ---------------------------------------------------------------------------
// VersionBuild
// ---------------------------------------------------------------------------

/// Everything assembled for one version of the docs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionBuild {
    pub id: String,
    pub base_path: String,
    pub contents: Vec<ContentCategory>,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semver_match: Option<String>,
}

impl VersionBuild {
    pub fn is_current(&self) -> bool {
        self.base_path == "/"
    }

    /// Document records across all categories, in navigation order.
    pub fn docs(&self) -> impl Iterator<Item = &DocRecord> {
        self.contents
            .iter()
            .flat_map(|c| c.pages.iter())
            .filter_map(|p| match p {
                PageRecord::Doc(doc) => Some(doc),
                PageRecord::Anchor(_) => None,
            })
    }
}
