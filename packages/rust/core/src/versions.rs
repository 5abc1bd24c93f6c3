//! Version resolution: requested identifiers → concrete repository tags.
//!
//! Tags that look like releases (`v1.2.3`, `1.2.3`, or `<repo>@1.2.3` for
//! monorepos) are coerced to bare semantic versions. Each requested
//! identifier is read as a version requirement and resolved to the newest
//! matching release; anything that matches nothing is used verbatim as a
//! tag or branch name.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use semver::{Version, VersionReq};
use tracing::{debug, instrument};

use tagdocs_shared::{CURRENT_REVISION, CURRENT_VERSION_ID, ResolvedVersion, Result, TagdocsError};

/// `1.2.3` or `v1.2.3`.
static BARE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?(\d+)\.(\d+)\.(\d+)$").expect("bare tag regex"));

// ---------------------------------------------------------------------------
// Tag matching
// ---------------------------------------------------------------------------

/// Recognizes release tags and coerces them to bare versions.
#[derive(Debug, Clone)]
pub struct TagMatcher {
    scoped: Option<Regex>,
}

impl TagMatcher {
    /// Matcher for bare tags, plus `<repo_name>@X.Y.Z` when a name is given.
    pub fn new(repo_name: Option<&str>) -> Result<Self> {
        let scoped = repo_name
            .filter(|name| !name.is_empty())
            .map(|name| {
                Regex::new(&format!(r"^{}@(\d+)\.(\d+)\.(\d+)$", regex::escape(name))).map_err(
                    |e| TagdocsError::config(format!("invalid repo name '{name}': {e}")),
                )
            })
            .transpose()?;
        Ok(Self { scoped })
    }

    /// Bare version for a release tag, `None` for anything else.
    pub fn coerce(&self, tag: &str) -> Option<Version> {
        let caps = BARE_TAG_RE
            .captures(tag)
            .or_else(|| self.scoped.as_ref().and_then(|re| re.captures(tag)))?;
        Some(Version::new(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        ))
    }
}

/// Map each coerced version to its tag.
///
/// `tags` arrive most recent first, so when several tags coerce to the same
/// version (`v1.0.0` and `pkg@1.0.0`) the first one seen is kept.
pub fn build_tag_map(tags: &[String], matcher: &TagMatcher) -> BTreeMap<Version, String> {
    let mut map = BTreeMap::new();
    for tag in tags {
        let Some(version) = matcher.coerce(tag) else {
            continue;
        };
        if let Some(kept) = map.get(&version) {
            debug!(%version, kept = %kept, ignored = %tag, "duplicate release tag");
            continue;
        }
        map.insert(version, tag.clone());
    }
    map
}

// ---------------------------------------------------------------------------
// Requirements
// ---------------------------------------------------------------------------

/// Read an identifier as a version requirement.
///
/// Bare and partial versions match like npm partials (`1.2` is
/// `>=1.2.0, <1.3.0`, `v1.2.3` is exactly `1.2.3`); operators, wildcards,
/// and comma-separated ranges pass through. Space-separated comparators are
/// joined with commas. Returns `None` for names that are not requirements.
pub fn version_requirement(id: &str) -> Option<VersionReq> {
    let trimmed = id.trim();
    let unprefixed = match trimmed.strip_prefix('v') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        _ => trimmed,
    };
    if unprefixed.is_empty() {
        return None;
    }

    let is_plain = unprefixed.starts_with(|c: char| c.is_ascii_digit())
        && !unprefixed.contains(['x', 'X', '*', ',', ' '])
        && !unprefixed.contains("||");

    let text = if is_plain {
        format!("={unprefixed}")
    } else if unprefixed.contains(',') {
        unprefixed.to_string()
    } else {
        unprefixed.split_whitespace().collect::<Vec<_>>().join(", ")
    };

    VersionReq::parse(&text).ok()
}

/// Highest candidate satisfying `id`.
fn best_match<'a>(
    id: &str,
    candidates: &'a BTreeMap<Version, String>,
) -> Option<(&'a Version, &'a String)> {
    let req = version_requirement(id)?;
    candidates.iter().rev().find(|(v, _)| req.matches(v))
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolve requested versions against the repository's tags.
///
/// With nothing requested, a single current version is built from
/// [`CURRENT_REVISION`]. Otherwise identifiers are sorted descending (plain
/// string order); the first one is current. Output has one entry per
/// requested identifier, in that order.
#[instrument(skip_all, fields(requested = requested.len(), tags = tags.len()))]
pub fn resolve_versions(
    requested: &[String],
    tags: &[String],
    repo_name: Option<&str>,
) -> Result<Vec<ResolvedVersion>> {
    if requested.is_empty() {
        return Ok(vec![ResolvedVersion {
            id: CURRENT_VERSION_ID.to_string(),
            tag: CURRENT_REVISION.to_string(),
            is_current: true,
            semver_match: None,
        }]);
    }

    let matcher = TagMatcher::new(repo_name)?;
    let candidates = build_tag_map(tags, &matcher);
    debug!(releases = candidates.len(), "release tags indexed");

    let mut ids = requested.to_vec();
    ids.sort_by(|a, b| b.cmp(a));

    let resolved = ids
        .into_iter()
        .enumerate()
        .map(|(i, id)| {
            let (tag, semver_match) = match best_match(&id, &candidates) {
                Some((version, tag)) => (tag.clone(), Some(version.to_string())),
                None => {
                    debug!(%id, "no release matches, using identifier as tag");
                    (id.clone(), None)
                }
            };
            ResolvedVersion {
                id,
                tag,
                is_current: i == 0,
                semver_match,
            }
        })
        .collect();

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn nothing_requested_builds_current_revision() {
        let resolved = resolve_versions(&[], &strings(&["v1.0.0"]), None).unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, "current");
        assert_eq!(resolved[0].tag, "HEAD");
        assert!(resolved[0].is_current);
        assert_eq!(resolved[0].base_path(), "/");
    }

    #[test]
    fn partial_versions_pick_highest_patch() {
        let tags = strings(&["v1.3.0", "v1.2.10", "v1.2.9", "v1.2.0", "v0.9.0"]);
        let resolved = resolve_versions(&strings(&["1.2", "1.3"]), &tags, None).unwrap();

        assert_eq!(resolved[0].id, "1.3");
        assert!(resolved[0].is_current);
        assert_eq!(resolved[0].tag, "v1.3.0");

        assert_eq!(resolved[1].id, "1.2");
        assert!(!resolved[1].is_current);
        assert_eq!(resolved[1].tag, "v1.2.10");
        assert_eq!(resolved[1].semver_match.as_deref(), Some("1.2.10"));
        assert_eq!(resolved[1].base_path(), "/v1.2/");
    }

    #[test]
    fn unmatched_identifier_is_used_verbatim() {
        let tags = strings(&["v1.0.0"]);
        let resolved = resolve_versions(&strings(&["main", "4.0"]), &tags, None).unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|r| r.semver_match.is_none()));
        let main = resolved.iter().find(|r| r.id == "main").unwrap();
        assert_eq!(main.tag, "main");
        let four = resolved.iter().find(|r| r.id == "4.0").unwrap();
        assert_eq!(four.tag, "4.0");
    }

    #[test]
    fn cardinality_and_descending_order() {
        let tags = strings(&["v3.0.0", "v2.0.0", "v1.0.0"]);
        let requested = strings(&["1.0.0", "3.0.0", "2.0.0"]);
        let resolved = resolve_versions(&requested, &tags, None).unwrap();

        let ids: Vec<_> = resolved.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["3.0.0", "2.0.0", "1.0.0"]);
        assert_eq!(resolved.iter().filter(|r| r.is_current).count(), 1);
        assert_eq!(resolved[1].base_path(), "/v2.0.0/");
    }

    #[test]
    fn scoped_monorepo_tags() {
        let tags = strings(&["client@2.1.0", "server@9.0.0", "client@2.0.3"]);
        let resolved = resolve_versions(&strings(&["2"]), &tags, Some("client")).unwrap();
        assert_eq!(resolved[0].tag, "client@2.1.0");

        let unscoped = resolve_versions(&strings(&["9"]), &tags, Some("client")).unwrap();
        assert_eq!(unscoped[0].tag, "9");
    }

    #[test]
    fn duplicate_versions_keep_first_tag() {
        let matcher = TagMatcher::new(Some("pkg")).unwrap();
        let map = build_tag_map(&strings(&["pkg@1.0.0", "v1.0.0", "1.0.0"]), &matcher);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&Version::new(1, 0, 0)], "pkg@1.0.0");
    }

    #[test]
    fn non_release_tags_are_ignored() {
        let matcher = TagMatcher::new(None).unwrap();
        assert!(matcher.coerce("v1.0.0-beta.1").is_none());
        assert!(matcher.coerce("release-1.0.0").is_none());
        assert!(matcher.coerce("pkg@1.0.0").is_none());
        assert_eq!(matcher.coerce("v2.3.4"), Some(Version::new(2, 3, 4)));
    }

    #[test]
    fn requirement_forms() {
        let v = |s: &str| Version::parse(s).unwrap();

        let exact = version_requirement("v1.2.3").unwrap();
        assert!(exact.matches(&v("1.2.3")));
        assert!(!exact.matches(&v("1.2.4")));

        let minor = version_requirement("1.2").unwrap();
        assert!(minor.matches(&v("1.2.7")));
        assert!(!minor.matches(&v("1.3.0")));

        let caret = version_requirement("^1.0").unwrap();
        assert!(caret.matches(&v("1.9.0")));

        let wildcard = version_requirement("2.x").unwrap();
        assert!(wildcard.matches(&v("2.5.1")));

        let range = version_requirement(">=1.0 <2.0").unwrap();
        assert!(range.matches(&v("1.5.0")));
        assert!(!range.matches(&v("2.0.0")));

        assert!(version_requirement("main").is_none());
        assert!(version_requirement("vnext").is_none());
        assert!(version_requirement("").is_none());
    }
}
