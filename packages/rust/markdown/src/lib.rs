//! Front-matter extraction for markdown documents.
//!
//! Documents may open with a YAML block fenced by `---` lines. The block is
//! parsed into a JSON object map so it can be merged into page records; the
//! rest of the text is the body. Rendering markdown is left to the consumer
//! of the emitted page instructions.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;
use tracing::trace;

use tagdocs_shared::{Result, TagdocsError};

/// Front-matter key/value pairs.
pub type Frontmatter = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A document split into front-matter and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    pub frontmatter: Frontmatter,
    pub body: String,
}

/// Turns raw document text into front-matter and body.
pub trait DocumentParser: Send + Sync {
    /// Parse `raw`. `path` is only used for error messages.
    fn parse(&self, path: &str, raw: &str) -> Result<ParsedDocument>;
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Matches a leading `---` fenced block; group 1 is the YAML (absent when empty).
static FRONTMATTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\A\x{FEFF}?---[ \t]*\r?\n(?:(.*?)\r?\n)?---[ \t]*(?:\r?\n|\z)")
        .expect("front-matter regex")
});

/// YAML front-matter parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrontmatterParser;

impl DocumentParser for FrontmatterParser {
    fn parse(&self, path: &str, raw: &str) -> Result<ParsedDocument> {
        let Some(caps) = FRONTMATTER_RE.captures(raw) else {
            return Ok(ParsedDocument {
                frontmatter: Frontmatter::new(),
                body: raw.to_string(),
            });
        };

        let block_end = caps.get(0).map_or(0, |m| m.end());
        let yaml = caps.get(1).map_or("", |m| m.as_str());
        let frontmatter = parse_yaml_block(path, yaml)?;
        trace!(path, keys = frontmatter.len(), "front-matter parsed");

        Ok(ParsedDocument {
            frontmatter,
            body: raw[block_end..].to_string(),
        })
    }
}

fn parse_yaml_block(path: &str, yaml: &str) -> Result<Frontmatter> {
    if yaml.trim().is_empty() {
        return Ok(Frontmatter::new());
    }

    let value: YamlValue = serde_yaml::from_str(yaml).map_err(|e| TagdocsError::Frontmatter {
        path: path.to_string(),
        message: e.to_string(),
    })?;

    match yaml_to_json(value) {
        JsonValue::Object(map) => Ok(map),
        JsonValue::Null => Ok(Frontmatter::new()),
        other => Err(TagdocsError::Frontmatter {
            path: path.to_string(),
            message: format!("expected a mapping, found {other}"),
        }),
    }
}

/// Convert YAML into JSON. Non-string mapping keys (`2019: notes`) become
/// their text form and tags are dropped.
fn yaml_to_json(value: YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::from(i)
            } else if let Some(u) = n.as_u64() {
                JsonValue::from(u)
            } else {
                n.as_f64().map_or(JsonValue::Null, JsonValue::from)
            }
        }
        YamlValue::String(s) => JsonValue::String(s),
        YamlValue::Sequence(items) => items.into_iter().map(yaml_to_json).collect(),
        YamlValue::Mapping(map) => JsonValue::Object(
            map.into_iter()
                .map(|(k, v)| (key_text(k), yaml_to_json(v)))
                .collect(),
        ),
        YamlValue::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn key_text(key: YamlValue) -> String {
    match key {
        YamlValue::String(s) => s,
        YamlValue::Null => "null".to_string(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<ParsedDocument> {
        FrontmatterParser.parse("docs/source/test.md", raw)
    }

    #[test]
    fn splits_frontmatter_and_body() {
        let doc = parse("---\ntitle: Intro\ndescription: Start here\n---\n# Hello\n").unwrap();
        assert_eq!(doc.frontmatter["title"], "Intro");
        assert_eq!(doc.frontmatter["description"], "Start here");
        assert_eq!(doc.body, "# Hello\n");
    }

    #[test]
    fn no_frontmatter_keeps_whole_text() {
        let doc = parse("# Title\n\n---\n\nafter a rule").unwrap();
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.body, "# Title\n\n---\n\nafter a rule");
    }

    #[test]
    fn empty_block() {
        let doc = parse("---\n---\nBody").unwrap();
        assert!(doc.frontmatter.is_empty());
        assert_eq!(doc.body, "Body");
    }

    #[test]
    fn crlf_line_endings() {
        let doc = parse("---\r\ntitle: Windows\r\n---\r\nBody\r\n").unwrap();
        assert_eq!(doc.frontmatter["title"], "Windows");
        assert_eq!(doc.body, "Body\r\n");
    }

    #[test]
    fn nested_values_survive() {
        let doc = parse("---\ntitle: API\ntags:\n  - core\n  - client\norder: 3\n---\n").unwrap();
        assert_eq!(doc.frontmatter["tags"], serde_json::json!(["core", "client"]));
        assert_eq!(doc.frontmatter["order"], 3);
        assert_eq!(doc.body, "");
    }

    #[test]
    fn non_string_keys_are_stringified() {
        let doc = parse("---\ntitle: Changelog\n2019: notes\ntrue: yes\nnested:\n  1: one\n---\nBody")
            .unwrap();
        assert_eq!(doc.frontmatter["2019"], "notes");
        assert_eq!(doc.frontmatter["true"], "yes");
        assert_eq!(doc.frontmatter["nested"]["1"], "one");
        assert_eq!(doc.frontmatter["title"], "Changelog");
    }

    #[test]
    fn malformed_yaml_is_frontmatter_error() {
        let err = parse("---\ntitle: [unclosed\n---\nBody").unwrap_err();
        assert!(matches!(err, TagdocsError::Frontmatter { .. }));
        assert!(err.to_string().contains("docs/source/test.md"));
    }

    #[test]
    fn scalar_block_is_rejected() {
        let err = parse("---\njust a string\n---\nBody").unwrap_err();
        assert!(err.is_version_scoped());
    }
}
