//! Page emission: built versions → one instruction per document page.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use tagdocs_shared::{PageRecord, Result, TagdocsError, TreeObject, VersionBuild};

/// Everything a rendered page gets to see.
#[derive(Debug, Clone, Serialize)]
pub struct PageContext {
    pub content: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// The version this page belongs to.
    pub version: Arc<VersionBuild>,
    pub file_path: String,
    /// Markdown files under the content directory of the current version.
    pub docs: Arc<[TreeObject]>,
    /// Every successfully built version, in build order.
    pub versions: Arc<[Arc<VersionBuild>]>,
}

/// A request to render one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageInstruction {
    pub path: String,
    pub component: String,
    pub context: PageContext,
}

/// Receives page instructions. Never renders anything itself.
pub trait PageSink: Send {
    fn create_page(&mut self, page: PageInstruction) -> Result<()>;

    /// Flush buffered output. Called once after the last page.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Counts from one emission pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub pages: usize,
    pub anchors_skipped: usize,
}

/// Issue one instruction per document record across `versions`.
///
/// Anchor records never become pages.
pub fn emit_pages(
    versions: &[Arc<VersionBuild>],
    docs: Arc<[TreeObject]>,
    component: &str,
    sink: &mut dyn PageSink,
) -> Result<EmitStats> {
    let all: Arc<[Arc<VersionBuild>]> = versions.iter().cloned().collect();
    let mut stats = EmitStats::default();

    for version in versions {
        for category in &version.contents {
            for page in &category.pages {
                let doc = match page {
                    PageRecord::Anchor(_) => {
                        stats.anchors_skipped += 1;
                        continue;
                    }
                    PageRecord::Doc(doc) => doc,
                };

                sink.create_page(PageInstruction {
                    path: doc.path.clone(),
                    component: component.to_string(),
                    context: PageContext {
                        content: doc.content.clone(),
                        title: doc.frontmatter_str("title").map(str::to_string),
                        description: doc.frontmatter_str("description").map(str::to_string),
                        version: Arc::clone(version),
                        file_path: doc.file_path.clone(),
                        docs: Arc::clone(&docs),
                        versions: Arc::clone(&all),
                    },
                })?;
                stats.pages += 1;
            }
        }
        debug!(version = %version.id, "version emitted");
    }

    sink.finish()?;
    info!(pages = stats.pages, anchors = stats.anchors_skipped, "pages emitted");
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Writes one JSON object per line.
pub struct JsonLinesSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    /// Create (or truncate) `path`, making parent directories as needed.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TagdocsError::io(parent, e))?;
        }
        let file = File::create(&path).map_err(|e| TagdocsError::io(&path, e))?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageSink for JsonLinesSink {
    fn create_page(&mut self, page: PageInstruction) -> Result<()> {
        serde_json::to_writer(&mut self.writer, &page)
            .map_err(|e| TagdocsError::Sink(format!("{}: {e}", page.path)))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| TagdocsError::io(&self.path, e))
    }

    fn finish(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| TagdocsError::io(&self.path, e))
    }
}

/// Collects instructions in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub pages: Vec<PageInstruction>,
}

impl PageSink for MemorySink {
    fn create_page(&mut self, page: PageInstruction) -> Result<()> {
        self.pages.push(page);
        Ok(())
    }
}
