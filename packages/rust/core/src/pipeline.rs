//! End-to-end `build` pipeline: tags → versions → contents → page instructions.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tracing::{info, instrument, warn};

use tagdocs_markdown::DocumentParser;
use tagdocs_repository::Repository;
use tagdocs_shared::{AppConfig, ResolvedVersion, Result, TagdocsError, TreeObject, VersionBuild};

use crate::content::{AssembledVersion, AssemblyContext, assemble_version};
use crate::emitter::{PageSink, emit_pages};
use crate::versions::resolve_versions;

/// Result of the `build` pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    /// Ids of the versions that produced pages, in build order.
    pub versions_built: Vec<String>,
    /// Ids of the versions dropped by a version-scoped failure.
    pub versions_skipped: Vec<String>,
    pub pages_emitted: usize,
    pub anchors_skipped: usize,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a version finished assembling.
    fn version_built(&self, id: &str, current: usize, total: usize);
    /// Called when a version is dropped from the build.
    fn version_skipped(&self, id: &str, reason: &TagdocsError);
    /// Called when the pipeline completes.
    fn done(&self, summary: &BuildSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn version_built(&self, _id: &str, _current: usize, _total: usize) {}
    fn version_skipped(&self, _id: &str, _reason: &TagdocsError) {}
    fn done(&self, _summary: &BuildSummary) {}
}

/// Sync remote state (when configured) and resolve requested versions.
#[instrument(skip_all, fields(backend = repo.name()))]
pub async fn prepare_versions(
    config: &AppConfig,
    repo: &dyn Repository,
) -> Result<Vec<ResolvedVersion>> {
    if let Some(remote) = &config.source.remote {
        repo.ensure_remote(&remote.name, &remote.url).await?;
        repo.fetch().await?;
        info!(remote = %remote.name, "remote fetched");
    }

    let tags = if config.site.versions.is_empty() {
        Vec::new()
    } else {
        repo.list_tags().await?
    };

    let versions = resolve_versions(
        &config.site.versions,
        &tags,
        config.site.repo_name.as_deref(),
    )?;
    for v in &versions {
        info!(
            id = %v.id,
            tag = %v.tag,
            current = v.is_current,
            matched = v.semver_match.as_deref().unwrap_or("-"),
            "version resolved"
        );
    }
    Ok(versions)
}

/// Assemble every version concurrently.
///
/// Slots keep `versions` order. A version-scoped failure leaves its slot
/// `None`; any other failure aborts once every build has finished.
pub async fn build_versions(
    ctx: &AssemblyContext,
    versions: &[ResolvedVersion],
    progress: &dyn ProgressReporter,
) -> Result<Vec<Option<AssembledVersion>>> {
    let mut handles = Vec::with_capacity(versions.len());
    for version in versions {
        let ctx = ctx.clone();
        let version = version.clone();
        handles.push(tokio::spawn(async move {
            assemble_version(&ctx, &version).await
        }));
    }

    let total = versions.len();
    let mut slots = Vec::with_capacity(total);
    let mut fatal = None;

    for (i, (version, handle)) in versions.iter().zip(handles).enumerate() {
        let outcome = handle
            .await
            .unwrap_or_else(|e| Err(TagdocsError::Task(e.to_string())));
        match outcome {
            Ok(assembled) => {
                progress.version_built(&version.id, i + 1, total);
                slots.push(Some(assembled));
            }
            Err(e) if e.is_version_scoped() => {
                warn!(version = %version.id, tag = %version.tag, error = %e, "skipping version");
                progress.version_skipped(&version.id, &e);
                slots.push(None);
            }
            Err(e) => {
                if fatal.is_none() {
                    fatal = Some(e);
                }
                slots.push(None);
            }
        }
    }

    match fatal {
        Some(e) => Err(e),
        None => Ok(slots),
    }
}

/// Run the full `build` pipeline.
///
/// 1. Sync remote and resolve versions
/// 2. Assemble each version (concurrently)
/// 3. Emit one page instruction per document
#[instrument(skip_all, fields(backend = repo.name(), versions = config.site.versions.len()))]
pub async fn build_site(
    config: &AppConfig,
    repo: Arc<dyn Repository>,
    parser: Arc<dyn DocumentParser>,
    sink: &mut dyn PageSink,
    progress: &dyn ProgressReporter,
) -> Result<BuildSummary> {
    let start = Instant::now();

    // --- Phase 1: Versions ---
    progress.phase("Resolving versions");
    let versions = prepare_versions(config, repo.as_ref()).await?;

    // --- Phase 2: Assemble ---
    progress.phase("Assembling versions");
    let ctx = AssemblyContext {
        repo,
        parser,
        reads: Arc::new(Semaphore::new(config.build.max_concurrent_reads.max(1))),
        root_dir: config.site.root_dir.clone(),
        content_dir: config.site.content_dir.clone(),
        current_sidebar: Arc::new(config.sidebar_categories.clone()),
    };
    let slots = build_versions(&ctx, &versions, progress).await?;

    let mut versions_built = Vec::new();
    let mut versions_skipped = Vec::new();
    let mut builds: Vec<Arc<VersionBuild>> = Vec::new();
    let mut docs: Option<Vec<TreeObject>> = None;

    for (version, slot) in versions.iter().zip(slots) {
        match slot {
            Some(assembled) => {
                if version.is_current {
                    docs = Some(assembled.docs);
                }
                versions_built.push(version.id.clone());
                builds.push(Arc::new(assembled.build));
            }
            None => versions_skipped.push(version.id.clone()),
        }
    }

    let docs: Arc<[TreeObject]> = docs
        .unwrap_or_else(|| {
            warn!("current version was not built, pages get no doc listing");
            Vec::new()
        })
        .into();

    // --- Phase 3: Emit ---
    progress.phase("Emitting pages");
    let stats = emit_pages(&builds, docs, &config.site.component, sink)?;

    let summary = BuildSummary {
        versions_built,
        versions_skipped,
        pages_emitted: stats.pages,
        anchors_skipped: stats.anchors_skipped,
        elapsed: start.elapsed(),
    };

    info!(
        built = summary.versions_built.len(),
        skipped = summary.versions_skipped.len(),
        pages = summary.pages_emitted,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "build complete"
    );

    progress.done(&summary);
    Ok(summary)
}
