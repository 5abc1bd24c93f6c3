//! Core pipeline orchestration and domain logic for tagdocs.
//!
//! This crate ties together version resolution, sidebar lookup, content
//! assembly, and page emission into the end-to-end `build_site` workflow.

pub mod content;
pub mod emitter;
pub mod pipeline;
pub mod sidebar;
pub mod versions;

pub use content::{AssembledVersion, AssemblyContext, ItemOutcome, assemble_version};
pub use emitter::{EmitStats, JsonLinesSink, MemorySink, PageContext, PageInstruction, PageSink};
pub use pipeline::{BuildSummary, ProgressReporter, SilentProgress, build_site, prepare_versions};
pub use versions::resolve_versions;
