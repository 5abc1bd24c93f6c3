//! Shared types, error model, and configuration for tagdocs.
//!
//! This crate is the foundation depended on by all other tagdocs crates.
//! It provides:
//! - [`TagdocsError`]: the unified error type
//! - Domain types ([`TreeObject`], [`ResolvedVersion`], [`SidebarCategories`],
//!   [`VersionBuild`] and the page records it holds)
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BuildConfig, CONFIG_FILE_NAME, GithubConfig, RemoteConfig, SiteConfig,
    SourceConfig, SourceKind, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, TagdocsError};
pub use types::{
    AnchorRecord, CURRENT_REVISION, CURRENT_VERSION_ID, ContentCategory, DocRecord, PageRecord,
    ResolvedVersion, SYMLINK_MODE, SidebarCategories, SidebarCategory, SidebarItem, TreeObject,
    VersionBuild,
};
