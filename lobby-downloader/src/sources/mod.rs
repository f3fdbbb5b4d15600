//! Download sources configuration.
//!
//! Sources are the rapid master indexes, map mirrors and engine-release
//! providers the downloader may contact. They live in `sources.json` inside the
//! lobby write directory:
//!
//! ```text
//! {
//!   "version": 1,
//!   "rapid":  { "master_urls": [...], "repo_timeout_seconds": 20 },
//!   "maps":   { "base_urls": [...],   "download_timeout_seconds": 20 },
//!   "engine": { "providers": [{ "type": "springfiles", "url": "...", "name": "..." }],
//!               "download_timeout_seconds": 20 }
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! SourcesResolver
//!         │
//!         ├── SourcesStore (load / validate / write_atomic)
//!         │
//!         ├── LegacySettings (seed for a missing file)
//!         │
//!         └── defaults (built-in URLs and providers)
//!
//! SourcesNotices (de-duplicated warning and provenance message)
//! ```

mod defaults;
mod error;
mod notices;
mod resolver;
mod store;
mod types;

pub use defaults::{
    default_engine_providers, default_rapid_master_urls, safe_defaults, DEFAULT_ENGINE_GITHUB_RELEASES_URL,
    DEFAULT_ENGINE_SPRINGFILES_URL, DEFAULT_MAP_BASE_URL, DEFAULT_RAPID_MASTER_PRIMARY,
    DEFAULT_RAPID_MASTER_SECONDARY,
};
pub use error::{SourcesError, SourcesResult};
pub use notices::{provenance_message, SourcesNotices};
pub use resolver::{LegacySettings, SourcesResolver};
pub use store::{build_sources_json, write_atomic, SourcesStore, SOURCES_FILE_NAME};
pub use types::{
    DownloaderSourcesConfig, EffectiveSourcesConfig, EngineProvider, LoadState, Provenance,
    ProviderKind, FILE_DEFAULT_TIMEOUT_SECS,
};
