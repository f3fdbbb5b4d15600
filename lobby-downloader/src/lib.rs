//! Lobby downloader - content downloads for the SpringLobby client
//!
//! This library resolves where content comes from (the user-editable
//! `sources.json`, legacy settings, or built-in defaults), pushes those sources
//! into an external downloader engine, and runs download requests one at a
//! time on a background worker with master-URL fallback, rate-limited progress
//! reporting and category-specific follow-up actions.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::{mpsc, Arc};
//! use lobby_downloader::{Category, Collaborators, DownloaderService, DownloaderSettings};
//!
//! let (events, rx) = mpsc::channel();
//! let service = DownloaderService::new(
//!     DownloaderSettings::default(),
//!     Box::new(my_engine),
//!     Collaborators::default(),
//!     Arc::new(events),
//! )?;
//! service.download(Category::Game, "byar:test", "")?;
//! ```

pub mod download;
pub mod engine;
pub mod events;
pub mod logging;
pub mod service;
pub mod settings;
pub mod sources;

pub use download::{Category, Collaborators, DownloadError, DownloadProgress, DownloadResult};
pub use engine::{DownloaderEngine, EngineError};
pub use events::{DownloadEvent, EventSink, NullSink};
pub use logging::{init_logging, LogConfig, LogGuard};
pub use service::DownloaderService;
pub use settings::DownloaderSettings;
pub use sources::{EffectiveSourcesConfig, SourcesError, SourcesResolver};
