//! Download execution.
//!
//! This module provides:
//! - Download categories and requests (`category`, `request`)
//! - Per-request orchestration with source fallback (`orchestrator`)
//! - Category-specific follow-up actions (`finish`)
//! - The rate-limited progress record (`progress`, `clock`)
//! - The single background worker (`worker`)
//!
//! # Architecture
//!
//! ```text
//! DownloaderService ──submit──► DownloadWorker (one thread, FIFO)
//!                                      │
//!                                      ├── Orchestrator (per request)
//!                                      │       ├── SourcesResolver + SourceApplier
//!                                      │       ├── DownloaderEngine
//!                                      │       └── FinishActions
//!                                      │
//!                                      └── ProgressTracker ◄── engine progress callback
//! ```

mod category;
mod clock;
mod error;
mod finish;
mod orchestrator;
mod progress;
mod request;
pub(crate) mod worker;

pub use category::Category;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DownloadError, DownloadResult};
pub use finish::{
    engine_version, handle_reload_request, ArchiveExtractor, Collaborators, ContentLibrary,
    EngineRegistry, NullRegistry, UnsupportedExtractor,
};
pub use progress::{DownloadProgress, DownloadStatus, ProgressTracker, PROGRESS_UPDATE_INTERVAL};
pub use request::DownloadRequest;

pub(crate) use finish::FinishActions;
pub(crate) use request::Task;
