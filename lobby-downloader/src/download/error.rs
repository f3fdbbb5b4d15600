//! Error types for download execution.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::EngineError;

/// Result type for download operations.
pub type DownloadResult<T> = Result<T, DownloadError>;

/// Errors that can occur while executing or submitting downloads.
///
/// Sources configuration problems never appear here; the resolver recovers
/// from them before a download starts.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Every source was tried without a successful transfer.
    #[error("no source could provide '{name}' ({attempts} tried)")]
    SourceExhausted { name: String, attempts: usize },

    /// The engine reported a failure or an empty result.
    #[error(transparent)]
    EngineCall(#[from] EngineError),

    /// A category name that does not map to any known category.
    #[error("unknown download category: {0}")]
    UnknownCategory(String),

    /// The self-update directory is unusable.
    #[error("invalid update dir {}: {reason}", path.display())]
    InvalidUpdateDir { path: PathBuf, reason: String },

    /// A filesystem operation failed.
    #[error("{context} {}: {source}", path.display())]
    Io {
        context: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The worker thread is gone; nothing can be queued.
    #[error("download worker is not running")]
    WorkerStopped,

    /// The engine panicked inside a task.
    #[error("unexpected engine failure: {0}")]
    Unexpected(String),
}

impl DownloadError {
    pub(crate) fn io(context: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            context,
            path: path.into(),
            source,
        }
    }
}
