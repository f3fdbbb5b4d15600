//! Lifecycle notifications emitted to the surrounding application.
//!
//! The downloader never calls back into UI code directly. Everything an
//! observer needs to know is pushed through an [`EventSink`] as a
//! [`DownloadEvent`].

use std::path::PathBuf;
use std::sync::mpsc;

use tracing::trace;

use crate::download::{Category, DownloadProgress};

/// A discrete state change of the downloader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    /// The first usable source was found and the transfer is starting.
    Started { name: String },

    /// Progress record changed; carries a snapshot.
    Progress(DownloadProgress),

    /// Download and its finish action completed.
    Complete { name: String },

    /// Download failed; no further sources will be tried.
    Failed { name: String },

    /// An engine was installed; the content library must be reloaded on the
    /// main context.
    ReloadRequest,

    /// A map or game was installed; the main context should reload the
    /// content library and prefetch `name`.
    ReloadRequestPostDownload { category: Category, name: String },

    /// The deferred reload did not succeed.
    ReloadFailed { name: String },

    /// The deferred reload succeeded.
    Reloaded { name: String },

    /// The self-update package was extracted into `dir`.
    SelfUpdateExtracted { dir: PathBuf },

    /// Pool validation finished.
    ValidateComplete { path: PathBuf },

    /// Pool validation could not be performed.
    ValidateFailed { path: PathBuf, error: String },

    /// Human-readable description of where the download sources came from.
    SourcesInfo(String),
}

/// Receiver of downloader notifications.
///
/// Implementations must not block: events are sent from the worker thread
/// while a download is in progress.
pub trait EventSink: Send + Sync {
    /// Deliver one event.
    fn send(&self, event: DownloadEvent);
}

impl EventSink for mpsc::Sender<DownloadEvent> {
    fn send(&self, event: DownloadEvent) {
        if let Err(e) = mpsc::Sender::send(self, event) {
            trace!(event = ?e.0, "Event receiver dropped");
        }
    }
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn send(&self, _event: DownloadEvent) {}
}
