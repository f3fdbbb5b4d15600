//! Progress record of the in-flight download.
//!
//! One record is shared between the worker (which starts and finishes
//! downloads), the engine's progress callback, and observers polling from any
//! thread. All access is serialized through one mutex, and readers only ever
//! get a snapshot copy.
//!
//! Only one download is modeled at a time: starting a second download replaces
//! the tracked identity.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::clock::{Clock, SystemClock};

/// Minimum time between two applied progress callbacks.
pub const PROGRESS_UPDATE_INTERVAL: Duration = Duration::from_millis(200);

/// Coarse state of a download, as shown in download lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Nothing has been downloaded yet.
    Idle,
    Downloading,
    Failed,
    Complete,
}

/// Snapshot of the progress record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub name: String,
    pub downloaded: u64,
    /// Never 0.
    pub filesize: u64,
    pub running: bool,
    pub failed: bool,
}

impl Default for DownloadProgress {
    fn default() -> Self {
        Self {
            name: String::new(),
            downloaded: 0,
            filesize: 1,
            running: false,
            failed: false,
        }
    }
}

impl DownloadProgress {
    pub fn status(&self) -> DownloadStatus {
        if self.running {
            DownloadStatus::Downloading
        } else if self.failed {
            DownloadStatus::Failed
        } else if self.name.is_empty() {
            DownloadStatus::Idle
        } else {
            DownloadStatus::Complete
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Percentage of bytes downloaded, capped at 100.
    pub fn progress_percent(&self) -> f64 {
        let percent = self.downloaded as f64 * 100.0 / self.filesize.max(1) as f64;
        percent.min(100.0)
    }
}

#[derive(Debug, Default)]
struct TrackerState {
    progress: DownloadProgress,
    last_update: Option<Instant>,
}

/// Mutex-guarded progress record with a rate-limited update path.
#[derive(Debug)]
pub struct ProgressTracker {
    state: Mutex<TrackerState>,
    clock: Arc<dyn Clock>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    /// Create a tracker driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a tracker driven by `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            clock,
        }
    }

    /// Reset the record for a new download of `name`.
    pub fn start(&self, name: &str) {
        let mut state = self.state.lock();
        state.progress = DownloadProgress {
            name: name.to_string(),
            running: true,
            ..DownloadProgress::default()
        };
        state.last_update = None;
    }

    /// Apply a byte count reported by the engine.
    ///
    /// Updates arriving less than [`PROGRESS_UPDATE_INTERVAL`] after the last
    /// applied one are dropped, unless `downloaded == filesize`. Updates
    /// arriving while no download is running are ignored.
    ///
    /// Returns `true` if the record changed.
    pub fn update_from_callback(&self, downloaded: i64, filesize: i64) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();

        if !state.progress.running {
            return false;
        }
        let complete = downloaded == filesize;
        if let Some(last) = state.last_update {
            if now.saturating_duration_since(last) < PROGRESS_UPDATE_INTERVAL && !complete {
                return false;
            }
        }

        state.last_update = Some(now);
        state.progress.filesize = clamp_filesize(filesize);
        state.progress.downloaded = downloaded.max(0) as u64;
        state.progress.running = true;
        state.progress.failed = false;
        true
    }

    /// Finalize the record for `name`.
    ///
    /// On success the byte count is forced to the file size, even if the last
    /// callback under-reported it.
    pub fn finish(&self, name: &str, success: bool) {
        let mut state = self.state.lock();
        let progress = &mut state.progress;
        progress.name = name.to_string();
        progress.filesize = progress.filesize.max(1);
        if success && progress.downloaded < progress.filesize {
            progress.downloaded = progress.filesize;
        }
        progress.running = false;
        progress.failed = !success;
    }

    /// Snapshot of the record.
    pub fn read(&self) -> DownloadProgress {
        self.state.lock().progress.clone()
    }

    /// Whether a download is between `start` and `finish`.
    pub fn is_running(&self) -> bool {
        self.state.lock().progress.running
    }
}

fn clamp_filesize(filesize: i64) -> u64 {
    if filesize <= 0 {
        1
    } else {
        filesize as u64
    }
}
