//! The public downloader service.
//!
//! `DownloaderService` is the explicitly constructed owner of the progress
//! record, the notice de-duplication state and the download worker. Tests
//! build a fresh one per case; dropping it (or calling
//! [`close`](DownloaderService::close)) drains the queue and joins the worker.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::download::worker::{DownloadWorker, WorkerContext};
use crate::download::{
    Category, Collaborators, DownloadError, DownloadProgress, DownloadRequest, DownloadResult,
    FinishActions, ProgressTracker, Task,
};
use crate::engine::DownloaderEngine;
use crate::events::{DownloadEvent, EventSink};
use crate::settings::DownloaderSettings;
use crate::sources::{SourcesNotices, SourcesResolver};

/// File name of the self-update package inside the write directory.
pub const SELF_UPDATE_PACKAGE: &str = "springlobby-latest.zip";

/// Update directories with a path this short or shorter are refused; the
/// directory is wiped before every update.
const MIN_UPDATE_DIR_LEN: usize = 9;

/// Downloads content through an external engine on a background worker.
pub struct DownloaderService {
    settings: DownloaderSettings,
    progress: Arc<ProgressTracker>,
    worker: DownloadWorker,
}

impl DownloaderService {
    /// Create the service and start its worker.
    ///
    /// Registers the engine's progress callback and pushes the current
    /// settings and sources to the engine before the worker takes ownership
    /// of it.
    pub fn new(
        settings: DownloaderSettings,
        engine: Box<dyn DownloaderEngine>,
        collaborators: Collaborators,
        sink: Arc<dyn EventSink>,
    ) -> DownloadResult<Self> {
        Self::with_progress(
            settings,
            engine,
            collaborators,
            sink,
            Arc::new(ProgressTracker::new()),
        )
    }

    /// Like [`new`](Self::new), with a caller-provided progress tracker.
    pub fn with_progress(
        settings: DownloaderSettings,
        mut engine: Box<dyn DownloaderEngine>,
        collaborators: Collaborators,
        sink: Arc<dyn EventSink>,
        progress: Arc<ProgressTracker>,
    ) -> DownloadResult<Self> {
        let listener_progress = Arc::clone(&progress);
        let listener_sink = Arc::clone(&sink);
        engine.set_progress_listener(Box::new(move |downloaded: i64, filesize: i64| {
            if listener_progress.update_from_callback(downloaded, filesize) {
                listener_sink.send(DownloadEvent::Progress(listener_progress.read()));
            }
        }));

        let mut context = WorkerContext {
            engine,
            resolver: SourcesResolver::new(&settings.write_dir).with_legacy(settings.legacy.clone()),
            notices: SourcesNotices::new(),
            progress: Arc::clone(&progress),
            sink,
            finish: FinishActions::new(collaborators, settings.update_dir.clone()),
            download_dir: settings.download_dir.clone(),
            max_parallel: settings.max_parallel,
        };
        context.refresh_settings();

        let worker = DownloadWorker::spawn(context)?;
        info!(write_dir = %settings.write_dir.display(), "Downloader started");

        Ok(Self {
            settings,
            progress,
            worker,
        })
    }

    /// The settings the service was created with.
    pub fn settings(&self) -> &DownloaderSettings {
        &self.settings
    }

    /// Queue a download. Returns as soon as the request is queued.
    ///
    /// For [`Category::SpringLobby`] and [`Category::Http`], `name` is the
    /// source URL and `target` the destination file.
    pub fn download(
        &self,
        category: Category,
        name: impl Into<String>,
        target: impl Into<String>,
    ) -> DownloadResult<()> {
        let request = DownloadRequest::new(category, name, target);
        debug!(category = %request.category, name = %request.name, "Queueing download");
        self.worker.submit(Task::Download(request))
    }

    /// Queue a download whose category is given by name.
    ///
    /// Unknown names are logged and rejected.
    pub fn download_by_name(
        &self,
        category: &str,
        name: impl Into<String>,
        target: impl Into<String>,
    ) -> DownloadResult<()> {
        let name = name.into();
        let category = category.parse::<Category>().inspect_err(|e| {
            error!(name = %name, error = %e, "Refusing download");
        })?;
        self.download(category, name, target)
    }

    /// Snapshot of the current progress record.
    pub fn progress(&self) -> DownloadProgress {
        self.progress.read()
    }

    /// Whether a download is in flight.
    pub fn is_running(&self) -> bool {
        self.progress.is_running()
    }

    /// Fetch `url` synchronously and return the body.
    ///
    /// Runs on the worker after any queued tasks, and is tracked like a
    /// download in the progress record.
    pub fn download_url(&self, url: impl Into<String>) -> DownloadResult<String> {
        let (reply, response) = mpsc::channel();
        self.worker.submit(Task::FetchUrl {
            url: url.into(),
            reply,
        })?;
        response.recv().map_err(|_| DownloadError::WorkerStopped)?
    }

    /// Prepare the update directory and queue the self-update package.
    ///
    /// Wipes and recreates the update directory, removes a stale package from
    /// the write directory, then queues the download of `update_url`. Returns
    /// the update directory.
    pub fn update_application(&self, update_url: impl Into<String>) -> DownloadResult<PathBuf> {
        let update_dir = &self.settings.update_dir;
        prepare_update_dir(update_dir).inspect_err(|e| {
            error!(dir = %update_dir.display(), error = %e, "Cannot prepare self-update");
        })?;

        let package = self.settings.write_dir.join(SELF_UPDATE_PACKAGE);
        if package.exists() {
            fs::remove_file(&package)
                .map_err(|e| DownloadError::io("cannot delete", &package, e))?;
        }

        self.download(
            Category::SpringLobby,
            update_url,
            package.to_string_lossy().into_owned(),
        )?;
        Ok(update_dir.clone())
    }

    /// Queue an integrity check of the content pool at `path`.
    ///
    /// The outcome arrives as [`DownloadEvent::ValidateComplete`] or
    /// [`DownloadEvent::ValidateFailed`].
    pub fn validate_pool(&self, path: impl Into<PathBuf>, delete_broken: bool) -> DownloadResult<()> {
        self.worker.submit(Task::Validate {
            path: path.into(),
            delete_broken,
        })
    }

    /// Queue a settings refresh: engine paths and re-resolved sources.
    pub fn update_settings(&self) -> DownloadResult<()> {
        self.worker.submit(Task::RefreshSettings)
    }

    /// Drain the queue and stop the worker.
    pub fn close(mut self) {
        self.worker.shutdown();
        info!("Downloader stopped");
    }
}

fn prepare_update_dir(dir: &Path) -> DownloadResult<()> {
    if dir.as_os_str().len() <= MIN_UPDATE_DIR_LEN {
        return Err(DownloadError::InvalidUpdateDir {
            path: dir.to_path_buf(),
            reason: "path is too short".to_string(),
        });
    }
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| DownloadError::io("cannot clean up", dir, e))?;
    }
    fs::create_dir_all(dir)
        .map_err(|e| DownloadError::io("cannot create update directory", dir, e))?;

    ensure_writable(dir)
}

/// Create (and drop) an anonymous temp file in `dir`. Permission bits alone
/// do not say whether the current user may write there.
fn ensure_writable(dir: &Path) -> DownloadResult<()> {
    tempfile::tempfile_in(dir)
        .map(drop)
        .map_err(|e| DownloadError::InvalidUpdateDir {
            path: dir.to_path_buf(),
            reason: format!("directory is not writable: {}", e),
        })
}
