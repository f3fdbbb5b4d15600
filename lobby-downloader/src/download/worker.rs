//! The single download worker.
//!
//! One named thread consumes a FIFO task queue. It owns the engine, so engine
//! calls (and the engine's global options) are never touched from two threads.
//! Dropping the sender ends the loop after the queued tasks are drained.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info, warn};

use super::error::{DownloadError, DownloadResult};
use super::finish::FinishActions;
use super::orchestrator::Orchestrator;
use super::progress::ProgressTracker;
use super::request::Task;
use crate::engine::{DownloaderEngine, EngineSetting, SourceApplier};
use crate::events::{DownloadEvent, EventSink};
use crate::sources::{SourcesNotices, SourcesResolver};

const WORKER_THREAD_NAME: &str = "lobby-downloader";

/// Everything the worker owns.
pub(crate) struct WorkerContext {
    pub engine: Box<dyn DownloaderEngine>,
    pub resolver: SourcesResolver,
    pub notices: SourcesNotices,
    pub progress: Arc<ProgressTracker>,
    pub sink: Arc<dyn EventSink>,
    pub finish: FinishActions,
    pub download_dir: PathBuf,
    pub max_parallel: usize,
}

impl WorkerContext {
    /// Push engine paths and the freshly resolved sources to the engine.
    pub(crate) fn refresh_settings(&mut self) {
        self.engine
            .set_config(EngineSetting::WritePath(self.download_dir.clone()));
        self.engine
            .set_config(EngineSetting::MaxParallel(self.max_parallel));

        let config = self.resolver.resolve();
        self.notices.maybe_warn(&config);
        self.notices.maybe_announce(&config, self.sink.as_ref());
        SourceApplier::apply(self.engine.as_mut(), &config);
    }

    fn execute(&mut self, task: Task) {
        match task {
            Task::Download(request) => {
                let mut orchestrator = Orchestrator {
                    engine: self.engine.as_mut(),
                    resolver: &self.resolver,
                    notices: &self.notices,
                    progress: &self.progress,
                    sink: self.sink.as_ref(),
                    finish: &mut self.finish,
                };
                if let Err(e) = orchestrator.run(&request) {
                    debug!(name = %request.name, error = %e, "Download ended without success");
                }
            }
            Task::Validate {
                path,
                delete_broken,
            } => {
                info!(path = %path.display(), delete_broken, "Validating pool");
                match self.engine.validate_pool(&path, delete_broken) {
                    Ok(()) => self.sink.send(DownloadEvent::ValidateComplete { path }),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Pool validation failed");
                        self.sink.send(DownloadEvent::ValidateFailed {
                            path,
                            error: e.to_string(),
                        });
                    }
                }
            }
            Task::FetchUrl { url, reply } => {
                self.refresh_settings();
                let mut tracked = FetchProgress::begin(&self.progress, self.sink.as_ref(), &url);
                let result = self.engine.fetch_url(&url);
                tracked.finish(result.is_ok());
                if let Err(e) = &result {
                    warn!(url = %url, error = %e, "URL fetch failed");
                }
                // The caller may have given up waiting.
                reply.send(result.map_err(DownloadError::from)).ok();
            }
            Task::RefreshSettings => self.refresh_settings(),
        }
    }
}

/// Progress bookkeeping for one synchronous URL fetch.
///
/// Dropped without [`finish`](Self::finish) (the engine panicked), it
/// finalizes the record as failed.
struct FetchProgress<'a> {
    tracker: &'a ProgressTracker,
    sink: &'a dyn EventSink,
    url: &'a str,
    finished: bool,
}

impl<'a> FetchProgress<'a> {
    fn begin(tracker: &'a ProgressTracker, sink: &'a dyn EventSink, url: &'a str) -> Self {
        tracker.start(url);
        Self {
            tracker,
            sink,
            url,
            finished: false,
        }
    }

    fn finish(&mut self, success: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.tracker.finish(self.url, success);
        self.sink.send(DownloadEvent::Progress(self.tracker.read()));
    }
}

impl Drop for FetchProgress<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!(url = %self.url, "URL fetch aborted unexpectedly");
            self.finish(false);
        }
    }
}

/// Who must hear about a task that panicked.
enum PanicReport {
    Download(String),
    Validate(PathBuf),
    Fetch(mpsc::Sender<DownloadResult<String>>),
    Nobody,
}

/// Handle to the worker thread.
pub(crate) struct DownloadWorker {
    sender: Option<mpsc::Sender<Task>>,
    handle: Option<JoinHandle<()>>,
}

impl DownloadWorker {
    /// Start the worker thread with `context`.
    pub(crate) fn spawn(mut context: WorkerContext) -> DownloadResult<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();

        let handle = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                debug!("Download worker started");
                while let Ok(task) = receiver.recv() {
                    run_task(&mut context, task);
                }
                debug!("Download worker stopped");
            })
            .map_err(|e| DownloadError::io("cannot spawn worker thread", WORKER_THREAD_NAME, e))?;

        Ok(Self {
            sender: Some(sender),
            handle: Some(handle),
        })
    }

    /// Queue `task`. Never blocks.
    pub(crate) fn submit(&self, task: Task) -> DownloadResult<()> {
        let sender = self.sender.as_ref().ok_or(DownloadError::WorkerStopped)?;
        sender.send(task).map_err(|_| DownloadError::WorkerStopped)
    }

    /// Stop accepting tasks and wait for the queue to drain.
    pub(crate) fn shutdown(&mut self) {
        self.sender.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Download worker exited abnormally");
            }
        }
    }
}

impl Drop for DownloadWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Execute one task, containing panics from the engine.
fn run_task(context: &mut WorkerContext, task: Task) {
    let label = task.label();
    let report = match &task {
        Task::Download(request) => PanicReport::Download(request.name.clone()),
        Task::Validate { path, .. } => PanicReport::Validate(path.clone()),
        Task::FetchUrl { reply, .. } => PanicReport::Fetch(reply.clone()),
        Task::RefreshSettings => PanicReport::Nobody,
    };

    let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| context.execute(task))) else {
        return;
    };
    let err = DownloadError::Unexpected(panic_message(payload.as_ref()));
    error!(task = label, error = %err, "Worker task panicked");
    match report {
        PanicReport::Download(name) => context.sink.send(DownloadEvent::Failed { name }),
        PanicReport::Validate(path) => context.sink.send(DownloadEvent::ValidateFailed {
            path,
            error: err.to_string(),
        }),
        PanicReport::Fetch(reply) => {
            reply.send(Err(err)).ok();
        }
        PanicReport::Nobody => {}
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
