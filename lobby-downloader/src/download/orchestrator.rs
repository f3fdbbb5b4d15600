//! Execution of one download request against the engine.
//!
//! Direct-URL categories get a single attempt. Rapid categories walk the
//! resolved master URLs in priority order:
//!
//! ```text
//! for each master URL:
//!     set masterurl ─► search ──0 results──► next URL
//!                        │
//!                        ▼
//!                     add(0) ─► info ──none──► next URL
//!                                 │
//!                                 ▼
//!                  Started (once) ─► start ──err──► next URL
//!                                      │
//!                                      ▼
//!                           finish action ─► Complete
//! exhausted ─► Failed
//! ```
//!
//! Every request produces `Started` at most once and exactly one of
//! `Complete` or `Failed`. The progress record is finalized before the
//! terminal event is sent.

use tracing::{info, warn};

use super::error::{DownloadError, DownloadResult};
use super::finish::FinishActions;
use super::progress::ProgressTracker;
use super::request::DownloadRequest;
use crate::engine::{DownloadInfo, DownloaderEngine, EngineError, EngineSetting, SourceApplier};
use crate::events::{DownloadEvent, EventSink};
use crate::sources::{SourcesNotices, SourcesResolver};

/// Borrowed worker state needed to run one request.
pub(crate) struct Orchestrator<'a> {
    pub engine: &'a mut dyn DownloaderEngine,
    pub resolver: &'a SourcesResolver,
    pub notices: &'a SourcesNotices,
    pub progress: &'a ProgressTracker,
    pub sink: &'a dyn EventSink,
    pub finish: &'a mut FinishActions,
}

impl Orchestrator<'_> {
    /// Run `request` to a terminal state.
    ///
    /// The error is informational: the matching `Failed` event has already
    /// been sent when this returns `Err`.
    pub(crate) fn run(&mut self, request: &DownloadRequest) -> DownloadResult<()> {
        info!(
            category = %request.category,
            name = %request.name,
            target = %request.target,
            "Starting download"
        );
        let mut session = ProgressSession::begin(self.progress, self.sink, &request.name);

        self.engine.set_config(EngineSetting::ForceUpdate(true));
        let config = self.resolver.resolve();
        self.notices.maybe_warn(&config);
        SourceApplier::apply(&mut *self.engine, &config);

        let outcome = if request.category.is_direct_url() {
            self.run_direct(request, &mut session)
        } else {
            self.run_sources(request, &config.rapid_master_urls, &mut session)
        };

        match outcome {
            Ok(info) => {
                self.finish.run(request, &info, self.sink);
                session.finalize(true);
                self.sink.send(DownloadEvent::Complete {
                    name: request.name.clone(),
                });
                Ok(())
            }
            Err(e) => {
                warn!(
                    category = %request.category,
                    name = %request.name,
                    error = %e,
                    "Download failed"
                );
                session.finalize(false);
                self.sink.send(DownloadEvent::Failed {
                    name: request.name.clone(),
                });
                Err(e)
            }
        }
    }

    fn run_direct(
        &mut self,
        request: &DownloadRequest,
        session: &mut ProgressSession<'_>,
    ) -> DownloadResult<DownloadInfo> {
        let queued = self
            .engine
            .add_by_url(request.category, &request.target, &request.name)?;
        if queued == 0 {
            info!(url = %request.name, "Nothing found to download");
            return Err(DownloadError::SourceExhausted {
                name: request.name.clone(),
                attempts: 1,
            });
        }

        let info = self
            .engine
            .info(0)
            .ok_or_else(|| EngineError::new("info", "download has no metadata"))?;

        session.mark_started();
        self.engine.start()?;
        info!(name = %request.name, "Download finished");
        Ok(info)
    }

    fn run_sources(
        &mut self,
        request: &DownloadRequest,
        sources: &[String],
        session: &mut ProgressSession<'_>,
    ) -> DownloadResult<DownloadInfo> {
        for (idx, source) in sources.iter().enumerate() {
            match self.attempt_source(request, source, session) {
                Ok(info) => {
                    info!(name = %request.name, source = %source, "Download finished");
                    return Ok(info);
                }
                Err(e) => match sources.get(idx + 1) {
                    Some(next) => info!(
                        category = %request.category,
                        name = %request.name,
                        source = %source,
                        next = %next,
                        error = %e,
                        "Source failed, retrying with next"
                    ),
                    None => warn!(
                        category = %request.category,
                        name = %request.name,
                        source = %source,
                        error = %e,
                        "Source failed"
                    ),
                },
            }
        }

        Err(DownloadError::SourceExhausted {
            name: request.name.clone(),
            attempts: sources.len(),
        })
    }

    fn attempt_source(
        &mut self,
        request: &DownloadRequest,
        source: &str,
        session: &mut ProgressSession<'_>,
    ) -> Result<DownloadInfo, EngineError> {
        SourceApplier::set_master_url(&mut *self.engine, source);

        let results = self.engine.search(request.category, &request.name)?;
        if results == 0 {
            return Err(EngineError::new("search", "no matches"));
        }

        // First result only.
        self.engine.add(0)?;
        let info = self
            .engine
            .info(0)
            .ok_or_else(|| EngineError::new("info", "download has no metadata"))?;

        session.mark_started();
        self.engine.start()?;
        Ok(info)
    }
}

/// Progress bookkeeping for one request.
///
/// Dropping an unfinalized session (a panic inside the engine) finalizes it as
/// failed, so observers always see a terminal progress state.
struct ProgressSession<'a> {
    tracker: &'a ProgressTracker,
    sink: &'a dyn EventSink,
    name: &'a str,
    started_sent: bool,
    finalized: bool,
}

impl<'a> ProgressSession<'a> {
    fn begin(tracker: &'a ProgressTracker, sink: &'a dyn EventSink, name: &'a str) -> Self {
        tracker.start(name);
        Self {
            tracker,
            sink,
            name,
            started_sent: false,
            finalized: false,
        }
    }

    /// Send `Started` unless it was already sent for this request.
    fn mark_started(&mut self) {
        if self.started_sent {
            return;
        }
        self.started_sent = true;
        self.sink.send(DownloadEvent::Started {
            name: self.name.to_string(),
        });
    }

    fn finalize(&mut self, success: bool) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        self.tracker.finish(self.name, success);
        if self.started_sent {
            self.sink.send(DownloadEvent::Progress(self.tracker.read()));
        }
    }
}

impl Drop for ProgressSession<'_> {
    fn drop(&mut self) {
        if !self.finalized {
            warn!(name = %self.name, "Download aborted unexpectedly");
            self.finalize(false);
        }
    }
}
