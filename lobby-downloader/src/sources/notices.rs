//! One-shot user notices about sources provenance.
//!
//! Resolution runs before every download, so the same condition would be
//! reported over and over. The warning for an invalid file is logged once per
//! `path|error` signature; the informational message is emitted once per
//! distinct text.

use parking_lot::Mutex;
use tracing::warn;

use super::types::{EffectiveSourcesConfig, Provenance};
use crate::events::{DownloadEvent, EventSink};

#[derive(Debug, Default)]
struct NoticeState {
    warning_signature: Option<String>,
    last_message: Option<String>,
}

/// De-duplication state for sources notices.
#[derive(Debug, Default)]
pub struct SourcesNotices {
    state: Mutex<NoticeState>,
}

impl SourcesNotices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log the invalid-file warning unless this signature was already logged.
    ///
    /// Returns `true` if a warning was logged.
    pub fn maybe_warn(&self, config: &EffectiveSourcesConfig) -> bool {
        if !config.using_safe_defaults_because_file_invalid {
            return false;
        }

        let signature = format!(
            "{}|{}",
            config.sources_file_path.display(),
            config.sources_file_error
        );
        {
            let mut state = self.state.lock();
            if state.warning_signature.as_deref() == Some(signature.as_str()) {
                return false;
            }
            state.warning_signature = Some(signature);
        }

        warn!(
            path = %config.sources_file_path.display(),
            error = %config.sources_file_error,
            "Invalid downloader source config, using safe built-in defaults"
        );
        true
    }

    /// Emit the provenance message unless it equals the last one emitted.
    ///
    /// Returns `true` if an event was sent.
    pub fn maybe_announce(&self, config: &EffectiveSourcesConfig, sink: &dyn EventSink) -> bool {
        let message = provenance_message(config);
        {
            let mut state = self.state.lock();
            if state.last_message.as_deref() == Some(message.as_str()) {
                return false;
            }
            state.last_message = Some(message.clone());
        }

        sink.send(DownloadEvent::SourcesInfo(message));
        true
    }
}

/// The informational message describing where `config` came from.
pub fn provenance_message(config: &EffectiveSourcesConfig) -> String {
    let path = config.sources_file_path.display();
    match config.provenance() {
        Provenance::CreatedFile => {
            format!("Created and loaded downloader sources from: {}", path)
        }
        Provenance::LoadedFromFile => format!("Loaded downloader sources from: {}", path),
        Provenance::SafeDefaults => format!(
            "Could not load downloader sources file:\n{}\n\nReason: {}\n\nUsing built-in defaults for this session.",
            path, config.sources_file_error
        ),
        Provenance::SessionOnly => format!(
            "Downloader sources file not found:\n{}\n\nUsing legacy settings.",
            path
        ),
    }
}
