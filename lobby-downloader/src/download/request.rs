//! Work items for the download worker.

use std::path::PathBuf;
use std::sync::mpsc;

use super::category::Category;
use super::error::DownloadResult;

/// An immutable description of one download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub category: Category,
    /// Logical name for rapid categories; the source URL for direct ones.
    pub name: String,
    /// Destination filename for direct categories; informational otherwise.
    pub target: String,
}

impl DownloadRequest {
    pub fn new(category: Category, name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
            target: target.into(),
        }
    }
}

/// Everything the worker can execute.
#[derive(Debug)]
pub(crate) enum Task {
    Download(DownloadRequest),
    Validate {
        path: PathBuf,
        delete_broken: bool,
    },
    FetchUrl {
        url: String,
        reply: mpsc::Sender<DownloadResult<String>>,
    },
    RefreshSettings,
}

impl Task {
    /// Short label for logs.
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Task::Download(_) => "download",
            Task::Validate { .. } => "validate",
            Task::FetchUrl { .. } => "fetch_url",
            Task::RefreshSettings => "refresh_settings",
        }
    }
}
