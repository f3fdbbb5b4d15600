//! Configuration for the downloader service.

use std::path::PathBuf;

use crate::sources::LegacySettings;

/// Default number of parallel engine transfers.
pub const DEFAULT_MAX_PARALLEL: usize = 4;

/// Name of the application data directory under the platform data dir.
const APP_DIR_NAME: &str = "springlobby";

/// Configuration for [`DownloaderService`](crate::DownloaderService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloaderSettings {
    /// Lobby write directory.
    ///
    /// Holds `sources.json` and the self-update package.
    pub write_dir: PathBuf,

    /// Directory the engine installs downloaded content into.
    pub download_dir: PathBuf,

    /// Directory the self-update package is extracted into.
    pub update_dir: PathBuf,

    /// Maximum parallel transfers inside the engine.
    pub max_parallel: usize,

    /// Back-compat settings used to seed a missing `sources.json`.
    pub legacy: Option<LegacySettings>,
}

impl Default for DownloaderSettings {
    fn default() -> Self {
        let base = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME);
        Self::new(base)
    }
}

impl DownloaderSettings {
    /// Create settings rooted at `write_dir`.
    ///
    /// Content downloads go to `write_dir` and the update directory is
    /// `<write_dir>/update`.
    pub fn new(write_dir: impl Into<PathBuf>) -> Self {
        let write_dir = write_dir.into();
        Self {
            download_dir: write_dir.clone(),
            update_dir: write_dir.join("update"),
            write_dir,
            max_parallel: DEFAULT_MAX_PARALLEL,
            legacy: None,
        }
    }

    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    pub fn with_update_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.update_dir = dir.into();
        self
    }

    /// Set the parallel transfer limit (at least 1).
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_legacy(mut self, legacy: LegacySettings) -> Self {
        self.legacy = Some(legacy);
        self
    }
}
