//! Seam to the external downloader engine.
//!
//! The engine performs the actual network transfers and speaks the rapid
//! protocol. This crate drives it through the narrow [`DownloaderEngine`]
//! interface: key/value options per backend, typed config settings, and a
//! search / add / info / start call sequence.
//!
//! # Global option state
//!
//! Engine options such as `masterurl` are global to the engine, not scoped to a
//! request. After construction the engine is owned exclusively by the download
//! worker, and within the worker only [`SourceApplier`] writes options. Any new
//! option write must go through the applier so fallback attempts never observe
//! an interleaved change.

mod applier;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::download::Category;

pub use applier::{option_keys, SourceApplier};

/// Result type for engine calls.
pub type EngineResult<T> = Result<T, EngineError>;

/// Failure reported by the engine for one call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{call} failed: {reason}")]
pub struct EngineError {
    /// Engine call that failed (`search`, `start`, ...).
    pub call: &'static str,
    pub reason: String,
}

impl EngineError {
    pub fn new(call: &'static str, reason: impl Into<String>) -> Self {
        Self {
            call,
            reason: reason.into(),
        }
    }
}

/// Option namespace inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Rapid repository backend.
    Rapid,
    /// Plain HTTP backend (maps, engines, direct URLs).
    Http,
}

/// Typed engine configuration values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSetting {
    /// Re-download repository indexes even if cached.
    ForceUpdate(bool),
    /// Directory the engine installs content into.
    WritePath(PathBuf),
    /// Maximum parallel transfers.
    MaxParallel(usize),
}

/// Metadata of a queued download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadInfo {
    /// File the engine will write (or has written) for this download.
    pub filename: PathBuf,
}

/// Byte-level progress callback: `(downloaded, filesize)`.
///
/// Engines report signed values; they are clamped by the progress tracker.
pub type ProgressListener = Box<dyn Fn(i64, i64) + Send + Sync>;

/// The external downloader engine.
///
/// All calls are synchronous and may block on the network.
pub trait DownloaderEngine: Send {
    /// Set a string option on one backend.
    fn set_option(&mut self, backend: Backend, key: &str, value: &str);

    /// Apply a typed configuration value.
    fn set_config(&mut self, setting: EngineSetting);

    /// Search the active sources for `name`. Returns the number of results.
    fn search(&mut self, category: Category, name: &str) -> EngineResult<usize>;

    /// Queue a direct download of `url` into `filename`. Returns the number of
    /// queued downloads.
    fn add_by_url(&mut self, category: Category, filename: &str, url: &str)
        -> EngineResult<usize>;

    /// Queue search result `index` for download.
    fn add(&mut self, index: usize) -> EngineResult<()>;

    /// Metadata of queued download `index`, if the engine has any.
    fn info(&mut self, index: usize) -> Option<DownloadInfo>;

    /// Run all queued downloads to completion.
    fn start(&mut self) -> EngineResult<()>;

    /// Fetch `url` and return the response body.
    fn fetch_url(&mut self, url: &str) -> EngineResult<String>;

    /// Check the integrity of a local content pool.
    fn validate_pool(&mut self, path: &Path, delete_broken: bool) -> EngineResult<()>;

    /// Register the progress callback. Called once, at service construction.
    fn set_progress_listener(&mut self, listener: ProgressListener);
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted engine for unit tests.

    use super::*;
    use std::collections::HashMap;

    /// Behavior of one source (keyed by master URL, or `""` for direct URLs).
    #[derive(Debug, Clone)]
    pub struct SourceScript {
        pub results: EngineResult<usize>,
        pub has_info: bool,
        pub start: EngineResult<()>,
    }

    impl SourceScript {
        pub fn ok() -> Self {
            Self {
                results: Ok(1),
                has_info: true,
                start: Ok(()),
            }
        }

        pub fn empty() -> Self {
            Self {
                results: Ok(0),
                ..Self::ok()
            }
        }

        pub fn no_info() -> Self {
            Self {
                has_info: false,
                ..Self::ok()
            }
        }

        pub fn start_fails() -> Self {
            Self {
                start: Err(EngineError::new("start", "connection reset")),
                ..Self::ok()
            }
        }
    }

    #[derive(Default)]
    pub struct ScriptedEngine {
        pub options: HashMap<(Backend, String), String>,
        pub option_writes: Vec<(Backend, String, String)>,
        pub settings: Vec<EngineSetting>,
        pub sources: HashMap<String, SourceScript>,
        pub calls: Vec<String>,
        pub progress_script: Vec<(i64, i64)>,
        pub panic_on_start: bool,
        pub panic_on_fetch: bool,
        pub panic_on_validate: bool,
        pub fetch_response: Option<EngineResult<String>>,
        pub validate_result: Option<EngineResult<()>>,
        listener: Option<ProgressListener>,
        active: String,
    }

    impl ScriptedEngine {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_source(mut self, url: &str, script: SourceScript) -> Self {
            self.sources.insert(url.to_string(), script);
            self
        }

        pub fn option(&self, backend: Backend, key: &str) -> Option<&str> {
            self.options
                .get(&(backend, key.to_string()))
                .map(String::as_str)
        }

        fn script(&self) -> SourceScript {
            self.sources
                .get(&self.active)
                .cloned()
                .unwrap_or_else(SourceScript::empty)
        }
    }

    impl DownloaderEngine for ScriptedEngine {
        fn set_option(&mut self, backend: Backend, key: &str, value: &str) {
            if backend == Backend::Rapid && key == option_keys::MASTER_URL {
                self.active = value.to_string();
            }
            self.options
                .insert((backend, key.to_string()), value.to_string());
            self.option_writes
                .push((backend, key.to_string(), value.to_string()));
        }

        fn set_config(&mut self, setting: EngineSetting) {
            self.settings.push(setting);
        }

        fn search(&mut self, _category: Category, name: &str) -> EngineResult<usize> {
            self.calls.push(format!("search {} @ {}", name, self.active));
            self.script().results
        }

        fn add_by_url(
            &mut self,
            _category: Category,
            filename: &str,
            url: &str,
        ) -> EngineResult<usize> {
            self.calls.push(format!("add_by_url {} <- {}", filename, url));
            self.active = String::new();
            self.script().results
        }

        fn add(&mut self, index: usize) -> EngineResult<()> {
            self.calls.push(format!("add {}", index));
            Ok(())
        }

        fn info(&mut self, index: usize) -> Option<DownloadInfo> {
            self.calls.push(format!("info {}", index));
            self.script().has_info.then(|| DownloadInfo {
                filename: PathBuf::from("pool/package.sdp"),
            })
        }

        fn start(&mut self) -> EngineResult<()> {
            self.calls.push(format!("start @ {}", self.active));
            if self.panic_on_start {
                panic!("engine crashed");
            }
            if let Some(listener) = &self.listener {
                for (downloaded, filesize) in &self.progress_script {
                    listener(*downloaded, *filesize);
                }
            }
            self.script().start
        }

        fn fetch_url(&mut self, url: &str) -> EngineResult<String> {
            self.calls.push(format!("fetch_url {}", url));
            if self.panic_on_fetch {
                panic!("engine crashed during fetch");
            }
            self.fetch_response
                .clone()
                .unwrap_or_else(|| Ok(format!("body of {}", url)))
        }

        fn validate_pool(&mut self, path: &Path, delete_broken: bool) -> EngineResult<()> {
            self.calls
                .push(format!("validate {} {}", path.display(), delete_broken));
            if self.panic_on_validate {
                panic!("pool scan crashed");
            }
            self.validate_result.clone().unwrap_or(Ok(()))
        }

        fn set_progress_listener(&mut self, listener: ProgressListener) {
            self.listener = Some(listener);
        }
    }
}
