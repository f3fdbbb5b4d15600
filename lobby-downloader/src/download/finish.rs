//! Category-specific follow-up after a successful download.
//!
//! Engine installs rescan the engine list and request a reload; the
//! self-update package is extracted; maps and games always defer their
//! library reload to the main context through
//! [`DownloadEvent::ReloadRequestPostDownload`], which that context handles
//! with [`handle_reload_request`].

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use super::category::Category;
use super::request::DownloadRequest;
use crate::engine::DownloadInfo;
use crate::events::{DownloadEvent, EventSink};

/// Prefix stripped from engine download names to get the version string.
const ENGINE_NAME_PREFIX: &str = "spring ";

/// Installed engine versions known to the application.
pub trait EngineRegistry: Send {
    /// Rescan the installed engines.
    fn refresh(&mut self);

    /// Record `version` as the currently selected engine.
    fn set_used_version(&mut self, version: &str);
}

/// Extracts downloaded archives.
pub trait ArchiveExtractor: Send {
    fn extract(&self, archive: &Path, dest_dir: &Path) -> io::Result<()>;
}

/// The library of installed maps and games. Must only be used on the main
/// context.
pub trait ContentLibrary {
    /// Reload the library after new content was installed.
    fn reload(&mut self) -> io::Result<()>;

    fn prefetch_map(&mut self, name: &str);

    fn prefetch_game(&mut self, name: &str);
}

/// Registry that ignores every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRegistry;

impl EngineRegistry for NullRegistry {
    fn refresh(&mut self) {}

    fn set_used_version(&mut self, _version: &str) {}
}

/// Extractor used when the application provides none.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedExtractor;

impl ArchiveExtractor for UnsupportedExtractor {
    fn extract(&self, archive: &Path, _dest_dir: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("no archive extractor configured for {}", archive.display()),
        ))
    }
}

/// Application services used by finish actions.
pub struct Collaborators {
    pub registry: Box<dyn EngineRegistry>,
    pub extractor: Box<dyn ArchiveExtractor>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            registry: Box::new(NullRegistry),
            extractor: Box::new(UnsupportedExtractor),
        }
    }
}

impl Collaborators {
    pub fn new(registry: Box<dyn EngineRegistry>, extractor: Box<dyn ArchiveExtractor>) -> Self {
        Self {
            registry,
            extractor,
        }
    }
}

/// Runs finish actions on the worker.
pub(crate) struct FinishActions {
    collaborators: Collaborators,
    update_dir: PathBuf,
}

impl FinishActions {
    pub(crate) fn new(collaborators: Collaborators, update_dir: PathBuf) -> Self {
        Self {
            collaborators,
            update_dir,
        }
    }

    /// Run the follow-up for a successful `request`.
    pub(crate) fn run(&mut self, request: &DownloadRequest, info: &DownloadInfo, sink: &dyn EventSink) {
        let category = request.category;
        match category {
            Category::Engine
            | Category::EngineLinux
            | Category::EngineLinux64
            | Category::EngineWindows
            | Category::EngineWindows64
            | Category::EngineMacosx => {
                let version = engine_version(&request.name);
                self.collaborators.registry.refresh();
                self.collaborators.registry.set_used_version(version);
                info!(version = %version, "Engine installed");
                // Some engine bundles cannot be loaded off the main context.
                sink.send(DownloadEvent::ReloadRequest);
            }
            Category::SpringLobby => {
                match self
                    .collaborators
                    .extractor
                    .extract(&info.filename, &self.update_dir)
                {
                    Ok(()) => sink.send(DownloadEvent::SelfUpdateExtracted {
                        dir: self.update_dir.clone(),
                    }),
                    Err(e) => error!(
                        archive = %info.filename.display(),
                        dest = %self.update_dir.display(),
                        error = %e,
                        "Couldn't extract self-update package"
                    ),
                }
            }
            Category::Map | Category::Game => {
                sink.send(DownloadEvent::ReloadRequestPostDownload {
                    category,
                    name: request.name.clone(),
                });
            }
            Category::Http | Category::Rapid => {
                debug!(category = %category, name = %request.name, "No finish action");
            }
        }
    }
}

/// Version string of an engine download name.
pub fn engine_version(name: &str) -> &str {
    name.strip_prefix(ENGINE_NAME_PREFIX).unwrap_or(name)
}

/// Handle a reload request on the main context.
///
/// Reloads `library`, prefetches `name` for maps and games, and reports the
/// outcome as [`DownloadEvent::Reloaded`] or [`DownloadEvent::ReloadFailed`].
/// Returns `true` on success.
pub fn handle_reload_request(
    library: &mut dyn ContentLibrary,
    category: Category,
    name: &str,
    sink: &dyn EventSink,
) -> bool {
    if let Err(e) = library.reload() {
        warn!(category = %category, name = %name, error = %e, "Couldn't reload content library");
        sink.send(DownloadEvent::ReloadFailed {
            name: name.to_string(),
        });
        return false;
    }

    match category {
        Category::Map => library.prefetch_map(name),
        Category::Game => library.prefetch_game(name),
        _ => {}
    }
    sink.send(DownloadEvent::Reloaded {
        name: name.to_string(),
    });
    true
}
