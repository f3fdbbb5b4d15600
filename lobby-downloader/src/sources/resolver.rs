//! Resolution of the effective sources configuration.
//!
//! Resolution never fails. A valid file wins; an invalid file falls back to
//! the safe defaults for the session; a missing file is created from the
//! legacy settings (or the safe defaults) and read back to confirm it.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::defaults::{
    default_engine_providers, safe_defaults, DEFAULT_MAP_BASE_URL, DEFAULT_RAPID_MASTER_PRIMARY,
    DEFAULT_RAPID_MASTER_SECONDARY,
};
use super::store::SourcesStore;
use super::types::{
    normalize_map_base_url, push_unique_url, EffectiveSourcesConfig, LoadState,
};

/// Back-compat scalar settings predating `sources.json`.
///
/// Used only to seed a sources file that does not exist yet. A timeout of 0
/// means "no override".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySettings {
    pub rapid_master_url: String,
    pub rapid_master_fallback_url: String,
    pub map_base_url: String,
    pub rapid_repo_timeout_seconds: u64,
    pub map_download_timeout_seconds: u64,
    pub engine_download_timeout_seconds: u64,
}

impl Default for LegacySettings {
    fn default() -> Self {
        Self {
            rapid_master_url: DEFAULT_RAPID_MASTER_PRIMARY.to_string(),
            rapid_master_fallback_url: DEFAULT_RAPID_MASTER_SECONDARY.to_string(),
            map_base_url: DEFAULT_MAP_BASE_URL.to_string(),
            rapid_repo_timeout_seconds: 0,
            map_download_timeout_seconds: 0,
            engine_download_timeout_seconds: 0,
        }
    }
}

impl LegacySettings {
    /// Build a sources configuration from the scalar settings.
    ///
    /// Blank URLs are skipped; if nothing usable remains for a list, the
    /// built-in default is used so the result is never empty.
    pub fn to_sources_config(&self) -> EffectiveSourcesConfig {
        let mut config = EffectiveSourcesConfig {
            engine_providers: default_engine_providers(),
            rapid_repo_timeout_seconds: self.rapid_repo_timeout_seconds,
            map_download_timeout_seconds: self.map_download_timeout_seconds,
            engine_download_timeout_seconds: self.engine_download_timeout_seconds,
            ..EffectiveSourcesConfig::default()
        };

        push_unique_url(&mut config.rapid_master_urls, &self.rapid_master_url);
        push_unique_url(&mut config.rapid_master_urls, &self.rapid_master_fallback_url);
        push_unique_url(
            &mut config.map_base_urls,
            &normalize_map_base_url(&self.map_base_url),
        );

        if config.rapid_master_urls.is_empty() {
            config
                .rapid_master_urls
                .push(DEFAULT_RAPID_MASTER_PRIMARY.to_string());
        }
        if config.map_base_urls.is_empty() {
            config.map_base_urls.push(DEFAULT_MAP_BASE_URL.to_string());
        }
        config
    }
}

/// Merges the sources file, legacy settings and built-in defaults.
#[derive(Debug, Clone)]
pub struct SourcesResolver {
    store: SourcesStore,
    legacy: Option<LegacySettings>,
}

impl SourcesResolver {
    /// Create a resolver for the sources file in `write_dir`.
    pub fn new(write_dir: impl Into<PathBuf>) -> Self {
        Self {
            store: SourcesStore::new(write_dir),
            legacy: None,
        }
    }

    /// Seed a missing sources file from these legacy settings.
    pub fn with_legacy(mut self, legacy: Option<LegacySettings>) -> Self {
        self.legacy = legacy;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &SourcesStore {
        &self.store
    }

    /// Build the effective configuration for one download or settings refresh.
    pub fn resolve(&self) -> EffectiveSourcesConfig {
        let file = self.store.load();

        match file.load_state {
            LoadState::LoadedFromFile => {
                let mut config = EffectiveSourcesConfig::from_loaded_file(&file);
                backfill_providers(&mut config);
                config
            }
            LoadState::InvalidFile => EffectiveSourcesConfig {
                using_safe_defaults_because_file_invalid: true,
                sources_file_path: file.path,
                sources_file_error: file.error,
                ..safe_defaults()
            },
            LoadState::Missing => self.create_sources_file(file.path),
        }
    }

    fn create_sources_file(&self, path: PathBuf) -> EffectiveSourcesConfig {
        let mut seed = match &self.legacy {
            Some(legacy) => legacy.to_sources_config(),
            None => safe_defaults(),
        };
        seed.sources_file_path = path;

        if let Err(e) = self.store.save(&seed) {
            warn!(
                path = %seed.sources_file_path.display(),
                error = %e,
                "Could not create downloader sources file, using legacy settings for this session"
            );
            return seed;
        }

        let reloaded = self.store.load();
        if reloaded.load_state != LoadState::LoadedFromFile {
            warn!(
                path = %seed.sources_file_path.display(),
                error = %reloaded.error,
                "Created downloader sources file but could not reload it, using legacy settings for this session"
            );
            return seed;
        }

        info!(path = %reloaded.path.display(), "Created downloader sources file");
        let mut config = EffectiveSourcesConfig::from_loaded_file(&reloaded);
        config.created_sources_file = true;
        backfill_providers(&mut config);
        config
    }
}

fn backfill_providers(config: &mut EffectiveSourcesConfig) {
    if config.engine_providers.is_empty() {
        debug!("Sources file has no engine providers, using built-in providers");
        config.engine_providers = default_engine_providers();
    }
}
