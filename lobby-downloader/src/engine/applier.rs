//! Pushes a resolved sources configuration onto the engine options.

use tracing::{debug, warn};

use super::{Backend, DownloaderEngine};
use crate::sources::EffectiveSourcesConfig;

/// Engine option keys written by [`SourceApplier`].
pub mod option_keys {
    /// Active rapid master index (rapid backend).
    pub const MASTER_URL: &str = "masterurl";
    /// Rapid repository index timeout (rapid backend).
    pub const REPO_TIMEOUT_SECONDS: &str = "repo_timeout_seconds";
    pub const MAP_DOWNLOAD_TIMEOUT_SECONDS: &str = "map_download_timeout_seconds";
    pub const ENGINE_DOWNLOAD_TIMEOUT_SECONDS: &str = "engine_download_timeout_seconds";
    /// Provider list as compact JSON (http backend).
    pub const ENGINE_PROVIDERS: &str = "engine_providers";
    /// First map mirror (http backend).
    pub const MAP_BASE_URL: &str = "map_base_url";
    /// All map mirrors, newline separated (http backend).
    pub const MAP_BASE_URLS: &str = "map_base_urls";
}

/// The single writer of engine options.
///
/// Every option the downloader sets goes through this type, and it is only
/// called on the download worker immediately before an attempt (or during
/// service construction, before the worker exists).
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceApplier;

impl SourceApplier {
    /// Write every value of `config` to the engine.
    ///
    /// Idempotent: applying the same config twice leaves the same options.
    pub fn apply(engine: &mut dyn DownloaderEngine, config: &EffectiveSourcesConfig) {
        if let Some(primary) = config.primary_master_url() {
            Self::set_master_url(engine, primary);
        }
        engine.set_option(
            Backend::Rapid,
            option_keys::REPO_TIMEOUT_SECONDS,
            &config.rapid_repo_timeout_seconds.to_string(),
        );
        engine.set_option(
            Backend::Http,
            option_keys::MAP_DOWNLOAD_TIMEOUT_SECONDS,
            &config.map_download_timeout_seconds.to_string(),
        );
        engine.set_option(
            Backend::Http,
            option_keys::ENGINE_DOWNLOAD_TIMEOUT_SECONDS,
            &config.engine_download_timeout_seconds.to_string(),
        );

        let providers = serde_json::to_string(&config.engine_providers).unwrap_or_else(|e| {
            warn!(error = %e, "Could not serialize engine providers");
            "[]".to_string()
        });
        engine.set_option(Backend::Http, option_keys::ENGINE_PROVIDERS, &providers);

        match config.map_base_urls.first() {
            Some(first) => {
                engine.set_option(Backend::Http, option_keys::MAP_BASE_URL, first);
                engine.set_option(
                    Backend::Http,
                    option_keys::MAP_BASE_URLS,
                    &config.map_base_urls.join("\n"),
                );
            }
            None => {
                engine.set_option(Backend::Http, option_keys::MAP_BASE_URL, "");
                engine.set_option(Backend::Http, option_keys::MAP_BASE_URLS, "");
            }
        }

        debug!(
            masters = config.rapid_master_urls.len(),
            maps = config.map_base_urls.len(),
            providers = config.engine_providers.len(),
            "Applied download sources"
        );
    }

    /// Point the rapid backend at `url` for the next search.
    pub fn set_master_url(engine: &mut dyn DownloaderEngine, url: &str) {
        engine.set_option(Backend::Rapid, option_keys::MASTER_URL, url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;
    use crate::sources::safe_defaults;

    #[test]
    fn test_apply_sets_all_options() {
        let mut engine = ScriptedEngine::new();
        let mut config = safe_defaults();
        config.map_base_urls = vec!["http://a/".to_string(), "http://b/".to_string()];
        config.rapid_repo_timeout_seconds = 15;

        SourceApplier::apply(&mut engine, &config);

        assert_eq!(
            engine.option(Backend::Rapid, option_keys::MASTER_URL),
            Some(config.rapid_master_urls[0].as_str())
        );
        assert_eq!(
            engine.option(Backend::Rapid, option_keys::REPO_TIMEOUT_SECONDS),
            Some("15")
        );
        assert_eq!(
            engine.option(Backend::Http, option_keys::MAP_BASE_URL),
            Some("http://a/")
        );
        assert_eq!(
            engine.option(Backend::Http, option_keys::MAP_BASE_URLS),
            Some("http://a/\nhttp://b/")
        );
        assert_eq!(
            engine.option(Backend::Http, option_keys::ENGINE_DOWNLOAD_TIMEOUT_SECONDS),
            Some("0")
        );

        let providers = engine
            .option(Backend::Http, option_keys::ENGINE_PROVIDERS)
            .unwrap();
        assert!(!providers.contains('\n'));
        let parsed: serde_json::Value = serde_json::from_str(providers).unwrap();
        assert_eq!(parsed[1]["type"], "springfiles");
        assert_eq!(parsed[0]["name"], "BAR GitHub");
    }

    #[test]
    fn test_apply_clears_map_options_when_empty() {
        let mut engine = ScriptedEngine::new();
        let mut config = safe_defaults();
        config.map_base_urls.clear();

        SourceApplier::apply(&mut engine, &config);

        assert_eq!(engine.option(Backend::Http, option_keys::MAP_BASE_URL), Some(""));
        assert_eq!(engine.option(Backend::Http, option_keys::MAP_BASE_URLS), Some(""));
    }

    #[test]
    fn test_apply_is_idempotent() {
        let config = safe_defaults();
        let mut once = ScriptedEngine::new();
        SourceApplier::apply(&mut once, &config);

        let mut twice = ScriptedEngine::new();
        SourceApplier::apply(&mut twice, &config);
        SourceApplier::apply(&mut twice, &config);

        assert_eq!(once.options, twice.options);
    }
}
