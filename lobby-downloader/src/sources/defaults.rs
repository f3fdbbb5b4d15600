//! Built-in sources used when neither a sources file nor legacy settings
//! provide values.

use super::types::{EffectiveSourcesConfig, EngineProvider, ProviderKind};

/// Preferred rapid master index.
pub const DEFAULT_RAPID_MASTER_PRIMARY: &str = "https://rapid.techa-rts.com/repos.gz";

/// Secondary rapid master index.
pub const DEFAULT_RAPID_MASTER_SECONDARY: &str = "https://repos.springrts.com/repos.gz";

/// Base URL for map archives (.sd7/.sdz).
pub const DEFAULT_MAP_BASE_URL: &str = "http://www.hakora.xyz/files/springrts/maps/";

/// GitHub releases listing for engine builds.
pub const DEFAULT_ENGINE_GITHUB_RELEASES_URL: &str =
    "https://api.github.com/repos/beyond-all-reason/RecoilEngine/releases?per_page=100";

/// SpringFiles search endpoint for engine builds.
pub const DEFAULT_ENGINE_SPRINGFILES_URL: &str = "https://springfiles.springrts.com/json.php";

/// Built-in master URLs with their preference rank (lower is preferred).
const RANKED_RAPID_MASTERS: &[(u8, &str)] = &[
    (1, DEFAULT_RAPID_MASTER_SECONDARY),
    (0, DEFAULT_RAPID_MASTER_PRIMARY),
];

/// Built-in rapid master URLs in preference order.
pub fn default_rapid_master_urls() -> Vec<String> {
    let mut ranked = RANKED_RAPID_MASTERS.to_vec();
    ranked.sort_by_key(|(rank, _)| *rank);
    ranked.into_iter().map(|(_, url)| url.to_string()).collect()
}

/// The two built-in engine providers.
pub fn default_engine_providers() -> Vec<EngineProvider> {
    vec![
        EngineProvider::new(ProviderKind::GithubReleases, DEFAULT_ENGINE_GITHUB_RELEASES_URL)
            .with_name("BAR GitHub"),
        EngineProvider::new(ProviderKind::Springfiles, DEFAULT_ENGINE_SPRINGFILES_URL)
            .with_name("SpringFiles"),
    ]
}

/// Safe defaults: built-in URLs and providers, no timeout overrides.
pub fn safe_defaults() -> EffectiveSourcesConfig {
    EffectiveSourcesConfig {
        rapid_master_urls: default_rapid_master_urls(),
        map_base_urls: vec![DEFAULT_MAP_BASE_URL.to_string()],
        engine_providers: default_engine_providers(),
        rapid_repo_timeout_seconds: 0,
        map_download_timeout_seconds: 0,
        engine_download_timeout_seconds: 0,
        ..EffectiveSourcesConfig::default()
    }
}
