//! Value types for download sources.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

/// Timeout applied to a file section that omits its timeout field.
pub const FILE_DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Kind of engine-release provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// GitHub releases API listing engine builds.
    GithubReleases,
    /// SpringFiles JSON search endpoint.
    Springfiles,
}

impl ProviderKind {
    /// Identifier used in `sources.json` and the engine option.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GithubReleases => "github_releases",
            Self::Springfiles => "springfiles",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github_releases" => Ok(Self::GithubReleases),
            "springfiles" => Ok(Self::Springfiles),
            other => Err(other.to_string()),
        }
    }
}

/// An engine-release provider entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineProvider {
    #[serde(rename = "type")]
    pub kind: ProviderKind,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EngineProvider {
    /// Create a provider entry.
    pub fn new(kind: ProviderKind, url: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            name: None,
        }
    }

    /// Attach a display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.name = if name.is_empty() { None } else { Some(name) };
        self
    }

    /// Two providers are duplicates when type and URL match; names are ignored.
    pub fn same_endpoint(&self, other: &EngineProvider) -> bool {
        self.kind == other.kind && self.url == other.url
    }
}

/// Outcome of reading `sources.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// No file at the expected path.
    #[default]
    Missing,
    /// File read and validated.
    LoadedFromFile,
    /// File present but unreadable or invalid; see `error`.
    InvalidFile,
}

/// Raw result of loading `sources.json` through the store.
///
/// Lists are empty unless `load_state` is [`LoadState::LoadedFromFile`];
/// `engine_providers` may also be empty for a valid file without an `engine`
/// section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloaderSourcesConfig {
    pub load_state: LoadState,
    pub rapid_master_urls: Vec<String>,
    pub map_base_urls: Vec<String>,
    pub engine_providers: Vec<EngineProvider>,
    pub rapid_repo_timeout_seconds: u64,
    pub map_download_timeout_seconds: u64,
    pub engine_download_timeout_seconds: u64,
    pub error: String,
    pub path: PathBuf,
}

impl DownloaderSourcesConfig {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            load_state: LoadState::Missing,
            rapid_master_urls: Vec::new(),
            map_base_urls: Vec::new(),
            engine_providers: Vec::new(),
            rapid_repo_timeout_seconds: FILE_DEFAULT_TIMEOUT_SECS,
            map_download_timeout_seconds: FILE_DEFAULT_TIMEOUT_SECS,
            engine_download_timeout_seconds: FILE_DEFAULT_TIMEOUT_SECS,
            error: String::new(),
            path,
        }
    }
}

/// Where the effective configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// An existing, valid sources file.
    LoadedFromFile,
    /// A sources file written during this resolution and read back.
    CreatedFile,
    /// Built-in defaults because the file on disk is invalid.
    SafeDefaults,
    /// Legacy settings (or defaults) for this session only; nothing persisted.
    SessionOnly,
}

/// The fully resolved set of sources for one resolution call.
///
/// Rebuilt on every call to
/// [`SourcesResolver::resolve`](super::SourcesResolver::resolve); never
/// mutated afterwards. `rapid_master_urls` and `map_base_urls` are never empty.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EffectiveSourcesConfig {
    pub rapid_master_urls: Vec<String>,
    pub map_base_urls: Vec<String>,
    pub engine_providers: Vec<EngineProvider>,
    pub rapid_repo_timeout_seconds: u64,
    pub map_download_timeout_seconds: u64,
    pub engine_download_timeout_seconds: u64,
    pub loaded_from_sources_file: bool,
    pub created_sources_file: bool,
    pub using_safe_defaults_because_file_invalid: bool,
    pub sources_file_path: PathBuf,
    pub sources_file_error: String,
}

impl EffectiveSourcesConfig {
    /// Primary rapid master URL.
    pub fn primary_master_url(&self) -> Option<&str> {
        self.rapid_master_urls.first().map(String::as_str)
    }

    /// Collapse the provenance flags into one value.
    pub fn provenance(&self) -> Provenance {
        if self.created_sources_file {
            Provenance::CreatedFile
        } else if self.loaded_from_sources_file {
            Provenance::LoadedFromFile
        } else if self.using_safe_defaults_because_file_invalid {
            Provenance::SafeDefaults
        } else {
            Provenance::SessionOnly
        }
    }

    /// Adopt the values of a successfully loaded file.
    pub(crate) fn from_loaded_file(file: &DownloaderSourcesConfig) -> Self {
        Self {
            rapid_master_urls: file.rapid_master_urls.clone(),
            map_base_urls: file.map_base_urls.clone(),
            engine_providers: file.engine_providers.clone(),
            rapid_repo_timeout_seconds: file.rapid_repo_timeout_seconds,
            map_download_timeout_seconds: file.map_download_timeout_seconds,
            engine_download_timeout_seconds: file.engine_download_timeout_seconds,
            loaded_from_sources_file: true,
            sources_file_path: file.path.clone(),
            ..Self::default()
        }
    }
}

/// Trim `url` and append it unless it is empty or already present.
pub(crate) fn push_unique_url(list: &mut Vec<String>, url: &str) {
    let url = url.trim();
    if url.is_empty() || list.iter().any(|existing| existing == url) {
        return;
    }
    list.push(url.to_string());
}

/// Trim a map base URL and make sure it ends with `/`.
pub(crate) fn normalize_map_base_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if !url.is_empty() && !url.ends_with('/') {
        url.push('/');
    }
    url
}
