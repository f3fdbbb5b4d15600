//! Loading, validating and persisting `sources.json`.
//!
//! The store never fails outright on load: every problem is folded into the
//! returned [`DownloaderSourcesConfig`] as a [`LoadState`] plus a diagnostic
//! string. Persistence goes through [`write_atomic`], which writes a sibling
//! `<path>.tmp` file and renames it over the target so readers never observe
//! a half-written file.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use super::error::{SourcesError, SourcesResult};
use super::types::{
    normalize_map_base_url, push_unique_url, DownloaderSourcesConfig, EffectiveSourcesConfig,
    EngineProvider, LoadState, ProviderKind,
};

/// File name of the sources configuration inside the write directory.
pub const SOURCES_FILE_NAME: &str = "sources.json";

/// The only supported `version` value.
pub const SOURCES_FILE_VERSION: i64 = 1;

/// Access to `sources.json` in one write directory.
#[derive(Debug, Clone)]
pub struct SourcesStore {
    write_dir: PathBuf,
}

impl SourcesStore {
    /// Create a store rooted at `write_dir`.
    pub fn new(write_dir: impl Into<PathBuf>) -> Self {
        Self {
            write_dir: write_dir.into(),
        }
    }

    /// Path of the sources file. Always `<write_dir>/sources.json`.
    pub fn path(&self) -> PathBuf {
        self.write_dir.join(SOURCES_FILE_NAME)
    }

    /// Load and validate the sources file.
    pub fn load(&self) -> DownloaderSourcesConfig {
        let config = DownloaderSourcesConfig::new(self.path());

        let raw = match fs::read(&config.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %config.path.display(), "Sources file not found");
                return config;
            }
            Err(e) => return invalid(config, SourcesError::Read(e)),
        };

        let mut parsed = DownloaderSourcesConfig::new(config.path.clone());
        match parse_into(&raw, &mut parsed) {
            Ok(()) => {
                parsed.load_state = LoadState::LoadedFromFile;
                debug!(
                    path = %parsed.path.display(),
                    masters = parsed.rapid_master_urls.len(),
                    maps = parsed.map_base_urls.len(),
                    providers = parsed.engine_providers.len(),
                    "Loaded sources file"
                );
                parsed
            }
            Err(e) => invalid(config, e),
        }
    }

    /// Serialize `config` and atomically replace the sources file with it.
    pub fn save(&self, config: &EffectiveSourcesConfig) -> SourcesResult<()> {
        let content = build_sources_json(config)?;
        write_atomic(&self.path(), content.as_bytes())
    }
}

fn invalid(mut config: DownloaderSourcesConfig, error: SourcesError) -> DownloaderSourcesConfig {
    debug!(path = %config.path.display(), error = %error, "Sources file rejected");
    config.load_state = LoadState::InvalidFile;
    config.error = error.to_string();
    config
}

// =============================================================================
// Validation
// =============================================================================

fn parse_into(raw: &[u8], config: &mut DownloaderSourcesConfig) -> SourcesResult<()> {
    let root: Value = serde_json::from_slice(raw)?;
    let root = root
        .as_object()
        .ok_or_else(|| SourcesError::Invalid("root must be a JSON object".to_string()))?;

    if let Some(version) = root.get("version") {
        if whole_number(version) != Some(SOURCES_FILE_VERSION as f64) {
            return Err(SourcesError::Invalid(
                "unsupported or invalid version (expected 1)".to_string(),
            ));
        }
    }

    let rapid = root.get("rapid").and_then(Value::as_object);
    let maps = root.get("maps").and_then(Value::as_object);
    let (Some(rapid), Some(maps)) = (rapid, maps) else {
        return Err(SourcesError::Invalid(
            "missing or invalid rapid/maps sections".to_string(),
        ));
    };

    config.rapid_master_urls = parse_url_array(rapid.get("master_urls"), false)
        .map_err(|reason| SourcesError::field("rapid.master_urls", reason))?;
    config.map_base_urls = parse_url_array(maps.get("base_urls"), true)
        .map_err(|reason| SourcesError::field("maps.base_urls", reason))?;

    if let Some(secs) = parse_timeout(rapid, "rapid", "repo_timeout_seconds")? {
        config.rapid_repo_timeout_seconds = secs;
    }
    if let Some(secs) = parse_timeout(maps, "maps", "download_timeout_seconds")? {
        config.map_download_timeout_seconds = secs;
    }

    if let Some(engine) = root.get("engine") {
        let engine = engine.as_object().ok_or_else(|| {
            SourcesError::Invalid("engine section must be a JSON object".to_string())
        })?;
        config.engine_providers = parse_engine_providers(engine.get("providers"))
            .map_err(|reason| SourcesError::field("engine.providers", reason))?;
        if let Some(secs) = parse_timeout(engine, "engine", "download_timeout_seconds")? {
            config.engine_download_timeout_seconds = secs;
        }
    }

    Ok(())
}

fn parse_url_array(node: Option<&Value>, map_base: bool) -> Result<Vec<String>, &'static str> {
    let items = node
        .and_then(Value::as_array)
        .ok_or("expected array of URLs")?;

    let mut urls = Vec::new();
    for item in items {
        let url = item.as_str().ok_or("array contains non-string URL value")?;
        if map_base {
            push_unique_url(&mut urls, &normalize_map_base_url(url));
        } else {
            push_unique_url(&mut urls, url);
        }
    }

    if urls.is_empty() {
        return Err("URL array is empty");
    }
    Ok(urls)
}

fn parse_engine_providers(node: Option<&Value>) -> Result<Vec<EngineProvider>, String> {
    let items = node
        .and_then(Value::as_array)
        .ok_or("expected array of providers")?;

    let mut providers: Vec<EngineProvider> = Vec::new();
    for item in items {
        let entry = item.as_object().ok_or("provider entry must be an object")?;
        let (Some(kind), Some(url)) = (
            entry.get("type").and_then(Value::as_str),
            entry.get("url").and_then(Value::as_str),
        ) else {
            return Err("provider entry requires string fields type and url".to_string());
        };

        let kind: ProviderKind = kind
            .parse()
            .map_err(|other| format!("unsupported provider type: {}", other))?;
        let url = url.trim();
        if url.is_empty() {
            return Err("provider url cannot be empty".to_string());
        }
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();

        let provider = EngineProvider::new(kind, url).with_name(name);
        if !providers.iter().any(|p| p.same_endpoint(&provider)) {
            providers.push(provider);
        }
    }

    if providers.is_empty() {
        return Err("providers array is empty".to_string());
    }
    Ok(providers)
}

/// Absent keys keep the caller's default.
fn parse_timeout(
    section: &Map<String, Value>,
    section_name: &str,
    key: &str,
) -> SourcesResult<Option<u64>> {
    let Some(value) = section.get(key) else {
        return Ok(None);
    };
    let field = format!("{}.{}", section_name, key);
    if let Some(secs) = value.as_u64() {
        return Ok(Some(secs));
    }
    match whole_number(value) {
        Some(n) if n < 0.0 => Err(SourcesError::field(&field, "must be >= 0")),
        Some(n) if n <= u64::MAX as f64 => Ok(Some(n as u64)),
        _ => Err(SourcesError::field(&field, "must be an integer")),
    }
}

/// Numeric value without a fractional part; `20` and `20.0` both qualify.
fn whole_number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .filter(|n| n.is_finite() && n.fract() == 0.0)
}

// =============================================================================
// Persistence
// =============================================================================

#[derive(Serialize)]
struct SourcesDocument<'a> {
    version: i64,
    rapid: RapidSection<'a>,
    maps: MapsSection<'a>,
    engine: EngineSection<'a>,
}

#[derive(Serialize)]
struct RapidSection<'a> {
    master_urls: &'a [String],
    repo_timeout_seconds: u64,
}

#[derive(Serialize)]
struct MapsSection<'a> {
    base_urls: &'a [String],
    download_timeout_seconds: u64,
}

#[derive(Serialize)]
struct EngineSection<'a> {
    providers: &'a [EngineProvider],
    download_timeout_seconds: u64,
}

/// Render `config` as a version 1 sources document with 2-space indentation.
pub fn build_sources_json(config: &EffectiveSourcesConfig) -> SourcesResult<String> {
    let document = SourcesDocument {
        version: SOURCES_FILE_VERSION,
        rapid: RapidSection {
            master_urls: &config.rapid_master_urls,
            repo_timeout_seconds: config.rapid_repo_timeout_seconds,
        },
        maps: MapsSection {
            base_urls: &config.map_base_urls,
            download_timeout_seconds: config.map_download_timeout_seconds,
        },
        engine: EngineSection {
            providers: &config.engine_providers,
            download_timeout_seconds: config.engine_download_timeout_seconds,
        },
    };

    let mut json = serde_json::to_string_pretty(&document)?;
    json.push('\n');
    Ok(json)
}

/// Write `content` to `path` through a temp file and rename.
///
/// On any failure the temp file is removed and the first error is returned;
/// the previous content of `path`, if any, is left untouched.
pub fn write_atomic(path: &Path, content: &[u8]) -> SourcesResult<()> {
    write_atomic_with(path, |writer| writer.write_all(content))
}

pub(crate) fn write_atomic_with<F>(path: &Path, write: F) -> SourcesResult<()>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let temp_path = temp_path_for(path);
    let persist_error = |step: &'static str, source: io::Error| SourcesError::Persist {
        path: path.to_path_buf(),
        step,
        source,
    };

    if let Err((step, source)) = write_temp(&temp_path, write) {
        fs::remove_file(&temp_path).ok();
        return Err(persist_error(step, source));
    }

    fs::rename(&temp_path, path).map_err(|e| {
        fs::remove_file(&temp_path).ok();
        persist_error("cannot replace target file", e)
    })
}

fn write_temp<F>(temp_path: &Path, write: F) -> Result<(), (&'static str, io::Error)>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let file = File::create(temp_path).map_err(|e| ("cannot open temp file", e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer).map_err(|e| ("cannot write temp file", e))?;
    let file = writer
        .into_inner()
        .map_err(|e| ("cannot flush temp file", e.into_error()))?;
    file.sync_all().map_err(|e| ("cannot close temp file", e))?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::defaults;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_sources(dir: &TempDir, value: &Value) -> SourcesStore {
        fs::write(dir.path().join(SOURCES_FILE_NAME), value.to_string()).unwrap();
        SourcesStore::new(dir.path())
    }

    fn valid_document() -> Value {
        json!({
            "version": 1,
            "rapid": {
                "master_urls": ["https://a/repos.gz", "https://b/repos.gz"],
                "repo_timeout_seconds": 5
            },
            "maps": {
                "base_urls": ["http://m/maps"],
                "download_timeout_seconds": 7
            },
            "engine": {
                "providers": [
                    {"type": "springfiles", "url": "https://sf/json.php", "name": "SF"}
                ],
                "download_timeout_seconds": 9
            }
        })
    }

    fn error_for(value: Value) -> String {
        let temp = TempDir::new().unwrap();
        let config = write_sources(&temp, &value).load();
        assert_eq!(config.load_state, LoadState::InvalidFile);
        config.error
    }

    #[test]
    fn test_path_is_write_dir_sources_json() {
        let store = SourcesStore::new("/data/lobby");
        assert_eq!(store.path(), PathBuf::from("/data/lobby/sources.json"));
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let config = SourcesStore::new(temp.path()).load();

        assert_eq!(config.load_state, LoadState::Missing);
        assert!(config.rapid_master_urls.is_empty());
        assert!(config.error.is_empty());
        assert_eq!(config.path, temp.path().join(SOURCES_FILE_NAME));
    }

    #[test]
    fn test_load_valid_file() {
        let temp = TempDir::new().unwrap();
        let config = write_sources(&temp, &valid_document()).load();

        assert_eq!(config.load_state, LoadState::LoadedFromFile);
        assert_eq!(
            config.rapid_master_urls,
            vec!["https://a/repos.gz", "https://b/repos.gz"]
        );
        assert_eq!(config.map_base_urls, vec!["http://m/maps/"]);
        assert_eq!(config.engine_providers.len(), 1);
        assert_eq!(config.engine_providers[0].kind, ProviderKind::Springfiles);
        assert_eq!(config.engine_providers[0].name.as_deref(), Some("SF"));
        assert_eq!(config.rapid_repo_timeout_seconds, 5);
        assert_eq!(config.map_download_timeout_seconds, 7);
        assert_eq!(config.engine_download_timeout_seconds, 9);
    }

    #[test]
    fn test_load_tolerates_whitespace_and_missing_version() {
        let temp = TempDir::new().unwrap();
        let raw = "\n\n  {\"rapid\" : {\"master_urls\":[\"u\"]},\t\"maps\":{\"base_urls\":[\"m/\"]}}  \n";
        fs::write(temp.path().join(SOURCES_FILE_NAME), raw).unwrap();

        let config = SourcesStore::new(temp.path()).load();
        assert_eq!(config.load_state, LoadState::LoadedFromFile);
        assert_eq!(config.rapid_repo_timeout_seconds, FILE_DEFAULT_TIMEOUT);
        assert!(config.engine_providers.is_empty());
    }

    const FILE_DEFAULT_TIMEOUT: u64 = crate::sources::types::FILE_DEFAULT_TIMEOUT_SECS;

    #[test]
    fn test_duplicates_collapse_first_wins() {
        let temp = TempDir::new().unwrap();
        let document = json!({
            "rapid": {"master_urls": [" https://b ", "https://a", "https://b"]},
            "maps": {"base_urls": ["http://m", "http://m/", "http://n/"]},
            "engine": {"providers": [
                {"type": "springfiles", "url": "https://sf", "name": "first"},
                {"type": "SpringFiles", "url": " https://sf ", "name": "second"},
                {"type": "github_releases", "url": "https://sf"}
            ]}
        });
        let config = write_sources(&temp, &document).load();

        assert_eq!(config.rapid_master_urls, vec!["https://b", "https://a"]);
        assert_eq!(config.map_base_urls, vec!["http://m/", "http://n/"]);
        assert_eq!(config.engine_providers.len(), 2);
        assert_eq!(config.engine_providers[0].name.as_deref(), Some("first"));
    }

    #[test]
    fn test_invalid_json() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(SOURCES_FILE_NAME), "{ not json").unwrap();
        let config = SourcesStore::new(temp.path()).load();

        assert_eq!(config.load_state, LoadState::InvalidFile);
        assert!(config.error.starts_with("invalid JSON: "));
    }

    #[test]
    fn test_root_must_be_object() {
        assert_eq!(error_for(json!([1, 2])), "root must be a JSON object");
    }

    #[test]
    fn test_wrong_version() {
        let mut document = valid_document();
        document["version"] = json!(2);
        assert_eq!(
            error_for(document),
            "unsupported or invalid version (expected 1)"
        );

        let mut document = valid_document();
        document["version"] = json!(1.5);
        assert_eq!(
            error_for(document),
            "unsupported or invalid version (expected 1)"
        );

        let mut document = valid_document();
        document["version"] = json!("1");
        assert_eq!(
            error_for(document),
            "unsupported or invalid version (expected 1)"
        );
    }

    #[test]
    fn test_missing_sections() {
        let mut document = valid_document();
        document.as_object_mut().unwrap().remove("maps");
        assert_eq!(error_for(document), "missing or invalid rapid/maps sections");

        let mut document = valid_document();
        document["rapid"] = json!([]);
        assert_eq!(error_for(document), "missing or invalid rapid/maps sections");
    }

    #[test]
    fn test_url_array_errors() {
        let mut document = valid_document();
        document["rapid"]["master_urls"] = json!([]);
        assert_eq!(error_for(document), "rapid.master_urls: URL array is empty");

        let mut document = valid_document();
        document["rapid"]["master_urls"] = json!(["  ", ""]);
        assert_eq!(error_for(document), "rapid.master_urls: URL array is empty");

        let mut document = valid_document();
        document["maps"]["base_urls"] = json!(["http://m/", 3]);
        assert_eq!(
            error_for(document),
            "maps.base_urls: array contains non-string URL value"
        );

        let mut document = valid_document();
        document["maps"]["base_urls"] = json!("http://m/");
        assert_eq!(error_for(document), "maps.base_urls: expected array of URLs");
    }

    #[test]
    fn test_whole_number_floats_accepted() {
        let temp = TempDir::new().unwrap();
        let mut document = valid_document();
        document["version"] = json!(1.0);
        document["rapid"]["repo_timeout_seconds"] = json!(20.0);
        document["engine"]["download_timeout_seconds"] = json!(0.0);
        let config = write_sources(&temp, &document).load();

        assert_eq!(config.load_state, LoadState::LoadedFromFile);
        assert_eq!(config.rapid_repo_timeout_seconds, 20);
        assert_eq!(config.engine_download_timeout_seconds, 0);
    }

    #[test]
    fn test_timeout_errors() {
        let mut document = valid_document();
        document["rapid"]["repo_timeout_seconds"] = json!(-1);
        assert_eq!(
            error_for(document),
            "rapid.repo_timeout_seconds: must be >= 0"
        );

        let mut document = valid_document();
        document["maps"]["download_timeout_seconds"] = json!("10");
        assert_eq!(
            error_for(document),
            "maps.download_timeout_seconds: must be an integer"
        );

        let mut document = valid_document();
        document["maps"]["download_timeout_seconds"] = json!(-3.0);
        assert_eq!(
            error_for(document),
            "maps.download_timeout_seconds: must be >= 0"
        );

        let mut document = valid_document();
        document["engine"]["download_timeout_seconds"] = json!(1.5);
        assert_eq!(
            error_for(document),
            "engine.download_timeout_seconds: must be an integer"
        );
    }

    #[test]
    fn test_engine_section_errors() {
        let mut document = valid_document();
        document["engine"] = json!("github");
        assert_eq!(error_for(document), "engine section must be a JSON object");

        let mut document = valid_document();
        document["engine"] = json!({});
        assert_eq!(
            error_for(document),
            "engine.providers: expected array of providers"
        );

        let mut document = valid_document();
        document["engine"]["providers"] = json!([]);
        assert_eq!(error_for(document), "engine.providers: providers array is empty");

        let mut document = valid_document();
        document["engine"]["providers"] = json!(["springfiles"]);
        assert_eq!(
            error_for(document),
            "engine.providers: provider entry must be an object"
        );

        let mut document = valid_document();
        document["engine"]["providers"] = json!([{"type": "springfiles"}]);
        assert_eq!(
            error_for(document),
            "engine.providers: provider entry requires string fields type and url"
        );

        let mut document = valid_document();
        document["engine"]["providers"] = json!([{"type": "torrent", "url": "u"}]);
        assert_eq!(
            error_for(document),
            "engine.providers: unsupported provider type: torrent"
        );

        let mut document = valid_document();
        document["engine"]["providers"] = json!([{"type": "springfiles", "url": "  "}]);
        assert_eq!(
            error_for(document),
            "engine.providers: provider url cannot be empty"
        );
    }

    #[test]
    fn test_unreadable_path_is_invalid() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join(SOURCES_FILE_NAME)).unwrap();

        let config = SourcesStore::new(temp.path()).load();
        assert_eq!(config.load_state, LoadState::InvalidFile);
        assert!(config.error.starts_with("failed to open file: "));
    }

    #[test]
    fn test_build_sources_json_layout() {
        let json = build_sources_json(&defaults::safe_defaults()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], json!(1));
        assert!(json.contains("\n  \"rapid\": {\n    \"master_urls\""));
        assert_eq!(value["engine"]["providers"][0]["type"], json!("github_releases"));
        assert_eq!(value["maps"]["download_timeout_seconds"], json!(0));
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = SourcesStore::new(temp.path());
        let mut config = defaults::safe_defaults();
        config.rapid_repo_timeout_seconds = 11;
        config.engine_download_timeout_seconds = 13;

        store.save(&config).unwrap();
        let loaded = store.load();

        assert_eq!(loaded.load_state, LoadState::LoadedFromFile);
        assert_eq!(loaded.rapid_master_urls, config.rapid_master_urls);
        assert_eq!(loaded.map_base_urls, config.map_base_urls);
        assert_eq!(loaded.engine_providers, config.engine_providers);
        assert_eq!(loaded.rapid_repo_timeout_seconds, 11);
        assert_eq!(loaded.map_download_timeout_seconds, 0);
        assert_eq!(loaded.engine_download_timeout_seconds, 13);
    }

    #[test]
    fn test_write_atomic_replaces_and_cleans_up() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("target.json");
        fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_interrupted_write_leaves_target_untouched() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("target.json");
        fs::write(&path, "original").unwrap();

        let result = write_atomic_with(&path, |writer| {
            writer.write_all(b"{\"half\": ")?;
            writer.flush()?;
            Err(io::Error::other("simulated crash"))
        });

        let err = result.unwrap_err();
        assert!(matches!(
            err,
            SourcesError::Persist {
                step: "cannot write temp file",
                ..
            }
        ));
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_write_atomic_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing").join("sources.json");

        let err = write_atomic(&path, b"{}").unwrap_err();
        assert!(err.to_string().starts_with("cannot open temp file"));
        assert!(!path.exists());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_master_urls_dedup_first_occurrence(
                urls in prop::collection::vec("[ ]?https://[a-d]{1,2}[ ]?", 1..12)
            ) {
                let document = json!({
                    "rapid": {"master_urls": urls},
                    "maps": {"base_urls": ["http://m/"]}
                });
                let mut config = DownloaderSourcesConfig::new(PathBuf::from("sources.json"));
                parse_into(document.to_string().as_bytes(), &mut config).unwrap();

                let mut expected: Vec<String> = Vec::new();
                for url in &urls {
                    let url = url.trim().to_string();
                    if !expected.contains(&url) {
                        expected.push(url);
                    }
                }
                prop_assert_eq!(config.rapid_master_urls, expected);
            }

            #[test]
            fn test_map_urls_always_end_with_slash(
                urls in prop::collection::vec("http://[a-c]{1,3}/?", 1..8)
            ) {
                let document = json!({
                    "rapid": {"master_urls": ["u"]},
                    "maps": {"base_urls": urls}
                });
                let mut config = DownloaderSourcesConfig::new(PathBuf::from("sources.json"));
                parse_into(document.to_string().as_bytes(), &mut config).unwrap();

                prop_assert!(config.map_base_urls.iter().all(|u| u.ends_with('/')));
                let mut sorted = config.map_base_urls.clone();
                sorted.sort();
                sorted.dedup();
                prop_assert_eq!(sorted.len(), config.map_base_urls.len());
            }
        }
    }
}
