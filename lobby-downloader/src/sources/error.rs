//! Error types for the sources configuration.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for sources operations.
pub type SourcesResult<T> = Result<T, SourcesError>;

/// Errors that can occur while loading or persisting `sources.json`.
///
/// The `Display` text of the load-side variants is the exact diagnostic kept in
/// [`DownloaderSourcesConfig::error`](super::DownloaderSourcesConfig::error).
#[derive(Debug, Error)]
pub enum SourcesError {
    /// The file exists but could not be read.
    #[error("failed to open file: {0}")]
    Read(#[source] io::Error),

    /// The file is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The file is valid JSON but violates the sources schema.
    #[error("{0}")]
    Invalid(String),

    /// Writing the file atomically failed at one step.
    #[error("{step}: {source}")]
    Persist {
        path: PathBuf,
        step: &'static str,
        #[source]
        source: io::Error,
    },
}

impl SourcesError {
    /// Build a schema error for a dotted field path, e.g.
    /// `rapid.master_urls: URL array is empty`.
    pub(crate) fn field(field: &str, reason: impl std::fmt::Display) -> Self {
        Self::Invalid(format!("{}: {}", field, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_error_display() {
        let err = SourcesError::field("rapid.master_urls", "URL array is empty");
        assert_eq!(err.to_string(), "rapid.master_urls: URL array is empty");
    }

    #[test]
    fn test_read_error_display() {
        let err = SourcesError::Read(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert_eq!(err.to_string(), "failed to open file: denied");
    }

    #[test]
    fn test_persist_error_names_step() {
        let err = SourcesError::Persist {
            path: PathBuf::from("/tmp/sources.json"),
            step: "cannot write temp file",
            source: io::Error::other("disk full"),
        };
        assert_eq!(err.to_string(), "cannot write temp file: disk full");
    }
}
