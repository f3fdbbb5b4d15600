//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; applications that have no
//! subscriber of their own can call [`init_logging`] once at startup. It
//! installs an `EnvFilter` (overridable through `RUST_LOG`), a console layer
//! with local timestamps and, optionally, a non-blocking file layer writing
//! `<log_dir>/downloader.log`.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use time::macros::format_description;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Name of the log file inside [`LogConfig::log_dir`].
pub const LOG_FILE_NAME: &str = "downloader.log";

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Errors from [`init_logging`].
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("logging already initialized")]
    AlreadyInitialized,

    #[error("invalid log filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    #[error("cannot create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
}

/// Logging options.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter directive, used when `RUST_LOG` is unset.
    pub level: String,
    /// Write to stderr.
    pub console: bool,
    /// Colored console output.
    pub ansi: bool,
    /// Also write to `<log_dir>/downloader.log`.
    pub log_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console: true,
            ansi: true,
            log_dir: None,
        }
    }
}

impl LogConfig {
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    pub fn without_console(mut self) -> Self {
        self.console = false;
        self
    }
}

/// Keeps the file writer alive; pending lines are flushed on drop.
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber. Only the first call succeeds.
pub fn init_logging(config: LogConfig) -> Result<LogGuard, LoggingError> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Err(LoggingError::AlreadyInitialized);
    }
    install(&config).inspect_err(|_| INITIALIZED.store(false, Ordering::SeqCst))
}

fn install(config: &LogConfig) -> Result<LogGuard, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => parse_filter(&config.level)?,
    };
    let timer = LocalTime::new(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    ));

    let console_layer = config.console.then(|| {
        fmt::layer()
            .with_writer(io::stderr)
            .with_target(false)
            .with_thread_names(true)
            .with_ansi(config.ansi)
            .with_timer(timer.clone())
    });

    let (file_layer, file_guard) = match &config.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| LoggingError::CreateDir {
                path: dir.clone(),
                source: e,
            })?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true)
                .with_timer(timer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    info!(level = %config.level, "Logging initialized");
    Ok(LogGuard {
        _file_guard: file_guard,
    })
}

fn parse_filter(directive: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(directive).map_err(|e| LoggingError::Filter {
        directive: directive.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_filter() {
        assert!(parse_filter("debug").is_ok());
        assert!(parse_filter("lobby_downloader=trace,warn").is_ok());

        let err = parse_filter("lobby_downloader=loud").unwrap_err();
        assert!(matches!(err, LoggingError::Filter { ref directive, .. } if directive == "lobby_downloader=loud"));
    }

    #[test]
    fn test_config_builder() {
        let config = LogConfig::default()
            .with_level("debug")
            .with_log_dir("/var/log/lobby")
            .without_console();

        assert_eq!(config.level, "debug");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/lobby")));
        assert!(!config.console);
    }

    #[test]
    fn test_init_only_once() {
        let temp = TempDir::new().unwrap();
        let logs = temp.path().join("logs");
        let config = LogConfig::default().with_log_dir(&logs).without_console();

        let _guard = init_logging(config.clone()).unwrap();
        assert!(logs.is_dir());

        assert!(matches!(
            init_logging(config),
            Err(LoggingError::AlreadyInitialized)
        ));
    }
}
