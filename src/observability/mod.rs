//! Logging, correlation ids and metric names.

mod correlation;
mod logging;

pub use correlation::{current_correlation_id, in_correlation_scope};
pub use logging::{DEFAULT_FILTER, LogFormat, LoggingConfig, VERBOSE_FILTER};

use crate::config::LoggingSettings;
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Counter: collection loads, labelled by `outcome` (fresh, degraded, superseded, retained).
pub const METRIC_COLLECTION_LOADS: &str = "keepr_collection_loads_total";

/// Counter: unlock attempts, labelled by `outcome`.
pub const METRIC_UNLOCK_ATTEMPTS: &str = "keepr_unlock_attempts_total";

/// Histogram: round-trip latency of memory service calls in milliseconds.
pub const METRIC_SERVICE_LATENCY_MS: &str = "keepr_service_latency_ms";

/// Options for initialization from the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Whether verbose output was requested via CLI.
    pub verbose: bool,
}

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Initializes logging from config settings with env overrides.
///
/// # Errors
///
/// Returns an error if logging was already initialized, the filter directive
/// is invalid, or the log file cannot be opened.
pub fn init_from_settings(settings: Option<&LoggingSettings>, options: InitOptions) -> Result<()> {
    init(&LoggingConfig::from_settings(settings, options.verbose))
}

/// Installs the global tracing subscriber.
///
/// Logs go to stderr unless a file is configured, so command output on stdout
/// stays clean.
///
/// # Errors
///
/// Returns an error if logging was already initialized, the filter directive
/// is invalid, or the log file cannot be opened.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if LOGGING_INIT.get().is_some() {
        return Err(Error::operation_failed(
            "logging_init",
            "logging already initialized",
        ));
    }

    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| Error::operation_failed("logging_init", format!("{}: {e}", config.filter)))?;

    match (&config.file, config.format) {
        (Some(log_file), LogFormat::Json) => {
            let writer = open_log_file(log_file)?;
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(writer)
                        .with_current_span(true)
                        .with_target(true),
                )
                .with(filter)
                .try_init()
                .map_err(init_error)?;
        },
        (Some(log_file), LogFormat::Pretty) => {
            let writer = open_log_file(log_file)?;
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(true),
                )
                .with(filter)
                .try_init()
                .map_err(init_error)?;
        },
        (None, LogFormat::Json) => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(io::stderr)
                        .with_current_span(true)
                        .with_target(true),
                )
                .with(filter)
                .try_init()
                .map_err(init_error)?;
        },
        (None, LogFormat::Pretty) => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(io::stderr)
                        .with_target(false),
                )
                .with(filter)
                .try_init()
                .map_err(init_error)?;
        },
    }

    LOGGING_INIT
        .set(())
        .map_err(|()| Error::operation_failed("logging_init", "failed to mark logging initialized"))
}

/// Opens a log file for appending, creating parent directories.
///
/// The `Mutex` serializes events from concurrent tasks; tracing-subscriber
/// accepts it directly as a `MakeWriter`.
fn open_log_file(path: &Path) -> Result<Mutex<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::operation_failed("create_log_dir", e.to_string()))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(Mutex::new)
        .map_err(|e| Error::operation_failed("open_log_file", format!("{}: {e}", path.display())))
}

#[allow(clippy::needless_pass_by_value)]
fn init_error(e: tracing_subscriber::util::TryInitError) -> Error {
    Error::operation_failed("logging_init", e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn test_open_log_file_creates_parents_and_appends() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("logs").join("keepr.log");
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, "first\n").expect("seed");

        let writer = open_log_file(&path).expect("open");
        writer.make_writer().write_all(b"second\n").expect("write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "first\nsecond\n");

        let fresh = dir.path().join("nested").join("deeper").join("keepr.log");
        open_log_file(&fresh).expect("open nested");
        assert!(fresh.exists());
    }

    #[test]
    fn test_invalid_filter_is_reported() {
        let config = LoggingConfig {
            filter: "keepr=notalevel".to_string(),
            ..LoggingConfig::default()
        };
        // Either the directive is rejected or another test already installed
        // a subscriber; both must surface as an error, never a panic.
        assert!(init(&config).is_err());
    }
}
