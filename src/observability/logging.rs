//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Default filter directive when nothing else is configured.
pub const DEFAULT_FILTER: &str = "keepr=info,warn";

/// Filter directive used with `--verbose`.
pub const VERBOSE_FILTER: &str = "keepr=debug,info";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format string. Unknown values fall back to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive.
    pub filter: String,
    /// Optional log file; stderr when absent.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from config settings with env overrides.
    ///
    /// Precedence for the filter: `KEEPR_LOG`, then `RUST_LOG`, then
    /// `--verbose`, then the config file, then [`DEFAULT_FILTER`].
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let mut config = Self::default();

        if let Some(settings) = settings {
            if let Some(format) = &settings.format {
                config.format = LogFormat::parse(format);
            }
            if let Some(filter) = &settings.filter {
                config.filter.clone_from(filter);
            }
            if let Some(file) = &settings.file {
                config.file = Some(PathBuf::from(file));
            }
        }

        if verbose {
            config.filter = VERBOSE_FILTER.to_string();
        }
        if let Some(filter) = non_empty_env("RUST_LOG") {
            config.filter = filter;
        }
        if let Some(filter) = non_empty_env("KEEPR_LOG") {
            config.filter = filter;
        }
        if let Some(format) = non_empty_env("KEEPR_LOG_FORMAT") {
            config.format = LogFormat::parse(&format);
        }
        if let Some(file) = non_empty_env("KEEPR_LOG_FILE") {
            config.file = Some(PathBuf::from(file));
        }

        config
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("whatever"), LogFormat::Pretty);
    }

    #[test]
    fn test_settings_applied() {
        // Only meaningful when the env overrides are unset.
        if std::env::var("KEEPR_LOG").is_ok()
            || std::env::var("RUST_LOG").is_ok()
            || std::env::var("KEEPR_LOG_FORMAT").is_ok()
            || std::env::var("KEEPR_LOG_FILE").is_ok()
        {
            return;
        }
        let settings = LoggingSettings {
            format: Some("json".to_string()),
            filter: Some("keepr=trace".to_string()),
            file: Some("/tmp/keepr.log".to_string()),
        };
        let config = LoggingConfig::from_settings(Some(&settings), false);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "keepr=trace");
        assert_eq!(config.file, Some(PathBuf::from("/tmp/keepr.log")));

        let verbose = LoggingConfig::from_settings(Some(&settings), true);
        assert_eq!(verbose.filter, VERBOSE_FILTER);
    }
}
