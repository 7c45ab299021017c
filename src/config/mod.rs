//! Configuration management.
//!
//! Configuration is read from TOML, then environment overrides are applied:
//!
//! ```toml
//! api_url = "https://keepr.example.com/api"
//! data_dir = "~/.local/share/keepr"
//! scope = "wall"
//!
//! [http]
//! timeout_ms = 10000
//! connect_timeout_ms = 3000
//!
//! [logging]
//! format = "json"
//! filter = "keepr=debug"
//! file = "/var/log/keepr.log"
//! ```

use crate::remote::{CollectionScope, HttpConfig, HttpMemoryService};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration for keepr.
#[derive(Debug, Clone)]
pub struct KeeprConfig {
    /// Memory service base URL.
    pub api_url: String,
    /// Directory for local state (session token).
    pub data_dir: PathBuf,
    /// Which collection the engine loads.
    pub scope: CollectionScope,
    /// HTTP client timeouts.
    pub http: HttpConfig,
    /// Logging settings as read from the file; env overrides are applied at init.
    pub logging: LoggingSettings,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Memory service base URL.
    pub api_url: Option<String>,
    /// Data directory.
    pub data_dir: Option<String>,
    /// Collection scope.
    pub scope: Option<String>,
    /// HTTP section.
    pub http: Option<ConfigFileHttp>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

/// HTTP section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileHttp {
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
}

/// Logging section in config file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive.
    pub filter: Option<String>,
    /// Log file path.
    pub file: Option<String>,
}

impl Default for KeeprConfig {
    fn default() -> Self {
        Self {
            api_url: HttpMemoryService::DEFAULT_BASE_URL.to_string(),
            data_dir: default_data_dir(),
            scope: CollectionScope::default(),
            http: HttpConfig::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl KeeprConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::operation_failed("read_config_file", format!("{}: {e}", path.display()))
        })?;

        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| Error::operation_failed("parse_config_file", e.to_string()))?;

        Ok(Self::from_config_file(file).with_env_overrides())
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the following paths in order:
    /// 1. Platform-specific config dir (`~/Library/Application Support/keepr/` on macOS)
    /// 2. XDG config dir (`~/.config/keepr/`)
    ///
    /// Falls back to defaults when no file is found or the file is unreadable.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default().with_env_overrides();
        };

        let candidates = [
            base_dirs.config_dir().join("keepr").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("keepr")
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default().with_env_overrides()
    }

    /// Converts a `ConfigFile` to `KeeprConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(api_url) = file.api_url {
            config.api_url = api_url;
        }
        if let Some(data_dir) = file.data_dir {
            config.data_dir = expand_home(&data_dir);
        }
        if let Some(scope) = file.scope {
            config.scope = CollectionScope::parse(&scope);
        }
        if let Some(http) = file.http {
            if let Some(timeout_ms) = http.timeout_ms {
                config.http.timeout_ms = timeout_ms;
            }
            if let Some(connect_timeout_ms) = http.connect_timeout_ms {
                config.http.connect_timeout_ms = connect_timeout_ms;
            }
        }
        if let Some(logging) = file.logging {
            config.logging = logging;
        }

        config
    }

    /// Applies environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("KEEPR_API_URL") {
            if !v.trim().is_empty() {
                self.api_url = v.trim().to_string();
            }
        }
        if let Ok(v) = std::env::var("KEEPR_DATA_DIR") {
            if !v.trim().is_empty() {
                self.data_dir = expand_home(v.trim());
            }
        }
        if let Ok(v) = std::env::var("KEEPR_SCOPE") {
            self.scope = CollectionScope::parse(&v);
        }
        if let Ok(v) = std::env::var("KEEPR_HTTP_TIMEOUT_MS") {
            if let Ok(timeout_ms) = v.parse::<u64>() {
                self.http.timeout_ms = timeout_ms;
            }
        }
        if let Ok(v) = std::env::var("KEEPR_HTTP_CONNECT_TIMEOUT_MS") {
            if let Ok(connect_timeout_ms) = v.parse::<u64>() {
                self.http.connect_timeout_ms = connect_timeout_ms;
            }
        }
        self
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Path of the persisted session token.
    #[must_use]
    pub fn token_path(&self) -> PathBuf {
        self.data_dir.join(crate::session::TokenStore::FILE_NAME)
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "keepr")
        .map_or_else(|| PathBuf::from(".keepr"), |dirs| dirs.data_dir().to_path_buf())
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(base_dirs) = directories::BaseDirs::new() {
            return base_dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(raw)
}
