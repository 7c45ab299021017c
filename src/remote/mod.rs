//! Remote memory service abstraction.
//!
//! The service persists memories, evaluates unlock attempts and reports
//! per-viewer visibility. The engine only talks to it through
//! [`MemoryService`]; [`HttpMemoryService`] is the production implementation.

mod http;

pub use http::{CORRELATION_HEADER, HttpMemoryService};

use crate::Result;
use crate::models::{MemoryId, MemoryRecord, NewMemory, UnlockAttempt};
use async_trait::async_trait;
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Which viewer-scoped collection to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionScope {
    /// The memory wall: memories visible to the viewer.
    #[default]
    Wall,
    /// Memories the viewer created.
    Owned,
}

impl CollectionScope {
    /// Returns the scope as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Wall => "wall",
            Self::Owned => "owned",
        }
    }

    /// Parses a scope string. Unknown values fall back to the wall.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "owned" | "mine" | "profile" => Self::Owned,
            _ => Self::Wall,
        }
    }

    /// Service path for this scope, relative to the API base.
    #[must_use]
    pub const fn path(&self) -> &'static str {
        match self {
            Self::Wall => "/memories/unlocked",
            Self::Owned => "/profile/memories",
        }
    }
}

impl fmt::Display for CollectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The service's answer to an accepted unlock.
#[derive(Debug, Clone, Default)]
pub struct UnlockAcceptance {
    /// Updated memory fields, when the service returned them.
    pub record: Option<MemoryRecord>,
    /// Informational message, when the service sent one.
    pub message: Option<String>,
}

/// Trait for remote memory services.
#[async_trait]
pub trait MemoryService: Send + Sync {
    /// The service name, for logs.
    fn name(&self) -> &'static str;

    /// Fetches the viewer-scoped collection.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Rejected`] when the service answers with an
    /// error object and [`crate::Error::Unavailable`] for transport failures
    /// or malformed bodies.
    async fn fetch_collection(
        &self,
        scope: CollectionScope,
        credential: Option<&SecretString>,
    ) -> Result<Vec<MemoryRecord>>;

    /// Submits an unlock attempt. Acceptance is the sole source of truth for
    /// whether the keyword matched.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Rejected`] carrying the server message when the
    /// attempt is declined, [`crate::Error::Unavailable`] otherwise.
    async fn submit_unlock(&self, attempt: &UnlockAttempt) -> Result<UnlockAcceptance>;

    /// Creates a memory and returns the id the service assigned.
    ///
    /// # Errors
    ///
    /// Same classification as [`MemoryService::submit_unlock`].
    async fn create_memory(
        &self,
        memory: &NewMemory,
        credential: Option<&SecretString>,
    ) -> Result<MemoryId>;
}

/// HTTP client configuration for the memory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            connect_timeout_ms: 3_000,
        }
    }
}

/// Builds an HTTP client with configured timeouts.
#[must_use]
pub fn build_http_client(config: HttpConfig) -> reqwest::Client {
    let mut builder = reqwest::Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build memory service HTTP client: {err}");
        reqwest::Client::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("wall", CollectionScope::Wall)]
    #[test_case("OWNED", CollectionScope::Owned)]
    #[test_case("profile", CollectionScope::Owned)]
    #[test_case("something-else", CollectionScope::Wall)]
    fn test_scope_parse(input: &str, expected: CollectionScope) {
        assert_eq!(CollectionScope::parse(input), expected);
    }

    #[test]
    fn test_scope_paths() {
        assert_eq!(CollectionScope::Wall.path(), "/memories/unlocked");
        assert_eq!(CollectionScope::Owned.path(), "/profile/memories");
    }
}
