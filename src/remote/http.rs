//! HTTP client for the memory service.

use super::{CollectionScope, HttpConfig, MemoryService, UnlockAcceptance, build_http_client};
use crate::config::KeeprConfig;
use crate::models::{MemoryId, MemoryRecord, NewMemory, UnlockAttempt, WireId};
use crate::observability::current_correlation_id;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

/// Header carrying the per-operation correlation id.
pub const CORRELATION_HEADER: &str = "x-request-id";

/// Memory service reached over HTTP/JSON.
pub struct HttpMemoryService {
    /// API base URL, without trailing slash.
    base_url: String,
    /// HTTP client.
    client: reqwest::Client,
}

impl HttpMemoryService {
    /// Default API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:4000/api";

    /// Creates a client for the service at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: build_http_client(HttpConfig::default()),
        }
    }

    /// Creates a client from configuration.
    #[must_use]
    pub fn from_config(config: &KeeprConfig) -> Self {
        Self::new(config.api_url.clone()).with_http_config(config.http)
    }

    /// Sets HTTP client timeouts.
    #[must_use]
    pub fn with_http_config(mut self, config: HttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Attaches the bearer credential and correlation id.
    fn prepare(
        request: reqwest::RequestBuilder,
        credential: Option<&SecretString>,
    ) -> reqwest::RequestBuilder {
        let request = match current_correlation_id() {
            Some(id) => request.header(CORRELATION_HEADER, id),
            None => request,
        };
        match credential {
            Some(token) => {
                request.header("Authorization", format!("Bearer {}", token.expose_secret()))
            },
            None => request,
        }
    }

    /// Sends a request and classifies the response body.
    async fn send(&self, operation: &'static str, request: reqwest::RequestBuilder) -> Result<Value> {
        let response = request.send().await.map_err(|e| {
            let error_kind = if e.is_timeout() {
                "timeout"
            } else if e.is_connect() {
                "connect"
            } else if e.is_request() {
                "request"
            } else {
                "unknown"
            };
            tracing::warn!(
                service = self.name(),
                operation,
                error = %e,
                error_kind,
                "Memory service request failed"
            );
            Error::unavailable(operation, format!("{error_kind} error: {e}"))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            tracing::warn!(service = self.name(), operation, error = %e, "Failed to read response body");
            Error::unavailable(operation, format!("failed to read body: {e}"))
        })?;

        classify_response(operation, status, &body).inspect_err(|e| {
            tracing::debug!(
                service = self.name(),
                operation,
                status = %status,
                error_kind = e.kind(),
                "Memory service returned a failure"
            );
        })
    }
}

/// Classifies a raw response.
///
/// A JSON object with an `error` field is a rejection whatever the status.
/// Otherwise a non-success status or an unparseable body means the service
/// is unavailable.
pub(crate) fn classify_response(operation: &str, status: StatusCode, body: &str) -> Result<Value> {
    let parsed: Option<Value> = serde_json::from_str(body).ok();

    if let Some(message) = parsed.as_ref().and_then(error_message) {
        return Err(Error::Rejected { message });
    }
    if !status.is_success() {
        return Err(Error::unavailable(
            operation,
            format!("service returned status {status}"),
        ));
    }
    parsed.ok_or_else(|| Error::unavailable(operation, "response body is not valid JSON"))
}

fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Interprets an accepted unlock body. Returned memory fields may sit at the
/// top level or under `memory`; anything unrecognizable is ignored.
pub(crate) fn parse_acceptance(body: Value) -> UnlockAcceptance {
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);

    let candidate = match body {
        Value::Object(mut map) => match map.remove("memory") {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    };

    let record = if candidate.get("id").is_some() {
        MemoryRecord::from_value(candidate)
            .inspect_err(|e| tracing::debug!(error = %e, "Ignoring unrecognized unlock body"))
            .ok()
    } else {
        None
    };

    UnlockAcceptance { record, message }
}

/// Extracts the id of a created memory from `{id}` or `{memory: {id}}`.
pub(crate) fn created_id(body: &Value) -> Result<MemoryId> {
    let raw = body
        .get("memory")
        .unwrap_or(body)
        .get("id")
        .cloned()
        .ok_or_else(|| Error::unavailable("create_memory", "response carries no memory id"))?;
    let wire: WireId = serde_json::from_value(raw)
        .map_err(|e| Error::unavailable("create_memory", e.to_string()))?;
    wire.to_memory_id()
        .map_err(|e| Error::unavailable("create_memory", e.to_string()))
}

#[async_trait]
impl MemoryService for HttpMemoryService {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch_collection(
        &self,
        scope: CollectionScope,
        credential: Option<&SecretString>,
    ) -> Result<Vec<MemoryRecord>> {
        tracing::debug!(
            scope = %scope,
            authenticated = credential.is_some(),
            "Fetching memory collection"
        );
        let request = Self::prepare(self.client.get(self.url(scope.path())), credential);
        let body = self.send("fetch_collection", request).await?;
        MemoryRecord::collection_from_value(body)
    }

    async fn submit_unlock(&self, attempt: &UnlockAttempt) -> Result<UnlockAcceptance> {
        tracing::debug!(memory_id = %attempt.memory_id(), "Submitting unlock attempt");
        let path = format!("/memories/unlock/{}", attempt.memory_id());
        let request = Self::prepare(
            self.client.post(self.url(&path)).json(&attempt.wire_body()),
            attempt.credential(),
        );
        let body = self.send("submit_unlock", request).await?;
        Ok(parse_acceptance(body))
    }

    async fn create_memory(
        &self,
        memory: &NewMemory,
        credential: Option<&SecretString>,
    ) -> Result<MemoryId> {
        let request = Self::prepare(
            self.client.post(self.url("/memories")).json(&memory.wire_body()),
            credential,
        );
        let body = self.send("create_memory", request).await?;
        created_id(&body)
    }
}
