//! # Keepr
//!
//! Client engine for keyword-locked memories.
//!
//! A memory is a small record (title, description, image) guarded by a secret
//! keyword. Viewers see locked memories as stubs and unlock them by proving
//! they know the keyword. This crate owns the client side of that workflow:
//!
//! - The `Locked` / `Unlocked` lifecycle of each memory as the viewer sees it
//! - The unlock protocol against the remote memory service
//! - Ordered, sequence-stamped collection refreshes (stale responses are dropped)
//! - A deterministic placeholder collection when the service is unreachable
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use keepr::{AccessControlEngine, HttpMemoryService, KeeprConfig, MemoryId, SessionContext};
//!
//! let config = KeeprConfig::load_default();
//! let session = Arc::new(SessionContext::with_token("token-from-login"));
//! let service = Arc::new(HttpMemoryService::from_config(&config));
//! let engine = AccessControlEngine::new(service, session, config.scope);
//!
//! let load = engine.load_collection().await;
//! if load.is_degraded() {
//!     // Placeholder data: the service could not be reached.
//! }
//!
//! let receipt = engine.attempt_unlock(&MemoryId::parse("1")?, "petals").await?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod cli;
pub mod config;
pub mod engine;
pub mod models;
pub mod observability;
pub mod remote;
pub mod session;

pub use config::KeeprConfig;
pub use engine::{
    AccessControlEngine, CollectionLoad, Provenance, SortOrder, UnlockReceipt,
    placeholder_collection,
};
pub use models::{AccessState, Memory, MemoryId, NewMemory, Owner, RevealedKeyword, UnlockAttempt};
pub use remote::{CollectionScope, HttpMemoryService, MemoryService};
pub use session::{SessionContext, TokenStore};

/// Error type for keepr operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When | Network call made |
/// |---------|-------------|-------------------|
/// | `InvalidInput` | Empty keyword, malformed identifier, missing title | No |
/// | `PreconditionFailed` | Unlocking an unknown or already unlocked memory | No |
/// | `Rejected` | The memory service declined (wrong keyword, expired session) | Yes |
/// | `Unavailable` | Transport failure, non-success status, malformed body | Yes |
/// | `OperationFailed` | Local failures: config parsing, token file I/O, logging init | No |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Input was rejected locally; the request never left the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The memory is not in the state the operation requires.
    ///
    /// Raised when:
    /// - The memory id is not in the current collection
    /// - The memory is already unlocked
    /// - The collection holds placeholder data
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The memory service explicitly declined the operation.
    ///
    /// The message is the service's text, unmodified.
    #[error("rejected by memory service: {message}")]
    Rejected {
        /// Server-provided message.
        message: String,
    },

    /// The memory service could not be reached or answered with garbage.
    #[error("memory service unavailable during '{operation}': {cause}")]
    Unavailable {
        /// The operation that was in flight.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A local operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Returns a message suitable for showing directly to a user.
    ///
    /// `Rejected` yields the server text verbatim so views can display it
    /// as-is.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(reason) | Self::PreconditionFailed(reason) => reason.clone(),
            Self::Rejected { message } => message.clone(),
            Self::Unavailable { .. } => "The memory service is unavailable. Try again later.".to_string(),
            Self::OperationFailed { operation, cause } => format!("{operation} failed: {cause}"),
        }
    }

    /// Short label for metrics and structured logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::PreconditionFailed(_) => "precondition_failed",
            Self::Rejected { .. } => "rejected",
            Self::Unavailable { .. } => "unavailable",
            Self::OperationFailed { .. } => "operation_failed",
        }
    }

    pub(crate) fn unavailable(operation: &str, cause: impl Into<String>) -> Self {
        Self::Unavailable {
            operation: operation.to_string(),
            cause: cause.into(),
        }
    }

    pub(crate) fn operation_failed(operation: &str, cause: impl Into<String>) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.into(),
        }
    }
}

/// Result type alias for keepr operations.
pub type Result<T> = std::result::Result<T, Error>;
