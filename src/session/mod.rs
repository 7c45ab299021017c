//! Session context: the bearer credential attached to outbound calls.
//!
//! A [`SessionContext`] is created when the application starts, shared with
//! the engine through an `Arc`, and cleared at logout. It performs no
//! validation of its own; the memory service decides whether a credential is
//! acceptable. Absence of a credential is a valid state, in which requests
//! are sent without an `Authorization` header.

mod store;

pub use store::TokenStore;

use crate::{Error, Result};
use secrecy::SecretString;
use std::sync::{PoisonError, RwLock};

/// Holds the current bearer credential, if any.
#[derive(Debug, Default)]
pub struct SessionContext {
    token: RwLock<Option<SecretString>>,
}

impl SessionContext {
    /// Creates a session without a credential.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Creates a session holding `token`. Blank tokens yield an anonymous session.
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        let token = token.into();
        let session = Self::anonymous();
        if !token.trim().is_empty() {
            session.replace(Some(SecretString::from(token.trim().to_string())));
        }
        session
    }

    /// Creates a session from a token restored by a [`TokenStore`].
    #[must_use]
    pub fn from_secret(token: Option<SecretString>) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }

    /// Installs a new credential, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the token is blank.
    pub fn set_token(&self, token: &str) -> Result<()> {
        let token = token.trim();
        if token.is_empty() {
            return Err(Error::InvalidInput("session token must not be empty".to_string()));
        }
        self.replace(Some(SecretString::from(token.to_string())));
        tracing::debug!("Session credential installed");
        Ok(())
    }

    /// Drops the credential (logout).
    pub fn clear(&self) {
        self.replace(None);
        tracing::debug!("Session credential cleared");
    }

    /// Returns a copy of the current credential.
    #[must_use]
    pub fn credential(&self) -> Option<SecretString> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true if a credential is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn replace(&self, token: Option<SecretString>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }
}
