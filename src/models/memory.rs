//! Memory types and identifiers.

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a memory.
///
/// Identifiers are opaque to the client but travel as a URL path segment, so
/// only ASCII alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MemoryId(String);

impl MemoryId {
    /// Maximum accepted identifier length.
    pub const MAX_LEN: usize = 128;

    /// Parses and validates a memory identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the identifier is empty, too long,
    /// or contains characters outside `[A-Za-z0-9_-]`.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput(
                "memory id must not be empty".to_string(),
            ));
        }
        if trimmed.len() > Self::MAX_LEN {
            return Err(Error::InvalidInput(format!(
                "memory id exceeds {} characters",
                Self::MAX_LEN
            )));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidInput(format!(
                "memory id '{trimmed}' contains unsupported characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Wraps a built-in identifier that is known to be valid.
    pub(crate) fn from_static(id: &'static str) -> Self {
        debug_assert!(Self::parse(id).is_ok(), "invalid built-in memory id {id}");
        Self(id.to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MemoryId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Keyword echoed by the service for a memory the viewer already unlocked.
///
/// Only ever attached to [`AccessState::Unlocked`]. `Debug` is redacted so the
/// value does not end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct RevealedKeyword(String);

impl RevealedKeyword {
    /// Wraps a keyword echoed by the service. Blank values yield `None`.
    #[must_use]
    pub fn new(keyword: impl Into<String>) -> Option<Self> {
        let keyword = keyword.into();
        if keyword.trim().is_empty() {
            None
        } else {
            Some(Self(keyword))
        }
    }

    /// Returns the keyword text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RevealedKeyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RevealedKeyword([REDACTED])")
    }
}

impl Serialize for RevealedKeyword {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Visibility gate on a memory, scoped to the current viewer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum AccessState {
    /// Only the stub (title, thumbnail) is visible.
    #[default]
    Locked,
    /// The viewer has proven the keyword.
    Unlocked {
        /// Keyword echoed back by the service, if it chose to.
        #[serde(skip_serializing_if = "Option::is_none")]
        revealed_keyword: Option<RevealedKeyword>,
    },
}

impl AccessState {
    /// Returns the state as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::Unlocked { .. } => "unlocked",
        }
    }

    /// Returns true if the memory is locked.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        matches!(self, Self::Locked)
    }
}

impl fmt::Display for AccessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The creator of a memory. Referenced, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Owner {
    /// Display name.
    pub name: String,
    /// Contact email, when the service shares it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A memory as the current viewer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Memory {
    /// Unique identifier.
    pub id: MemoryId,
    /// Short title.
    pub title: String,
    /// Free text, empty when the service sent none.
    pub description: String,
    /// Absolute URL of the externally hosted image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Current visibility state.
    #[serde(flatten)]
    pub access_state: AccessState,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Creator reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
}

impl Memory {
    /// Returns true if the memory is locked.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.access_state.is_locked()
    }

    /// Returns the echoed keyword of an unlocked memory.
    #[must_use]
    pub fn revealed_keyword(&self) -> Option<&str> {
        match &self.access_state {
            AccessState::Unlocked {
                revealed_keyword: Some(keyword),
            } => Some(keyword.as_str()),
            _ => None,
        }
    }

    /// Moves the memory from `Locked` to `Unlocked`.
    ///
    /// Returns `false` without touching anything if the memory is already
    /// unlocked. There is no way back to `Locked`.
    pub fn unlock(&mut self, revealed_keyword: Option<RevealedKeyword>) -> bool {
        if !self.is_locked() {
            return false;
        }
        self.access_state = AccessState::Unlocked { revealed_keyword };
        true
    }

    /// Case-insensitive substring match over title and description.
    ///
    /// `needle` must already be lowercase.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }
}
