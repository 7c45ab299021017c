//! Outbound requests: memory creation and unlock attempts.
//!
//! Both carry a plaintext keyword, held in a [`SecretString`] so it is
//! zeroized when the request is dropped and never shows up in `Debug` output.

use super::MemoryId;
use crate::{Error, Result};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

/// Maximum title length accepted for new memories.
pub const MAX_TITLE_LEN: usize = 200;

fn require_keyword(keyword: &str) -> Result<()> {
    if keyword.trim().is_empty() {
        return Err(Error::InvalidInput(
            "keyword must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Request to create a new memory.
#[derive(Debug)]
pub struct NewMemory {
    /// Short title, required.
    pub title: String,
    /// Free text.
    pub description: String,
    /// Absolute URL returned by the image host.
    pub image_url: Option<String>,
    keyword: SecretString,
}

impl NewMemory {
    /// Creates a new memory request.
    #[must_use]
    pub fn new(title: impl Into<String>, keyword: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            image_url: None,
            keyword: SecretString::from(keyword.into()),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the image URL.
    #[must_use]
    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Validates the request without contacting the service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when the title or keyword is blank, the
    /// title is too long, or the image URL is not an absolute http(s) URL.
    pub fn validate(&self) -> Result<()> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("title must not be empty".to_string()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(Error::InvalidInput(format!(
                "title exceeds {MAX_TITLE_LEN} characters"
            )));
        }
        require_keyword(self.keyword.expose_secret())?;

        if let Some(url) = &self.image_url {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| Error::InvalidInput(format!("image URL '{url}' is invalid: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::InvalidInput(format!(
                    "image URL must use http or https, got '{}'",
                    parsed.scheme()
                )));
            }
        }
        Ok(())
    }

    /// Builds the JSON body sent to the service.
    pub(crate) fn wire_body(&self) -> serde_json::Value {
        json!({
            "title": self.title.trim(),
            "description": self.description,
            "imageUrl": self.image_url.clone().unwrap_or_default(),
            "keyword": self.keyword.expose_secret(),
        })
    }
}

/// One attempt to unlock a memory.
///
/// Lives for the duration of a single request.
#[derive(Debug)]
pub struct UnlockAttempt {
    memory_id: MemoryId,
    keyword: SecretString,
    credential: Option<SecretString>,
}

impl UnlockAttempt {
    /// Creates an unlock attempt.
    ///
    /// The keyword is kept exactly as entered; only the emptiness check
    /// ignores surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the keyword is empty or whitespace.
    pub fn new(
        memory_id: MemoryId,
        keyword: &str,
        credential: Option<SecretString>,
    ) -> Result<Self> {
        require_keyword(keyword)?;
        Ok(Self {
            memory_id,
            keyword: SecretString::from(keyword),
            credential,
        })
    }

    /// The memory being unlocked.
    #[must_use]
    pub const fn memory_id(&self) -> &MemoryId {
        &self.memory_id
    }

    /// The requester's credential, if any.
    #[must_use]
    pub const fn credential(&self) -> Option<&SecretString> {
        self.credential.as_ref()
    }

    /// Builds the JSON body sent to the service.
    pub(crate) fn wire_body(&self) -> serde_json::Value {
        json!({ "keyword": self.keyword.expose_secret() })
    }
}
