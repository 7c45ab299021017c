//! Wire representation of memories as the service sends them.
//!
//! The service speaks camelCase JSON with numeric or string ids, an
//! `isLocked` flag and loosely formatted dates. Everything is normalized into
//! [`Memory`] before it reaches the engine's collection.

use super::{AccessState, Memory, MemoryId, Owner, RevealedKeyword};
use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// Identifier as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WireId {
    /// Numeric id (`"id": 3`).
    Number(i64),
    /// String id (`"id": "3"`).
    Text(String),
}

impl WireId {
    pub(crate) fn to_memory_id(&self) -> Result<MemoryId> {
        match self {
            Self::Number(n) => MemoryId::parse(&n.to_string()),
            Self::Text(s) => MemoryId::parse(s),
        }
    }
}

/// Creator reference on the wire.
#[derive(Debug, Clone, Deserialize)]
pub struct WireOwner {
    /// Display name.
    pub name: String,
    /// Email, optional.
    #[serde(default)]
    pub email: Option<String>,
}

/// A memory record as returned by the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRecord {
    /// Record id.
    pub id: WireId,
    /// Title.
    pub title: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Image URL.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Lock flag. Missing means locked.
    #[serde(default)]
    pub is_locked: Option<bool>,
    /// Echoed keyword. Kept only for unlocked records.
    #[serde(default, deserialize_with = "deserialize_optional_secret")]
    pub keyword: Option<SecretString>,
    /// Creation time as sent by the service.
    pub created_at: String,
    /// Creator.
    #[serde(default)]
    pub user: Option<WireOwner>,
}

impl MemoryRecord {
    /// Parses a single record from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unavailable`] if the value is not memory-shaped.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| Error::unavailable("parse_memory_record", e.to_string()))
    }

    /// Parses a collection body. The body must be an array; elements that
    /// are not memory-shaped are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unavailable`] if the body is not an array.
    pub fn collection_from_value(value: serde_json::Value) -> Result<Vec<Self>> {
        let serde_json::Value::Array(items) = value else {
            return Err(Error::unavailable(
                "parse_collection",
                "expected a JSON array of memories",
            ));
        };
        Ok(items
            .into_iter()
            .enumerate()
            .filter_map(|(position, item)| {
                serde_json::from_value(item)
                    .inspect_err(|e| {
                        tracing::warn!(position, error = %e, "Skipping malformed memory record");
                    })
                    .ok()
            })
            .collect())
    }
}

impl TryFrom<MemoryRecord> for Memory {
    type Error = Error;

    fn try_from(record: MemoryRecord) -> Result<Self> {
        let id = record
            .id
            .to_memory_id()
            .map_err(|e| Error::unavailable("normalize_record", e.to_string()))?;

        let created_at = parse_created_at(&record.created_at).ok_or_else(|| {
            Error::unavailable(
                "normalize_record",
                format!("memory {id} has unparseable createdAt '{}'", record.created_at),
            )
        })?;

        // A keyword sent alongside a locked record is never kept.
        let access_state = if record.is_locked.unwrap_or(true) {
            AccessState::Locked
        } else {
            AccessState::Unlocked {
                revealed_keyword: record
                    .keyword
                    .as_ref()
                    .and_then(|k| RevealedKeyword::new(k.expose_secret())),
            }
        };

        Ok(Self {
            image_url: record.image_url.and_then(|url| absolute_url(&id, url)),
            id,
            title: record.title,
            description: record.description.unwrap_or_default(),
            access_state,
            created_at,
            owner: record.user.map(|u| Owner {
                name: u.name,
                email: u.email,
            }),
        })
    }
}

fn deserialize_optional_secret<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.map(SecretString::from))
}

/// Normalizes a batch of records. A record that cannot be normalized is
/// skipped with a warning; the rest keep their order.
#[must_use]
pub fn normalize_records(records: Vec<MemoryRecord>) -> Vec<Memory> {
    records
        .into_iter()
        .filter_map(|record| {
            Memory::try_from(record)
                .inspect_err(|e| tracing::warn!(error = %e, "Skipping unusable memory record"))
                .ok()
        })
        .collect()
}

/// Offset timestamps RFC 3339 does not cover, such as SQL's `+00` suffix.
const OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"];

/// Naive timestamps, read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Accepts RFC 3339, offset or naive datetimes with a `T` or space
/// separator, and bare dates.
pub(crate) fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Some(ts) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(raw, format).ok())
    {
        return Some(ts.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
    {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn absolute_url(id: &MemoryId, url: String) -> Option<String> {
    if url.trim().is_empty() {
        return None;
    }
    match reqwest::Url::parse(&url) {
        Ok(_) => Some(url),
        Err(e) => {
            tracing::debug!(memory_id = %id, error = %e, "Dropping non-absolute image URL");
            None
        },
    }
}
