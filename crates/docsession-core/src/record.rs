//! Session record shape and its persisted encodings

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One stored session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    /// Session identifier, unique within a collection
    pub id: String,

    /// Framework-defined session data, stored as-is
    pub payload: Value,

    /// Epoch milliseconds after which the record may be purged
    pub expires_at: i64,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>, payload: Value, expires_at: i64) -> Self {
        Self {
            id: id.into(),
            payload,
            expires_at,
        }
    }

    /// A record expiring exactly at `now` is still live
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis > self.expires_at
    }
}

/// Array layout element: `{ "_id", "session", "expires" }`
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct ArrayEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub session: Value,
    pub expires: i64,
}

/// Mapping layout value: `{ "session", "expires" }`, keyed by session id
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct MappedEntry {
    pub session: Value,
    pub expires: i64,
}

impl ArrayEntry {
    pub fn decode(value: &Value) -> Option<SessionRecord> {
        let entry = Self::deserialize(value).ok()?;
        Some(SessionRecord::new(entry.id, entry.session, entry.expires))
    }

    pub fn encode(record: SessionRecord) -> Result<Value> {
        serde_json::to_value(Self {
            id: record.id,
            session: record.payload,
            expires: record.expires_at,
        })
        .map_err(|e| Error::InvalidRecord(e.to_string()))
    }
}

impl MappedEntry {
    pub fn decode(id: &str, value: &Value) -> Option<SessionRecord> {
        let entry = Self::deserialize(value).ok()?;
        Some(SessionRecord::new(id, entry.session, entry.expires))
    }

    pub fn encode(record: SessionRecord) -> Result<Value> {
        serde_json::to_value(Self {
            session: record.payload,
            expires: record.expires_at,
        })
        .map_err(|e| Error::InvalidRecord(e.to_string()))
    }
}
