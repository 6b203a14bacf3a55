//! Session Records
//!
//! The durable envelope of a session and the pair kept in the memory cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Application data attached to a session. Never persisted.
pub type Payload = serde_json::Value;

/// Identifier of the user owning a session.
pub type UserId = i64;

// == Session Record ==
/// Identity and envelope of a session as kept by the durable store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Assigned by the durable store on creation
    pub id: Option<i64>,
    /// Opaque unique token, carried in the session cookie
    pub token: String,
    /// Owning user
    pub user_ref: UserId,
    pub date_created: DateTime<Utc>,
    pub date_expires: DateTime<Utc>,
    /// Last activity
    pub date_last: DateTime<Utc>,
    pub user_agent: Option<String>,
    pub user_ip: String,
}

impl SessionRecord {
    /// Returns true once `date_expires` is not after `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.date_expires <= now
    }
}

// == Cached Session ==
/// What the session cache stores under a token: the envelope and the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSession {
    pub record: SessionRecord,
    pub payload: Payload,
}

impl CachedSession {
    pub fn new(record: SessionRecord, payload: Payload) -> Self {
        Self { record, payload }
    }
}
