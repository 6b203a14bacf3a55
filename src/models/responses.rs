//! Response DTOs for the session API
//!
//! Defines the structure of outgoing HTTP response bodies.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheStats;
use crate::session::{CachedSession, EstablishedSession, Payload, UserId};

/// A session as returned by POST /session and GET /session
#[derive(Debug, Clone, Serialize)]
pub struct SessionResponse {
    pub session_id: Option<i64>,
    pub user_id: UserId,
    pub date_created: DateTime<Utc>,
    pub date_expires: DateTime<Utc>,
    pub user_ip: String,
    pub user_agent: Option<String>,
    /// Application data supplied by the adapter
    pub payload: Payload,
}

impl From<CachedSession> for SessionResponse {
    fn from(session: CachedSession) -> Self {
        let record = session.record;
        Self {
            session_id: record.id,
            user_id: record.user_ref,
            date_created: record.date_created,
            date_expires: record.date_expires,
            user_ip: record.user_ip,
            user_agent: record.user_agent,
            payload: session.payload,
        }
    }
}

impl From<EstablishedSession> for SessionResponse {
    fn from(session: EstablishedSession) -> Self {
        CachedSession::new(session.record, session.payload).into()
    }
}

/// Body of a refused login
#[derive(Debug, Clone, Serialize)]
pub struct DeniedResponse {
    pub error: String,
    pub redirect_uri: Option<String>,
}

impl DeniedResponse {
    pub fn new(redirect_uri: Option<String>) -> Self {
        Self {
            error: "User is not allowed to open a session".to_string(),
            redirect_uri,
        }
    }
}

/// Response body for POST /redirect
#[derive(Debug, Clone, Serialize)]
pub struct RedirectStoredResponse {
    /// Key carried by the redirect cookie
    pub key: String,
}

/// Response body for GET /redirect
#[derive(Debug, Clone, Serialize)]
pub struct RedirectResponse {
    pub url: String,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub sessions: CacheStatsView,
    pub redirects: CacheStatsView,
}

/// Statistics of one cache with the derived hit rate.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsView {
    #[serde(flatten)]
    pub stats: CacheStats,
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsView {
    fn from(stats: CacheStats) -> Self {
        let hit_rate = stats.hit_rate();
        Self { stats, hit_rate }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
