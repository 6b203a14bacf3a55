//! Request DTOs for the session API
//!
//! Defines the structure of incoming HTTP request bodies and queries.

use serde::Deserialize;

use crate::session::{UserId, MAX_SESSION_LIFETIME_SECS};

/// Maximum accepted length of a stored redirect URL.
pub const MAX_REDIRECT_URL_LENGTH: usize = 2048;

/// Request body for establishing a session (POST /session)
#[derive(Debug, Clone, Deserialize)]
pub struct EstablishRequest {
    /// The user to open the session for
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Optional session lifetime in seconds
    #[serde(default)]
    pub lifetime: Option<i64>,
}

impl EstablishRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        match self.lifetime {
            Some(secs) if secs <= 0 => Some("Lifetime must be positive".to_string()),
            Some(secs) if secs > MAX_SESSION_LIFETIME_SECS => Some(format!(
                "Lifetime exceeds maximum of {} seconds",
                MAX_SESSION_LIFETIME_SECS
            )),
            _ => None,
        }
    }
}

/// Request body for remembering a redirect target (POST /redirect)
#[derive(Debug, Clone, Deserialize)]
pub struct StoreRedirectRequest {
    pub url: String,
}

impl StoreRedirectRequest {
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.url.trim().is_empty() {
            return Some("URL cannot be empty".to_string());
        }
        if self.url.len() > MAX_REDIRECT_URL_LENGTH {
            return Some(format!(
                "URL exceeds maximum length of {} characters",
                MAX_REDIRECT_URL_LENGTH
            ));
        }
        None
    }
}

/// Query of GET /redirect
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedirectQuery {
    /// Delete the stored URL after reading it
    #[serde(default)]
    pub consume: bool,
}
