//! Error types for the session layer
//!
//! Provides unified error handling using thiserror. Cache and store misses are
//! not errors; they surface as `None`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Boxed error produced by a host-supplied collaborator.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Store Error ==
/// Failure reported by a durable session store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend rejected a write, e.g. a duplicate token
    #[error("Constraint violated: {0}")]
    Constraint(String),

    /// Any other backend failure
    #[error("Backend error: {0}")]
    Backend(String),
}

// == Session Error ==
/// Unified error type for session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A required identity was missing
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Durable store I/O failed
    #[error("Session store failure: {0}")]
    StoreFailure(#[from] StoreError),

    /// The authorization adapter failed
    #[error("Adapter failure: {0}")]
    AdapterFailure(#[source] BoxError),
}

impl SessionError {
    pub fn adapter(err: impl Into<BoxError>) -> Self {
        SessionError::AdapterFailure(err.into())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for SessionError {
    fn into_response(self) -> Response {
        let status = match &self {
            SessionError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            SessionError::StoreFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
            SessionError::AdapterFailure(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (SessionError::InvalidArgument("user id".into()), StatusCode::BAD_REQUEST),
            (
                SessionError::from(StoreError::Backend("disk".into())),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (SessionError::adapter(anyhow::anyhow!("boom")), StatusCode::BAD_GATEWAY),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }

    #[test]
    fn test_adapter_error_keeps_source() {
        let err = SessionError::adapter(anyhow::anyhow!("directory offline"));
        assert!(err.to_string().contains("directory offline"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
