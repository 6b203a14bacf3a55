//! API Module
//!
//! HTTP handlers and routing for the session REST API.
//!
//! # Endpoints
//! - `POST /session` - Open a session for a user
//! - `GET /session` - Describe the current session
//! - `GET|POST /logout` - Close the current session
//! - `POST /redirect` / `GET /redirect` - Remember and recall a redirect URL
//! - `GET /stats` - Cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
