//! Request context and session cookies.

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderValue};
use chrono::{DateTime, Utc};
use cookie::{Cookie, SameSite};
use time::OffsetDateTime;
use tracing::warn;

/// Name of the cookie carrying the session token.
pub const COOKIE_SESSION: &str = "teq_session";

/// Name of the cookie carrying the redirect-cache key.
pub const COOKIE_REDIRECT: &str = "teq_redirect";

/// Max-Age of the redirect cookie, in seconds.
pub const COOKIE_REDIRECT_MAX_AGE_SECS: i64 = 3600;

// == Request Context ==
/// The parts of an inbound request the session layer looks at.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub headers: HeaderMap,
    /// Transport-level peer address
    pub peer_addr: Option<SocketAddr>,
}

impl RequestContext {
    pub fn new(headers: HeaderMap, peer_addr: Option<SocketAddr>) -> Self {
        Self { headers, peer_addr }
    }

    /// Value of the cookie `name`, if the request carries a non-empty one.
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(|parsed| parsed.ok())
            .find(|c| c.name() == name && !c.value().is_empty())
            .map(|c| c.value().to_string())
    }

    /// Client address: first `X-Forwarded-For` entry, else the peer address.
    pub fn client_ip(&self) -> String {
        let forwarded = self
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        match forwarded {
            Some(ip) => ip.to_string(),
            None => self
                .peer_addr
                .map(|addr| addr.ip().to_string())
                .unwrap_or_default(),
        }
    }

    pub fn user_agent(&self) -> Option<String> {
        self.headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

fn to_offset(at: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(at.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

fn append(headers: &mut HeaderMap, cookie: Cookie<'_>) {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => {
            headers.append(header::SET_COOKIE, value);
        }
        Err(err) => warn!(cookie = cookie.name(), error = %err, "Cannot encode cookie"),
    }
}

/// Adds a session cookie for `token` expiring at `expires`.
pub fn set_session_cookie(headers: &mut HeaderMap, token: &str, expires: DateTime<Utc>) {
    let cookie = Cookie::build((COOKIE_SESSION, token.to_string()))
        .path("/")
        .same_site(SameSite::None)
        .expires(to_offset(expires))
        .build();
    append(headers, cookie);
}

/// Adds an already-expired session cookie so the client drops it.
pub fn clear_session_cookie(headers: &mut HeaderMap) {
    let cookie = Cookie::build((COOKIE_SESSION, ""))
        .path("/")
        .same_site(SameSite::None)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build();
    append(headers, cookie);
}

/// Adds the redirect cookie carrying `key`.
pub fn set_redirect_cookie(headers: &mut HeaderMap, key: &str) {
    let cookie = Cookie::build((COOKIE_REDIRECT, key.to_string()))
        .path("/")
        .same_site(SameSite::None)
        .max_age(time::Duration::seconds(COOKIE_REDIRECT_MAX_AGE_SECS))
        .build();
    append(headers, cookie);
}
