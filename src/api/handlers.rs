//! API Handlers
//!
//! HTTP request handlers for each session endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Duration;

use crate::cache::RedirectUrlCache;
use crate::clock::SharedClock;
use crate::config::Config;
use crate::error::{Result, SessionError};
use crate::models::{
    DeniedResponse, ErrorResponse, EstablishRequest, HealthResponse, RedirectQuery,
    RedirectResponse, RedirectStoredResponse, SessionResponse, StatsResponse,
    StoreRedirectRequest,
};
use crate::session::{
    AllowListAdapter, EstablishOutcome, MemorySessionStore, MemoryTx, PurgeExpiredSessions,
    RequestContext, SessionCache, SessionManager, UserDataAdapter,
};
use crate::tasks::{ScheduleConfig, Scheduler};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session manager over the in-memory durable store
    pub sessions: SessionManager<MemorySessionStore>,
    pub clock: SharedClock,
}

impl AppState {
    pub fn new(sessions: SessionManager<MemorySessionStore>, clock: SharedClock) -> Self {
        Self { sessions, clock }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Wires the caches, the store and the allow-list adapter together.
    pub fn from_config(config: &Config, clock: SharedClock) -> Self {
        let config = config.clone().sanitized();
        let lifetime = Duration::seconds(config.session_lifetime);
        let store = Arc::new(MemorySessionStore::new());
        let adapter: Arc<dyn UserDataAdapter<MemoryTx>> = Arc::new(AllowListAdapter::new(
            config.allowed_users.iter().copied(),
            config.denied_redirect.clone(),
        ));
        let sessions = Arc::new(SessionCache::new("session", lifetime, clock.clone()));
        let redirects = Arc::new(RedirectUrlCache::new(
            Duration::seconds(config.redirect_ttl),
            clock.clone(),
        ));

        let manager =
            SessionManager::new(store, adapter, sessions, redirects).with_default_lifetime(lifetime);
        Self::new(manager, clock)
    }

    /// Builds a scheduler over this state's caches and store. Not started.
    pub fn scheduler(&self, config: ScheduleConfig) -> Scheduler<MemorySessionStore> {
        let purge = Arc::new(PurgeExpiredSessions::new(
            self.sessions.store().clone(),
            self.clock.clone(),
        ));
        Scheduler::new(
            self.sessions.session_cache().clone(),
            self.sessions.redirect_cache().clone(),
            purge,
            self.clock.clone(),
            config,
        )
    }
}

fn request_context(headers: HeaderMap, connect: Option<ConnectInfo<SocketAddr>>) -> RequestContext {
    RequestContext::new(headers, connect.map(|ConnectInfo(addr)| addr))
}

fn not_found(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse::new(message))).into_response()
}

/// Handler for POST /session
///
/// Opens a session and sets the session cookie, or answers 403 with the
/// adapter's redirect target.
pub async fn establish_handler(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<EstablishRequest>,
) -> Result<Response> {
    if let Some(error_msg) = req.validate() {
        return Err(SessionError::InvalidArgument(error_msg));
    }

    let request = request_context(headers, connect);
    let mut response_headers = HeaderMap::new();
    let outcome = state
        .sessions
        .establish(
            None,
            req.user_id,
            req.lifetime.map(Duration::seconds),
            &request,
            &mut response_headers,
        )
        .await?;

    Ok(match outcome {
        EstablishOutcome::Established(session) => {
            (response_headers, Json(SessionResponse::from(session))).into_response()
        }
        EstablishOutcome::Denied { redirect_uri } => {
            (StatusCode::FORBIDDEN, Json(DeniedResponse::new(redirect_uri))).into_response()
        }
    })
}

/// Handler for GET /session
pub async fn current_session_handler(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Response> {
    let request = request_context(headers, connect);
    match state.sessions.get_from_request(None, &request).await? {
        Some(session) => Ok(Json(SessionResponse::from(session)).into_response()),
        None => Ok(not_found("No active session")),
    }
}

/// Handler for GET|POST /logout
///
/// Closes the session and redirects to the site root.
pub async fn logout_handler(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Response> {
    let request = request_context(headers, connect);
    let mut response_headers = HeaderMap::new();
    state
        .sessions
        .close(None, &request, &mut response_headers)
        .await?;

    response_headers.insert(header::LOCATION, HeaderValue::from_static("/"));
    Ok((StatusCode::SEE_OTHER, response_headers).into_response())
}

/// Handler for POST /redirect
///
/// Remembers a URL and sets the redirect cookie.
pub async fn store_redirect_handler(
    State(state): State<AppState>,
    Json(req): Json<StoreRedirectRequest>,
) -> Result<Response> {
    if let Some(error_msg) = req.validate() {
        return Err(SessionError::InvalidArgument(error_msg));
    }

    let mut response_headers = HeaderMap::new();
    let key = state
        .sessions
        .store_redirect_url(req.url, &mut response_headers);

    Ok((response_headers, Json(RedirectStoredResponse { key })).into_response())
}

/// Handler for GET /redirect
pub async fn retrieve_redirect_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RedirectQuery>,
) -> Response {
    let request = RequestContext::new(headers, None);
    match state.sessions.retrieve_redirect_url(&request, query.consume) {
        Some(url) => Json(RedirectResponse { url }).into_response(),
        None => not_found("No redirect URL stored"),
    }
}

/// Handler for GET /stats
///
/// Returns statistics of both memory caches.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        sessions: state.sessions.session_cache().stats().into(),
        redirects: state.sessions.redirect_cache().stats().into(),
    })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
