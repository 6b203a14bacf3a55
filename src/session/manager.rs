//! Session Manager
//!
//! Creates, resolves and terminates sessions, keeping the session cache and
//! the durable store coherent. The only component that calls the adapter.

use std::sync::Arc;

use axum::http::HeaderMap;
use chrono::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{RedirectUrlCache, TtlCache};
use crate::error::{Result, SessionError};
use crate::session::cookie::{
    clear_session_cookie, set_redirect_cookie, set_session_cookie, RequestContext,
    COOKIE_REDIRECT, COOKIE_SESSION,
};
use crate::session::store::{SessionStore, TxScope};
use crate::session::{CachedSession, Payload, SessionRecord, UserDataAdapter, UserId};

/// Default session lifetime: one year.
pub const DEFAULT_SESSION_LIFETIME_SECS: i64 = 31_536_000;

/// Longest accepted session lifetime: one hundred years.
pub const MAX_SESSION_LIFETIME_SECS: i64 = 100 * DEFAULT_SESSION_LIFETIME_SECS;

/// Cache of live sessions keyed by token.
pub type SessionCache = TtlCache<CachedSession>;

// == Outcome Types ==
/// A session that was just established.
#[derive(Debug, Clone, PartialEq)]
pub struct EstablishedSession {
    pub session_id: i64,
    pub token: String,
    pub record: SessionRecord,
    pub payload: Payload,
}

/// Result of [`SessionManager::establish`].
#[derive(Debug, Clone, PartialEq)]
pub enum EstablishOutcome {
    Established(EstablishedSession),
    /// The adapter refused the user; no cookie was issued.
    Denied { redirect_uri: Option<String> },
}

// == Session Manager ==
pub struct SessionManager<S: SessionStore> {
    store: Arc<S>,
    adapter: Arc<dyn UserDataAdapter<S::Tx>>,
    sessions: Arc<SessionCache>,
    redirects: Arc<RedirectUrlCache>,
    default_lifetime: Duration,
}

impl<S: SessionStore> Clone for SessionManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            adapter: self.adapter.clone(),
            sessions: self.sessions.clone(),
            redirects: self.redirects.clone(),
            default_lifetime: self.default_lifetime,
        }
    }
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(
        store: Arc<S>,
        adapter: Arc<dyn UserDataAdapter<S::Tx>>,
        sessions: Arc<SessionCache>,
        redirects: Arc<RedirectUrlCache>,
    ) -> Self {
        Self {
            store,
            adapter,
            sessions,
            redirects,
            default_lifetime: Duration::seconds(DEFAULT_SESSION_LIFETIME_SECS),
        }
    }

    /// Overrides the lifetime used when `establish` gets none.
    pub fn with_default_lifetime(mut self, lifetime: Duration) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn session_cache(&self) -> &Arc<SessionCache> {
        &self.sessions
    }

    pub fn redirect_cache(&self) -> &Arc<RedirectUrlCache> {
        &self.redirects
    }

    // == Establish ==
    /// Opens a session for `user_id`.
    ///
    /// `lifetime` must be positive and at most [`MAX_SESSION_LIFETIME_SECS`];
    /// anything else is rejected before the store is touched.
    ///
    /// The durable row and the adapter call share one transaction, joined from
    /// `outer` when given. When the adapter allows the user, a session cookie
    /// is appended to `response` and the session is cached under its token.
    ///
    /// When the adapter denies the user, the durable row written in the same
    /// transaction is kept and left for the purge to remove.
    pub async fn establish(
        &self,
        outer: Option<&mut S::Tx>,
        user_id: Option<UserId>,
        lifetime: Option<Duration>,
        request: &RequestContext,
        response: &mut HeaderMap,
    ) -> Result<EstablishOutcome> {
        let Some(user_id) = user_id else {
            warn!("Cannot establish a session for a user without an id");
            return Err(SessionError::InvalidArgument("user id is required".to_string()));
        };

        let lifetime = lifetime.unwrap_or(self.default_lifetime);
        if lifetime <= Duration::zero() || lifetime > Duration::seconds(MAX_SESSION_LIFETIME_SECS) {
            warn!(user_id, lifetime_secs = lifetime.num_seconds(), "Rejected session lifetime");
            return Err(SessionError::InvalidArgument(format!(
                "session lifetime must be between 1 and {} seconds",
                MAX_SESSION_LIFETIME_SECS
            )));
        }

        let now = self.sessions.now();
        let date_expires = now.checked_add_signed(lifetime).ok_or_else(|| {
            SessionError::InvalidArgument("session expiration is out of range".to_string())
        })?;
        let mut record = SessionRecord {
            id: None,
            token: Uuid::new_v4().to_string(),
            user_ref: user_id,
            date_created: now,
            date_expires,
            date_last: now,
            user_agent: request.user_agent(),
            user_ip: request.client_ip(),
        };

        let mut scope = TxScope::open(self.store.as_ref(), outer).await?;
        let result = async {
            let id = self.store.create_one(scope.tx(), &record).await?;
            let user_data = self
                .adapter
                .retrieve_user_data(user_id, scope.tx())
                .await
                .map_err(SessionError::adapter)?;
            Ok::<_, SessionError>((id, user_data))
        }
        .await;
        let (id, user_data) = scope.finish(self.store.as_ref(), result).await?;
        record.id = Some(id);

        if !user_data.allowed {
            warn!(
                user_id,
                session_id = id,
                "User is not allowed to hold a session; durable row kept until purge"
            );
            return Ok(EstablishOutcome::Denied {
                redirect_uri: user_data.redirect_uri,
            });
        }

        set_session_cookie(response, &record.token, record.date_expires);
        self.sessions.set(
            record.token.clone(),
            CachedSession::new(record.clone(), user_data.data.clone()),
            Some(record.date_expires),
        );
        info!(user_id, session_id = id, ip = %record.user_ip, "New session established");

        Ok(EstablishOutcome::Established(EstablishedSession {
            session_id: id,
            token: record.token.clone(),
            record,
            payload: user_data.data,
        }))
    }

    // == Get From Request ==
    /// Resolves the session referenced by the request's cookie.
    ///
    /// Served from the cache when possible. On a miss the durable record is
    /// read and the payload re-derived from the adapter; the record's
    /// expiration is not re-checked on that path.
    pub async fn get_from_request(
        &self,
        outer: Option<&mut S::Tx>,
        request: &RequestContext,
    ) -> Result<Option<CachedSession>> {
        let Some(token) = request.cookie(COOKIE_SESSION) else {
            return Ok(None);
        };

        if let Some(cached) = self.sessions.get(&token) {
            return Ok(Some(cached));
        }

        let mut scope = TxScope::open(self.store.as_ref(), outer).await?;
        let result = async {
            let Some(record) = self.store.read_one(scope.tx(), &token).await? else {
                return Ok(None);
            };
            let user_data = self
                .adapter
                .retrieve_user_data(record.user_ref, scope.tx())
                .await
                .map_err(SessionError::adapter)?;
            Ok::<_, SessionError>(Some(CachedSession::new(record, user_data.data)))
        }
        .await;
        let loaded = scope.finish(self.store.as_ref(), result).await?;

        let Some(session) = loaded else {
            info!("Session not found for the presented token");
            return Ok(None);
        };
        if session.record.is_expired_at(self.sessions.now()) {
            debug!(session_id = ?session.record.id, "Serving an expired session row not yet purged");
        }

        // A concurrent lookup may have filled the entry meanwhile; either copy is fine.
        if !self.sessions.has(&token) {
            self.sessions.set(
                token,
                session.clone(),
                Some(session.record.date_expires),
            );
            info!(session_id = ?session.record.id, "Session loaded into the memory cache");
        }
        Ok(Some(session))
    }

    // == Close ==
    /// Terminates the session referenced by the request's cookie.
    ///
    /// Clears the cookie, drops the cache entry and deletes the durable row.
    /// Missing pieces are not errors, so closing twice is harmless.
    pub async fn close(
        &self,
        outer: Option<&mut S::Tx>,
        request: &RequestContext,
        response: &mut HeaderMap,
    ) -> Result<()> {
        let Some(token) = request.cookie(COOKIE_SESSION) else {
            debug!("No session cookie to close");
            return Ok(());
        };

        clear_session_cookie(response);
        if self.sessions.delete(&token) {
            info!("Session deleted from the memory cache");
        } else {
            info!("Session not found in the memory cache");
        }

        let mut scope = TxScope::open(self.store.as_ref(), outer).await?;
        let result = self
            .store
            .delete_one(scope.tx(), &token)
            .await
            .map_err(SessionError::from);
        if scope.finish(self.store.as_ref(), result).await? {
            info!("Session deleted from the durable store");
        }
        Ok(())
    }

    // == Has Session ==
    /// Returns true when the request carries a session cookie.
    ///
    /// This is a syntactic check only: the cache, the durable store and the
    /// session's expiration are not consulted, so `true` does not mean the
    /// session is valid. Use [`SessionManager::get_from_request`] for that.
    pub fn has_session(&self, request: &RequestContext) -> bool {
        request.cookie(COOKIE_SESSION).is_some()
    }

    // == Update Session Data ==
    /// Replaces the cached payload for `record`'s session.
    ///
    /// Keeps `record.date_expires` as the cache expiration. The durable store
    /// is not touched.
    pub fn update_session_data(&self, record: SessionRecord, payload: Payload) {
        let expires_at = record.date_expires;
        self.sessions.set(
            record.token.clone(),
            CachedSession::new(record, payload),
            Some(expires_at),
        );
    }

    // == Redirect URLs ==
    /// Remembers `url` under a fresh key and appends the redirect cookie.
    pub fn store_redirect_url(&self, url: impl Into<String>, response: &mut HeaderMap) -> String {
        let key = self.redirects.store(url);
        set_redirect_cookie(response, &key);
        key
    }

    /// Returns the URL remembered for the request's redirect cookie.
    ///
    /// With `consume` the entry is deleted after a successful read.
    pub fn retrieve_redirect_url(&self, request: &RequestContext, consume: bool) -> Option<String> {
        let key = request.cookie(COOKIE_REDIRECT)?;
        self.redirects.get(&key, consume)
    }
}
