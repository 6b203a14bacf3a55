//! Authorization Adapter
//!
//! The host application decides whether a user may hold a session and
//! supplies the payload attached to it.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::json;

use crate::session::{Payload, UserId};

// == User Data ==
/// Answer of an adapter for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserData {
    /// Application payload kept alongside the session in memory
    pub data: Payload,
    /// Whether a session may be established
    pub allowed: bool,
    /// Where to send the user when not allowed
    pub redirect_uri: Option<String>,
}

impl UserData {
    pub fn allowed(data: Payload) -> Self {
        Self {
            data,
            allowed: true,
            redirect_uri: None,
        }
    }

    pub fn denied(redirect_uri: impl Into<String>) -> Self {
        Self {
            data: Payload::Null,
            allowed: false,
            redirect_uri: Some(redirect_uri.into()),
        }
    }
}

// == Adapter ==
/// Supplies per-user session data.
///
/// Called with the same transaction the session manager writes through, so
/// implementations may read their own tables consistently.
#[async_trait]
pub trait UserDataAdapter<Tx: Send>: Send + Sync {
    async fn retrieve_user_data(&self, user_id: UserId, tx: &mut Tx) -> anyhow::Result<UserData>;
}

// == Allow List Adapter ==
/// Adapter that admits a fixed set of users, or everyone when the set is empty.
///
/// The payload is `{"user_id": <id>}`.
#[derive(Debug, Clone)]
pub struct AllowListAdapter {
    allowed: HashSet<UserId>,
    denied_redirect: String,
}

impl AllowListAdapter {
    pub fn new(allowed: impl IntoIterator<Item = UserId>, denied_redirect: impl Into<String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            denied_redirect: denied_redirect.into(),
        }
    }

    fn admits(&self, user_id: UserId) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&user_id)
    }
}

#[async_trait]
impl<Tx: Send> UserDataAdapter<Tx> for AllowListAdapter {
    async fn retrieve_user_data(&self, user_id: UserId, _tx: &mut Tx) -> anyhow::Result<UserData> {
        if self.admits(user_id) {
            Ok(UserData::allowed(json!({ "user_id": user_id })))
        } else {
            Ok(UserData::denied(self.denied_redirect.clone()))
        }
    }
}
