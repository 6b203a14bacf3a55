//! Durable Purge Action
//!
//! Removes expired session rows from the durable store. Runs from the
//! scheduler or standalone, e.g. from an operational job.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::clock::SharedClock;
use crate::error::{Result, SessionError};
use crate::session::store::{SessionStore, TxScope};

/// Outcome of a purge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub deleted_count: u64,
}

// == Purge Expired Sessions ==
pub struct PurgeExpiredSessions<S: SessionStore> {
    store: Arc<S>,
    clock: SharedClock,
}

impl<S: SessionStore> PurgeExpiredSessions<S> {
    pub fn new(store: Arc<S>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    /// Deletes every row whose `date_expires` is strictly before now.
    pub async fn run(&self, outer: Option<&mut S::Tx>) -> Result<PurgeReport> {
        info!("Starting cleanup of expired sessions");

        let mut scope = TxScope::open(self.store.as_ref(), outer).await?;
        let now = self.clock.now();
        let result = self
            .store
            .delete_many(scope.tx(), now)
            .await
            .map_err(SessionError::from);
        let deleted_count = scope.finish(self.store.as_ref(), result).await?;

        if deleted_count > 0 {
            info!(deleted_count, "Deleted expired sessions from the durable store");
        }
        info!("Expired session cleanup completed");

        Ok(PurgeReport { deleted_count })
    }
}
