//! Durable Session Store
//!
//! Contract of the persisted session table and the transaction scope used by
//! every operation that touches it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::session::SessionRecord;

/// Result type of store calls.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// == Session Store ==
/// CRUD access to session envelopes keyed by token.
///
/// Every data call runs inside a transaction obtained from [`SessionStore::begin`].
/// Writes made through a transaction become visible to others on commit and
/// are discarded on rollback.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Transaction handle
    type Tx: Send;

    async fn begin(&self) -> StoreResult<Self::Tx>;

    async fn commit(&self, tx: Self::Tx) -> StoreResult<()>;

    async fn rollback(&self, tx: Self::Tx) -> StoreResult<()>;

    /// Persists a new record and returns the id assigned to it.
    async fn create_one(&self, tx: &mut Self::Tx, record: &SessionRecord) -> StoreResult<i64>;

    async fn read_one(&self, tx: &mut Self::Tx, token: &str) -> StoreResult<Option<SessionRecord>>;

    /// Deletes the record for `token`. Returns whether one existed.
    async fn delete_one(&self, tx: &mut Self::Tx, token: &str) -> StoreResult<bool>;

    /// Deletes every record whose `date_expires` is strictly before `expires_before`.
    async fn delete_many(&self, tx: &mut Self::Tx, expires_before: DateTime<Utc>)
        -> StoreResult<u64>;
}

// == Transaction Scope ==
/// Either joins a caller's transaction or owns one for a single operation.
///
/// An owned transaction is committed by [`TxScope::finish`] on success and
/// rolled back on error. A joined one is left for the caller to settle.
pub enum TxScope<'a, S: SessionStore> {
    Joined(&'a mut S::Tx),
    Owned(S::Tx),
}

impl<'a, S: SessionStore> TxScope<'a, S> {
    /// Joins `outer` when given, otherwise begins a new transaction.
    pub async fn open(store: &S, outer: Option<&'a mut S::Tx>) -> Result<Self> {
        match outer {
            Some(tx) => Ok(TxScope::Joined(tx)),
            None => Ok(TxScope::Owned(store.begin().await?)),
        }
    }

    pub fn tx(&mut self) -> &mut S::Tx {
        match self {
            TxScope::Joined(tx) => &mut **tx,
            TxScope::Owned(tx) => tx,
        }
    }

    /// Settles an owned transaction according to `result` and passes it through.
    pub async fn finish<T>(self, store: &S, result: Result<T>) -> Result<T> {
        let tx = match self {
            TxScope::Joined(_) => return result,
            TxScope::Owned(tx) => tx,
        };

        match result {
            Ok(value) => {
                store.commit(tx).await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = store.rollback(tx).await {
                    warn!(error = %rollback_err, "Rollback failed after: {}", err);
                }
                Err(err)
            }
        }
    }
}
