//! In-Memory Session Store
//!
//! Reference [`SessionStore`] kept in process memory. Transactions journal
//! their writes and apply them atomically on commit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::session::store::{SessionStore, StoreResult};
use crate::session::SessionRecord;

#[derive(Debug, Clone)]
enum JournalOp {
    Insert(SessionRecord),
    Delete(String),
    DeleteExpired(DateTime<Utc>),
}

/// Transaction of a [`MemorySessionStore`].
#[derive(Debug, Default)]
pub struct MemoryTx {
    journal: Vec<JournalOp>,
}

impl MemoryTx {
    /// Applies the journal on top of the committed row for `token`.
    fn overlay(&self, token: &str, committed: Option<SessionRecord>) -> Option<SessionRecord> {
        self.journal.iter().fold(committed, |row, op| match op {
            JournalOp::Insert(record) if record.token == token => Some(record.clone()),
            JournalOp::Delete(deleted) if deleted == token => None,
            JournalOp::DeleteExpired(before) => row.filter(|r| r.date_expires >= *before),
            _ => row,
        })
    }
}

// == Memory Session Store ==
#[derive(Debug)]
pub struct MemorySessionStore {
    rows: RwLock<HashMap<String, SessionRecord>>,
    next_id: AtomicI64,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Number of committed rows.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Committed rows as seen through `tx`.
    fn view(&self, tx: &MemoryTx) -> HashMap<String, SessionRecord> {
        let mut rows = self.rows.read().clone();
        for op in &tx.journal {
            match op {
                JournalOp::Insert(record) => {
                    rows.insert(record.token.clone(), record.clone());
                }
                JournalOp::Delete(token) => {
                    rows.remove(token);
                }
                JournalOp::DeleteExpired(before) => rows.retain(|_, r| r.date_expires >= *before),
            }
        }
        rows
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        Ok(MemoryTx::default())
    }

    async fn commit(&self, tx: MemoryTx) -> StoreResult<()> {
        let mut rows = self.rows.write();

        // Validate before applying anything so a failed commit leaves no trace.
        let mut pending: HashMap<&str, bool> = HashMap::new();
        for op in &tx.journal {
            match op {
                JournalOp::Insert(record) => {
                    let exists = pending
                        .get(record.token.as_str())
                        .copied()
                        .unwrap_or_else(|| rows.contains_key(&record.token));
                    if exists {
                        return Err(StoreError::Constraint(format!(
                            "duplicate session token on commit (id {:?})",
                            record.id
                        )));
                    }
                    pending.insert(record.token.as_str(), true);
                }
                JournalOp::Delete(token) => {
                    pending.insert(token.as_str(), false);
                }
                JournalOp::DeleteExpired(_) => pending.clear(),
            }
        }

        for op in tx.journal {
            match op {
                JournalOp::Insert(record) => {
                    rows.insert(record.token.clone(), record);
                }
                JournalOp::Delete(token) => {
                    rows.remove(&token);
                }
                JournalOp::DeleteExpired(before) => rows.retain(|_, r| r.date_expires >= before),
            }
        }
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> StoreResult<()> {
        debug!(ops = tx.journal.len(), "Discarding session store transaction");
        Ok(())
    }

    async fn create_one(&self, tx: &mut MemoryTx, record: &SessionRecord) -> StoreResult<i64> {
        let committed = self.rows.read().get(&record.token).cloned();
        if tx.overlay(&record.token, committed).is_some() {
            return Err(StoreError::Constraint("duplicate session token".to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut row = record.clone();
        row.id = Some(id);
        tx.journal.push(JournalOp::Insert(row));
        Ok(id)
    }

    async fn read_one(&self, tx: &mut MemoryTx, token: &str) -> StoreResult<Option<SessionRecord>> {
        let committed = self.rows.read().get(token).cloned();
        Ok(tx.overlay(token, committed))
    }

    async fn delete_one(&self, tx: &mut MemoryTx, token: &str) -> StoreResult<bool> {
        let committed = self.rows.read().get(token).cloned();
        if tx.overlay(token, committed).is_none() {
            return Ok(false);
        }
        tx.journal.push(JournalOp::Delete(token.to_string()));
        Ok(true)
    }

    async fn delete_many(&self, tx: &mut MemoryTx, expires_before: DateTime<Utc>) -> StoreResult<u64> {
        let count = self
            .view(tx)
            .values()
            .filter(|r| r.date_expires < expires_before)
            .count() as u64;
        tx.journal.push(JournalOp::DeleteExpired(expires_before));
        Ok(count)
    }
}
