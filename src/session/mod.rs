//! Session Module
//!
//! Session lifecycle on top of the session cache, the durable store and the
//! host's authorization adapter.

mod adapter;
pub mod cookie;
mod manager;
mod memory;
mod purge;
mod record;
pub mod store;

pub use adapter::{AllowListAdapter, UserData, UserDataAdapter};
pub use cookie::{RequestContext, COOKIE_REDIRECT, COOKIE_SESSION};
pub use manager::{
    EstablishOutcome, EstablishedSession, SessionCache, SessionManager,
    DEFAULT_SESSION_LIFETIME_SECS, MAX_SESSION_LIFETIME_SECS,
};
pub use memory::{MemorySessionStore, MemoryTx};
pub use purge::{PurgeExpiredSessions, PurgeReport};
pub use record::{CachedSession, Payload, SessionRecord, UserId};
pub use store::{SessionStore, StoreResult, TxScope};
