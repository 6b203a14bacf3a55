//! Web Session - server-side sessions for web applications
//!
//! Cookie-identified sessions backed by a durable store and fronted by a TTL
//! memory cache, plus a short-lived redirect URL cache and the background
//! sweeps and purge that keep both tidy.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod session;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::{CacheStats, RedirectUrlCache, TtlCache};
pub use clock::{system_clock, Clock, ManualClock, SharedClock, SystemClock};
pub use config::Config;
pub use error::{Result, SessionError, StoreError};
pub use session::{
    EstablishOutcome, MemorySessionStore, PurgeExpiredSessions, RequestContext, SessionManager,
    SessionStore, UserDataAdapter,
};
pub use tasks::{ScheduleConfig, Scheduler};
