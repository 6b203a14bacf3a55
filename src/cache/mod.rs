//! Cache Module
//!
//! In-memory TTL caches: the generic [`TtlCache`] and the redirect URL
//! specialisation built on it.

mod entry;
mod redirect;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use redirect::RedirectUrlCache;
pub use stats::CacheStats;
pub use store::TtlCache;

// == Public Constants ==
/// Default lifetime of a stored redirect URL, in seconds.
pub const REDIRECT_TTL_SECS: i64 = 3600;

/// Interval between sweeps of the in-memory caches, in seconds.
pub const SWEEP_INTERVAL_SECS: u64 = 60;
