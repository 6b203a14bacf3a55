//! Cache Entry Module
//!
//! Defines a single cached value with its absolute expiration time.

use chrono::{DateTime, Utc};

// == Cache Entry ==
/// A stored value and the instant at which it stops being visible.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Absolute expiration time
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    pub fn new(value: V, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `expires_at <= now`, so a
    /// lookup at exactly the expiration instant already misses.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_entry_not_expired_before_deadline() {
        let entry = CacheEntry::new("value", t0() + Duration::seconds(10));
        assert!(!entry.is_expired_at(t0()));
        assert!(!entry.is_expired_at(t0() + Duration::milliseconds(9_999)));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new("value", t0());
        assert!(entry.is_expired_at(t0()), "Entry should be expired at boundary");
    }
}
