//! TTL Cache Module
//!
//! Keyed in-memory store with per-entry absolute expiration. Expired entries
//! are evicted lazily on lookup and in bulk by [`TtlCache::cleanup`].

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats};
use crate::clock::SharedClock;

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    stats: CacheStats,
}

// == TTL Cache ==
/// Thread-safe TTL cache.
///
/// Every instance owns its own lock; two caches never contend with each other.
/// Share an instance between request handlers and the sweeper with `Arc`.
pub struct TtlCache<V> {
    /// Name used in log lines
    name: &'static str,
    /// Lifetime applied when `set` is called without an expiration
    default_ttl: Duration,
    clock: SharedClock,
    inner: Mutex<Inner<V>>,
}

impl<V: Clone> TtlCache<V> {
    // == Constructor ==
    /// Creates an empty cache.
    ///
    /// # Arguments
    /// * `name` - Label for log output
    /// * `default_ttl` - Lifetime for entries stored without `expires_at`
    /// * `clock` - Time source deciding what "expired" means
    pub fn new(name: &'static str, default_ttl: Duration, clock: SharedClock) -> Self {
        Self {
            name,
            default_ttl,
            clock,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                stats: CacheStats::new(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current time according to this cache's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // == Set ==
    /// Inserts or overwrites `key` unconditionally.
    ///
    /// Without `expires_at` the entry lives for the cache's default TTL.
    pub fn set(&self, key: impl Into<String>, value: V, expires_at: Option<DateTime<Utc>>) {
        let expires_at = expires_at.unwrap_or_else(|| self.clock.now() + self.default_ttl);
        let mut inner = self.inner.lock();
        inner.entries.insert(key.into(), CacheEntry::new(value, expires_at));
        let len = inner.entries.len();
        inner.stats.set_total_entries(len);
    }

    // == Get ==
    /// Returns a copy of the live value for `key`.
    ///
    /// An expired entry is removed as a side effect and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                inner.stats.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                inner.entries.remove(key);
                inner.stats.set_total_entries(inner.entries.len());
                inner.stats.record_expired();
                inner.stats.record_miss();
                debug!(cache = self.name, key, "entry expired");
                None
            }
            None => {
                inner.stats.record_miss();
                None
            }
        }
    }

    // == Delete ==
    /// Removes `key`. Returns whether anything was removed.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let existed = inner.entries.remove(key).is_some();
        let len = inner.entries.len();
        inner.stats.set_total_entries(len);
        existed
    }

    // == Has ==
    /// Reports whether a live entry exists for `key` without touching stats.
    pub fn has(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired_at(now))
    }

    // == Cleanup ==
    /// Removes every entry with `expires_at <= now`.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired_at(now));
        let removed = before - inner.entries.len();

        let len = inner.entries.len();
        inner.stats.set_total_entries(len);
        inner.stats.record_swept(removed);
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    // == Length ==
    /// Number of entries physically held, expired or not.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}

impl<V> std::fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TtlCache")
            .field("name", &self.name)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use chrono::TimeZone;
    use std::sync::Arc;

    fn setup() -> (Arc<ManualClock>, TtlCache<String>) {
        let start = Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let cache = TtlCache::new("test", Duration::hours(1), clock.clone());
        (clock, cache)
    }

    #[test]
    fn test_cache_new() {
        let (_, cache) = setup();
        assert!(cache.is_empty());
        assert_eq!(cache.name(), "test");
    }

    #[test]
    fn test_set_and_get() {
        let (_, cache) = setup();
        cache.set("key1", "value1".to_string(), None);

        assert_eq!(cache.get("key1").as_deref(), Some("value1"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let (_, cache) = setup();
        assert!(cache.get("nonexistent").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_overwrite() {
        let (_, cache) = setup();
        cache.set("key1", "value1".to_string(), None);
        cache.set("key1", "value2".to_string(), None);

        assert_eq!(cache.get("key1").as_deref(), Some("value2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_default_ttl_applies_without_expiration() {
        let (clock, cache) = setup();
        cache.set("key1", "value1".to_string(), None);

        clock.advance(Duration::minutes(59));
        assert!(cache.has("key1"));

        clock.advance(Duration::minutes(1));
        assert!(!cache.has("key1"));
    }

    #[test]
    fn test_lazy_eviction_on_get() {
        let (clock, cache) = setup();
        let expires_at = clock.now() + Duration::seconds(1);
        cache.set("u1", "https://a".to_string(), Some(expires_at));

        assert_eq!(cache.get("u1").as_deref(), Some("https://a"));

        clock.advance(Duration::milliseconds(1001));
        assert!(cache.get("u1").is_none());
        // Already evicted by the read, nothing left for the sweep.
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.cleanup(), 0);

        let stats = cache.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.swept, 0);
    }

    #[test]
    fn test_has_does_not_evict() {
        let (clock, cache) = setup();
        cache.set("k", "v".to_string(), Some(clock.now() + Duration::seconds(5)));
        clock.advance(Duration::seconds(5));

        assert!(!cache.has("k"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_, cache) = setup();
        cache.set("key1", "value1".to_string(), None);

        assert!(cache.delete("key1"));
        assert!(!cache.delete("key1"));
        assert!(cache.get("key1").is_none());
    }

    #[test]
    fn test_cleanup_removes_only_expired() {
        let (clock, cache) = setup();
        let now = clock.now();
        cache.set("short1", "a".to_string(), Some(now + Duration::seconds(1)));
        cache.set("short2", "b".to_string(), Some(now + Duration::seconds(2)));
        cache.set("long", "c".to_string(), Some(now + Duration::seconds(100)));

        clock.advance(Duration::seconds(2));
        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("short1").is_none());
        assert!(cache.get("short2").is_none());
        assert_eq!(cache.get("long").as_deref(), Some("c"));
        assert_eq!(cache.stats().swept, 2);
    }

    #[test]
    fn test_concurrent_access() {
        let (_, cache) = setup();
        let cache = Arc::new(cache);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let key = format!("k{}-{}", t, i);
                        cache.set(key.clone(), key.clone(), None);
                        assert_eq!(cache.get(&key), Some(key.clone()));
                        if i % 2 == 0 {
                            cache.delete(&key);
                        }
                        cache.cleanup();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 8 * 100);
    }
}
