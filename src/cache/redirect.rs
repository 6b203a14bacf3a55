//! Redirect URL Cache
//!
//! Remembers where to send a user after an authentication round trip.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::cache::{CacheStats, TtlCache, REDIRECT_TTL_SECS};
use crate::clock::SharedClock;

// == Redirect URL Cache ==
/// Maps opaque random keys to destination URLs.
#[derive(Debug)]
pub struct RedirectUrlCache {
    inner: TtlCache<String>,
}

impl RedirectUrlCache {
    /// Creates a cache whose entries default to `default_ttl`.
    pub fn new(default_ttl: Duration, clock: SharedClock) -> Self {
        Self {
            inner: TtlCache::new("redirect_url", default_ttl, clock),
        }
    }

    /// Creates a cache with the standard one hour lifetime.
    pub fn with_clock(clock: SharedClock) -> Self {
        Self::new(Duration::seconds(REDIRECT_TTL_SECS), clock)
    }

    // == Set ==
    /// Stores `url` under `key`.
    ///
    /// `expires_at` wins when given; otherwise `lifetime` is applied from now;
    /// with neither the cache default is used.
    pub fn set(
        &self,
        key: impl Into<String>,
        url: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        lifetime: Option<Duration>,
    ) {
        let expires_at = expires_at.or_else(|| lifetime.map(|ttl| self.inner.now() + ttl));
        self.inner.set(key, url.into(), expires_at);
    }

    // == Store ==
    /// Stores `url` under a freshly generated key and returns the key.
    pub fn store(&self, url: impl Into<String>) -> String {
        let key = Uuid::new_v4().to_string();
        self.inner.set(key.clone(), url.into(), None);
        key
    }

    // == Get ==
    /// Looks up the URL for `key`, deleting it after a hit when `consume` is set.
    pub fn get(&self, key: &str, consume: bool) -> Option<String> {
        let url = self.inner.get(key)?;
        if consume {
            self.inner.delete(key);
        }
        Some(url)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.inner.delete(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.has(key)
    }

    pub fn cleanup(&self) -> usize {
        self.inner.cleanup()
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
