//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use tracing::warn;

use crate::cache::{REDIRECT_TTL_SECS, SWEEP_INTERVAL_SECS};
use crate::session::{UserId, DEFAULT_SESSION_LIFETIME_SECS, MAX_SESSION_LIFETIME_SECS};
use crate::tasks::ScheduleConfig;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Session lifetime in seconds when a login does not specify one
    pub session_lifetime: i64,
    /// Lifetime of stored redirect URLs in seconds
    pub redirect_ttl: i64,
    /// Interval of the memory cache sweeps in seconds
    pub cache_sweep_interval: u64,
    /// Bounds of the random delay before the first durable purge, in seconds
    pub purge_jitter_min: u64,
    pub purge_jitter_max: u64,
    /// Daily durable purge time (UTC)
    pub purge_at: NaiveTime,
    /// Users admitted by the demo adapter; empty admits everyone
    pub allowed_users: Vec<UserId>,
    /// Where denied users are sent
    pub denied_redirect: String,
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SESSION_LIFETIME` - Session lifetime in seconds (default: 31536000)
    /// - `REDIRECT_TTL` - Redirect URL lifetime in seconds (default: 3600)
    /// - `CACHE_SWEEP_INTERVAL` - Cache sweep period in seconds (default: 60)
    /// - `PURGE_JITTER_MIN` / `PURGE_JITTER_MAX` - First purge delay bounds in seconds (default: 600 / 1200)
    /// - `PURGE_AT` - Daily purge time as `HH:MM` UTC (default: 03:12)
    /// - `ALLOWED_USERS` - Comma separated user ids (default: empty, everyone)
    /// - `DENIED_REDIRECT` - Redirect target for denied users (default: /login)
    ///
    /// Out-of-range values are clamped, see [`Config::sanitized`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            session_lifetime: env_or("SESSION_LIFETIME", defaults.session_lifetime),
            redirect_ttl: env_or("REDIRECT_TTL", defaults.redirect_ttl),
            cache_sweep_interval: env_or("CACHE_SWEEP_INTERVAL", defaults.cache_sweep_interval),
            purge_jitter_min: env_or("PURGE_JITTER_MIN", defaults.purge_jitter_min),
            purge_jitter_max: env_or("PURGE_JITTER_MAX", defaults.purge_jitter_max),
            purge_at: env::var("PURGE_AT")
                .ok()
                .and_then(|v| NaiveTime::parse_from_str(v.trim(), "%H:%M").ok())
                .unwrap_or(defaults.purge_at),
            allowed_users: env::var("ALLOWED_USERS")
                .map(|v| parse_user_list(&v))
                .unwrap_or(defaults.allowed_users),
            denied_redirect: env::var("DENIED_REDIRECT").unwrap_or(defaults.denied_redirect),
        }
        .sanitized()
    }

    /// Clamps lifetimes to `1..=MAX_SESSION_LIFETIME_SECS`, the sweep interval
    /// to at least one second, and the jitter window so `min <= max`.
    pub fn sanitized(mut self) -> Self {
        let clamp_secs = |value: i64, name: &str| {
            let clamped = value.clamp(1, MAX_SESSION_LIFETIME_SECS);
            if clamped != value {
                warn!(name, value, clamped, "Lifetime out of range, clamped");
            }
            clamped
        };
        self.session_lifetime = clamp_secs(self.session_lifetime, "SESSION_LIFETIME");
        self.redirect_ttl = clamp_secs(self.redirect_ttl, "REDIRECT_TTL");

        if self.cache_sweep_interval == 0 {
            warn!("CACHE_SWEEP_INTERVAL must be positive, using 1s");
            self.cache_sweep_interval = 1;
        }
        if self.purge_jitter_min > self.purge_jitter_max {
            warn!(
                min = self.purge_jitter_min,
                max = self.purge_jitter_max,
                "PURGE_JITTER_MIN exceeds PURGE_JITTER_MAX, using the minimum for both"
            );
            self.purge_jitter_max = self.purge_jitter_min;
        }
        self
    }

    /// Timing for the background scheduler.
    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            sweep_interval: Duration::from_secs(self.cache_sweep_interval),
            purge_jitter_min: Duration::from_secs(self.purge_jitter_min),
            purge_jitter_max: Duration::from_secs(self.purge_jitter_max),
            purge_at: self.purge_at,
        }
    }
}

fn parse_user_list(raw: &str) -> Vec<UserId> {
    raw.split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        let schedule = ScheduleConfig::default();
        Self {
            server_port: 3000,
            session_lifetime: DEFAULT_SESSION_LIFETIME_SECS,
            redirect_ttl: REDIRECT_TTL_SECS,
            cache_sweep_interval: SWEEP_INTERVAL_SECS,
            purge_jitter_min: schedule.purge_jitter_min.as_secs(),
            purge_jitter_max: schedule.purge_jitter_max.as_secs(),
            purge_at: schedule.purge_at,
            allowed_users: Vec::new(),
            denied_redirect: "/login".to_string(),
        }
    }
}
