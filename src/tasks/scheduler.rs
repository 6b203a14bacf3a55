//! Background Scheduler
//!
//! Owns the sweeps of both memory caches and the purge of the durable store.
//!
//! The purge does not start on a fixed interval from process start: the first
//! run waits a random delay so a fleet deployed at once does not hit the store
//! together, the second run is aligned to a fixed UTC wall-clock time, and from
//! there it repeats every 24 hours.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cache::{RedirectUrlCache, SWEEP_INTERVAL_SECS};
use crate::clock::SharedClock;
use crate::session::{PurgeExpiredSessions, SessionCache, SessionStore};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

// == Schedule Config ==
/// Timing of the background work.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Period of both cache sweeps
    pub sweep_interval: Duration,
    /// Lower bound (inclusive) of the first purge delay
    pub purge_jitter_min: Duration,
    /// Upper bound (exclusive) of the first purge delay
    pub purge_jitter_max: Duration,
    /// UTC wall-clock time of the daily purge
    pub purge_at: NaiveTime,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(SWEEP_INTERVAL_SECS),
            purge_jitter_min: Duration::from_secs(10 * 60),
            purge_jitter_max: Duration::from_secs(20 * 60),
            purge_at: NaiveTime::from_hms_opt(3, 12, 0).unwrap_or_default(),
        }
    }
}

impl ScheduleConfig {
    /// Shortest accepted sweep period.
    pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

    /// Raises a zero sweep period to [`Self::MIN_SWEEP_INTERVAL`] and widens
    /// an inverted jitter window to `[min, min]`.
    pub fn normalized(mut self) -> Self {
        if self.sweep_interval < Self::MIN_SWEEP_INTERVAL {
            warn!(
                interval_ms = self.sweep_interval.as_millis() as u64,
                "Sweep interval too short, using 1s"
            );
            self.sweep_interval = Self::MIN_SWEEP_INTERVAL;
        }
        if self.purge_jitter_min > self.purge_jitter_max {
            warn!("Purge jitter minimum exceeds maximum, using the minimum for both");
            self.purge_jitter_max = self.purge_jitter_min;
        }
        self
    }
}

// == Timing Helpers ==
/// Picks a uniformly random delay in `[min, max)`.
pub fn jittered_delay(min: Duration, max: Duration) -> Duration {
    let span = max.saturating_sub(min).as_millis() as u64;
    if span == 0 {
        return min;
    }
    min + Duration::from_millis(fastrand::u64(0..span))
}

/// Next occurrence of `at` (UTC) not earlier than `now`.
///
/// When `now` is already past today's `at`, the result is tomorrow's.
pub fn next_aligned_run(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if now > today {
        today + chrono::Duration::days(1)
    } else {
        today
    }
}

struct Running {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

// == Scheduler ==
pub struct Scheduler<S: SessionStore> {
    sessions: Arc<SessionCache>,
    redirects: Arc<RedirectUrlCache>,
    purge: Arc<PurgeExpiredSessions<S>>,
    clock: SharedClock,
    config: ScheduleConfig,
    running: Mutex<Option<Running>>,
}

impl<S: SessionStore> Scheduler<S> {
    pub fn new(
        sessions: Arc<SessionCache>,
        redirects: Arc<RedirectUrlCache>,
        purge: Arc<PurgeExpiredSessions<S>>,
        clock: SharedClock,
        config: ScheduleConfig,
    ) -> Self {
        Self {
            sessions,
            redirects,
            purge,
            clock,
            config: config.normalized(),
            running: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    // == Start ==
    /// Spawns the two cache sweeps and the purge chain.
    ///
    /// Must be called from within a Tokio runtime. Does nothing when already
    /// started.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if running.is_some() {
            debug!("Scheduler already started");
            return;
        }

        let token = CancellationToken::new();

        let sessions = self.sessions.clone();
        let session_sweep = spawn_sweep(
            "session",
            self.config.sweep_interval,
            token.clone(),
            move || sessions.cleanup(),
        );
        info!("Cleanup process for the session cache is started");

        let redirects = self.redirects.clone();
        let redirect_sweep = spawn_sweep(
            "redirect_url",
            self.config.sweep_interval,
            token.clone(),
            move || redirects.cleanup(),
        );
        info!("Cleanup process for the redirect URL cache is started");

        let purge = spawn_purge_chain(
            self.purge.clone(),
            self.clock.clone(),
            self.config.clone(),
            token.clone(),
        );

        *running = Some(Running {
            token,
            handles: vec![session_sweep, redirect_sweep, purge],
        });
    }

    // == Stop ==
    /// Cancels every pending sweep and purge timer and aborts their loops.
    ///
    /// A run already in progress executes in its own task and finishes;
    /// nothing new starts afterwards. Does nothing when not started.
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            debug!("Scheduler already stopped");
            return;
        };

        let tasks = running.handles.len();
        running.shutdown();
        info!(tasks, "Cache sweeps and durable purge are stopped");
    }
}

impl Running {
    fn shutdown(self) {
        self.token.cancel();
        for handle in self.handles {
            handle.abort();
        }
    }
}

impl<S: SessionStore> Drop for Scheduler<S> {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            running.shutdown();
        }
    }
}

/// Waits for `wait` unless cancelled first. Returns false on cancellation.
async fn sleep_or_cancel(token: &CancellationToken, wait: Duration) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(wait) => true,
    }
}

fn spawn_sweep<F>(
    cache: &'static str,
    period: Duration,
    token: CancellationToken,
    sweep: F,
) -> JoinHandle<()>
where
    F: Fn() -> usize + Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            // Each run in its own task so a panic cannot take the timer down.
            let run = sweep.clone();
            match tokio::spawn(async move { run() }).await {
                Ok(0) => debug!(cache, "Sweep found no expired entries"),
                Ok(removed) => info!(cache, removed, "Cleaned up expired in-memory entries"),
                Err(err) => error!(cache, error = %err, "Cache sweep failed"),
            }
        }
        debug!(cache, "Sweep loop exited");
    })
}

async fn run_purge<S: SessionStore>(purge: &Arc<PurgeExpiredSessions<S>>, phase: &'static str) {
    let purge = purge.clone();
    match tokio::spawn(async move { purge.run(None).await }).await {
        Ok(Ok(report)) => debug!(phase, deleted = report.deleted_count, "Durable purge run finished"),
        Ok(Err(err)) => error!(phase, error = %err, "Durable purge failed"),
        Err(err) => error!(phase, error = %err, "Durable purge task aborted"),
    }
}

fn spawn_purge_chain<S: SessionStore>(
    purge: Arc<PurgeExpiredSessions<S>>,
    clock: SharedClock,
    config: ScheduleConfig,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let delay = jittered_delay(config.purge_jitter_min, config.purge_jitter_max);
        info!(
            delay_ms = delay.as_millis() as u64,
            "Durable purge will start after a random delay"
        );
        if !sleep_or_cancel(&token, delay).await {
            return;
        }
        run_purge(&purge, "jittered").await;

        let now = clock.now();
        let next = next_aligned_run(now, config.purge_at);
        info!(next_run = %next, "Next durable purge scheduled");
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        if !sleep_or_cancel(&token, wait).await {
            return;
        }
        run_purge(&purge, "aligned").await;
        info!(at = %config.purge_at, "Durable purge now runs daily");

        let mut ticker = interval_at(Instant::now() + DAY, DAY);
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => run_purge(&purge, "daily").await,
            }
        }
    })
}
