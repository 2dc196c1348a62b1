//! Cached clock implementation.

use chrono::Utc;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

/// Default cadence of the background refresher.
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 100;

/// Configuration for a [`CachedClock`].
#[derive(Debug, Clone)]
pub struct ClockConfig {
    /// How often the background refresher re-reads the system clock.
    pub refresh_interval: Duration,
    /// Whether constructing the clock also starts the refresher.
    pub auto_start: bool,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_millis(DEFAULT_REFRESH_INTERVAL_MS),
            auto_start: true,
        }
    }
}

impl ClockConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the refresher cadence.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Set whether the refresher starts with the clock.
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }
}

struct ClockInner {
    /// Milliseconds since the Unix epoch as of the last refresh.
    /// AtomicI64 so 32-bit hosts cannot observe a torn value.
    cached_ms: AtomicI64,
    /// Guards refresher start/stop only; value reads never take it.
    refresher: Mutex<RefresherState>,
    stop_signal: Condvar,
    config: ClockConfig,
}

struct RefresherState {
    running: bool,
    /// Bumped on every start so a stop/start pair retires the old thread
    /// even if it has not observed the stop yet.
    generation: u64,
}

impl ClockInner {
    fn refresh(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.cached_ms.store(now, Ordering::Relaxed);
        now
    }
}

/// A clock that trades accuracy for read cost.
///
/// The cached value is only as fresh as the last [`now_accurate`] call or
/// refresher pass, so [`now_cached`] can lag real time by up to the
/// refresh interval. The value tracks the wall clock: it is monotone per
/// observer except across backward system-clock jumps.
///
/// Handles are cheap to clone and share one underlying value.
///
/// [`now_accurate`]: CachedClock::now_accurate
/// [`now_cached`]: CachedClock::now_cached
#[derive(Clone)]
pub struct CachedClock {
    inner: Arc<ClockInner>,
}

impl CachedClock {
    /// Create a clock from the given configuration.
    ///
    /// The cached value is seeded with an accurate read, so the clock is
    /// usable before the first refresher pass.
    pub fn new(config: ClockConfig) -> Self {
        let clock = Self {
            inner: Arc::new(ClockInner {
                cached_ms: AtomicI64::new(Utc::now().timestamp_millis()),
                refresher: Mutex::new(RefresherState {
                    running: false,
                    generation: 0,
                }),
                stop_signal: Condvar::new(),
                config,
            }),
        };

        if clock.inner.config.auto_start {
            clock.start_refresher();
        }

        clock
    }

    /// The process-wide default clock, created (and its refresher started)
    /// on first access.
    pub fn global() -> &'static CachedClock {
        static GLOBAL: OnceLock<CachedClock> = OnceLock::new();
        GLOBAL.get_or_init(|| CachedClock::new(ClockConfig::default()))
    }

    /// Last refreshed milliseconds since the Unix epoch. No syscall.
    #[inline]
    pub fn now_cached(&self) -> i64 {
        self.inner.cached_ms.load(Ordering::Relaxed)
    }

    /// Read the system clock, publish it as the new cached value, return it.
    ///
    /// Safe to call from any thread; last writer wins.
    pub fn now_accurate(&self) -> i64 {
        self.inner.refresh()
    }

    /// Start the background refresher if it is not already running.
    ///
    /// At most one refresher thread exists per clock. The thread loops
    /// `now_accurate(); wait(refresh_interval)`; a spurious wakeup just
    /// refreshes early and keeps waiting. Only [`stop_refresher`] ends it.
    ///
    /// [`stop_refresher`]: CachedClock::stop_refresher
    pub fn start_refresher(&self) {
        let mut state = self.inner.refresher.lock();
        if state.running {
            return;
        }
        state.running = true;
        state.generation += 1;
        let generation = state.generation;

        info!(
            interval_ms = self.inner.config.refresh_interval.as_millis() as u64,
            "starting clock refresher"
        );

        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name("tempo-clock-refresher".into())
            .spawn(move || {
                let mut state = inner.refresher.lock();
                while state.running && state.generation == generation {
                    inner.refresh();
                    inner
                        .stop_signal
                        .wait_for(&mut state, inner.config.refresh_interval);
                }
                debug!("clock refresher exiting");
            })
            .expect("failed to spawn clock refresher thread");
    }

    /// Signal the refresher to exit and wake it. Idempotent.
    pub fn stop_refresher(&self) {
        let mut state = self.inner.refresher.lock();
        if state.running {
            info!("stopping clock refresher");
        }
        state.running = false;
        self.inner.stop_signal.notify_all();
    }

    /// Whether the refresher is currently running.
    pub fn refresher_running(&self) -> bool {
        self.inner.refresher.lock().running
    }

    /// The configured refresher cadence.
    pub fn refresh_interval(&self) -> Duration {
        self.inner.config.refresh_interval
    }
}

impl Default for CachedClock {
    fn default() -> Self {
        Self::new(ClockConfig::default())
    }
}
