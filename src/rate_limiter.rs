use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::resetter::Resetter;

/// Distinct clients tracked before a window reset discards the whole map.
pub const DEFAULT_MAX_VISITORS: usize = 1000;

/// Construction parameters for a [`RateLimiter`]. Immutable once the limiter exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    /// Requests admitted per client per window
    pub limit: u32,
    /// Length of the fixed window, also the reset period
    pub window: Duration,
    /// Key cardinality above which a reset clears every counter
    pub max_visitors: usize,
}

impl RateLimitSettings {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            max_visitors: DEFAULT_MAX_VISITORS,
        }
    }

    pub fn with_max_visitors(mut self, max_visitors: usize) -> Self {
        self.max_visitors = max_visitors;
        self
    }
}

/// Result of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// UNIX timestamp (seconds) of the predicted next reset
    pub reset_at: u64,
    /// Seconds until the next reset, only set on rejection
    pub retry_after: Option<u64>,
}

impl Decision {
    pub fn allowed(limit: u32, remaining: u32, reset_at: u64) -> Self {
        Self {
            allowed: true,
            limit,
            remaining,
            reset_at,
            retry_after: None,
        }
    }

    pub fn denied(limit: u32, reset_at: u64, retry_after: u64) -> Self {
        Self {
            allowed: false,
            limit,
            remaining: 0,
            reset_at,
            retry_after: Some(retry_after),
        }
    }
}

/// What a window advance did to the counter map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowAdvance {
    /// Distinct clients present before the advance
    pub tracked_clients: usize,
    /// Whether the map was discarded instead of zeroed in place
    pub cleared: bool,
}

struct WindowState {
    counts: HashMap<String, u32>,
    window_start: SystemTime,
}

/// Per-client request counts for the current fixed window.
///
/// Every read and write of the counts and the window start goes through a
/// single mutex, so concurrent checks for one client are linearized and can
/// never admit more than `limit` requests per window.
pub struct WindowCounter {
    state: Mutex<WindowState>,
    settings: RateLimitSettings,
}

impl WindowCounter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            state: Mutex::new(WindowState {
                counts: HashMap::new(),
                window_start: SystemTime::now(),
            }),
            settings,
        }
    }

    // Counts stay consistent even if a holder panicked: every mutation is a
    // single integer store or a map swap.
    fn lock(&self) -> MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit or reject one request from `identity`, counting it when admitted.
    pub fn check(&self, identity: &str) -> Decision {
        let limit = self.settings.limit;
        let mut state = self.lock();

        let count = state.counts.get(identity).copied().unwrap_or(0);
        let next_reset = window_end(state.window_start, self.settings.window);
        let reset_at = unix_seconds(next_reset);

        if count >= limit {
            drop(state);
            return Decision::denied(limit, reset_at, seconds_until(next_reset));
        }

        match state.counts.get_mut(identity) {
            Some(stored) => *stored = count + 1,
            None => {
                state.counts.insert(identity.to_owned(), count + 1);
            }
        }

        Decision::allowed(limit, limit - count - 1, reset_at)
    }

    /// Start a new window.
    ///
    /// When more than `max_visitors` distinct clients are tracked the whole map
    /// is replaced by an empty one; otherwise every known client is zeroed in
    /// place. The window start moves to the current time and never backwards.
    pub fn advance(&self) -> WindowAdvance {
        let mut state = self.lock();

        let tracked_clients = state.counts.len();
        let cleared = tracked_clients > self.settings.max_visitors;
        if cleared {
            state.counts = HashMap::new();
        } else {
            state.counts.values_mut().for_each(|count| *count = 0);
        }

        state.window_start = state.window_start.max(SystemTime::now());

        WindowAdvance {
            tracked_clients,
            cleared,
        }
    }

    /// Requests counted for `identity` in the current window, if it is known.
    pub fn count(&self, identity: &str) -> Option<u32> {
        self.lock().counts.get(identity).copied()
    }

    pub fn tracked_clients(&self) -> usize {
        self.lock().counts.len()
    }

    pub fn window_start(&self) -> SystemTime {
        self.lock().window_start
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.settings
    }
}

/// Point-in-time view of the limiter, reported by the health endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterStats {
    pub limit: u32,
    pub window_seconds: u64,
    pub max_visitors: usize,
    pub tracked_clients: usize,
    pub window_start: u64,
    pub resetter_running: bool,
}

/// Owned handle to the process's rate limiting state and its background
/// resetter. Cheap to clone; every clone shares the same counters.
#[derive(Clone)]
pub struct RateLimiter {
    counter: Arc<WindowCounter>,
    resetter: Arc<Resetter>,
}

impl RateLimiter {
    /// Create the limiter and spawn its resetter on the current tokio runtime.
    ///
    /// Settings are taken as given. A zero window cannot drive the reset
    /// timer, so callers are expected to validate it beforehand.
    pub fn new(settings: RateLimitSettings) -> Self {
        let counter = Arc::new(WindowCounter::new(settings));
        let resetter = Arc::new(Resetter::spawn(Arc::clone(&counter)));

        info!(
            limit = settings.limit,
            window = ?settings.window,
            max_visitors = settings.max_visitors,
            "Rate limiter started"
        );

        Self { counter, resetter }
    }

    pub fn check(&self, identity: &str) -> Decision {
        self.counter.check(identity)
    }

    /// Stop the background resetter and wait for it to exit.
    ///
    /// Only the first call signals the task; later calls return immediately.
    /// Counting keeps working afterwards, but windows no longer advance.
    pub async fn stop(&self) {
        self.resetter.stop().await;
    }

    pub fn settings(&self) -> RateLimitSettings {
        self.counter.settings()
    }

    pub fn counter(&self) -> &WindowCounter {
        &self.counter
    }

    pub fn is_resetter_running(&self) -> bool {
        self.resetter.is_running()
    }

    pub fn stats(&self) -> LimiterStats {
        let settings = self.settings();
        LimiterStats {
            limit: settings.limit,
            window_seconds: settings.window.as_secs(),
            max_visitors: settings.max_visitors,
            tracked_clients: self.counter.tracked_clients(),
            window_start: unix_seconds(self.counter.window_start()),
            resetter_running: self.is_resetter_running(),
        }
    }
}

// 9999-12-31T23:59:59Z, representable as a SystemTime on every platform.
const MAX_RESET_SECS: u64 = 253_402_300_799;

/// End of the window starting at `start`, saturating instead of overflowing
/// for windows too long to represent.
fn window_end(start: SystemTime, window: Duration) -> SystemTime {
    start
        .checked_add(window)
        .or_else(|| UNIX_EPOCH.checked_add(Duration::from_secs(MAX_RESET_SECS)))
        .unwrap_or(start)
}

pub(crate) fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn seconds_until(deadline: SystemTime) -> u64 {
    deadline
        .duration_since(SystemTime::now())
        .map(|remaining| remaining.as_secs_f64().round() as u64)
        .unwrap_or(0)
}
