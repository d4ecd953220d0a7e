//! Inactivity watchdog.
//!
//! Tracks the timestamp of the last observed outbound traffic and decides
//! when an idle daemon should terminate itself. The timer is reset only when
//! a queued send request is found; empty drains and inbound reads do not
//! count as activity.

use std::time::{Duration, Instant};

/// Default inactivity threshold: 5 minutes.
pub const DEFAULT_THRESHOLD: Duration = Duration::from_secs(300);

/// Pure termination predicate: has more time than `threshold` passed since
/// `last_activity`?
pub fn expired(now: Instant, last_activity: Instant, threshold: Duration) -> bool {
    now.saturating_duration_since(last_activity) > threshold
}

/// Inactivity timer owned by the daemon's control loop.
#[derive(Debug)]
pub struct Watchdog {
    last_activity: Instant,
    threshold: Duration,
}

impl Watchdog {
    /// Create a watchdog with last activity initialized to now.
    pub fn new(threshold: Duration) -> Self {
        Self {
            last_activity: Instant::now(),
            threshold,
        }
    }

    /// Record activity: resets the timer to now.
    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    /// How long the daemon has been idle.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    /// Whether the inactivity threshold has been exceeded.
    pub fn should_terminate(&self) -> bool {
        expired(Instant::now(), self.last_activity, self.threshold)
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
