//! Rolling-window limiter for outbound exchange requests.
//!
//! A [`RateGate`] grants at most `permits` acquisitions within any window
//! of length `window`. Grants are tracked as a sliding log of timestamps,
//! so a caller that arrives after a burst waits exactly until the oldest
//! counted grant ages out, never for a fixed bucket boundary.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

/// Default number of requests per window.
pub const DEFAULT_PERMITS: usize = 6;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

/// Proof that a request slot was granted.
#[derive(Debug, Clone, Copy)]
pub struct Permit {
    granted_at: Instant,
}

impl Permit {
    /// Instant at which the gate granted this permit.
    pub fn granted_at(&self) -> Instant {
        self.granted_at
    }
}

/// Request-rate limiter safe to share between tasks (wrap in an `Arc`).
#[derive(Debug)]
pub struct RateGate {
    permits: usize,
    window: Duration,
    grants: Mutex<VecDeque<Instant>>,
}

impl RateGate {
    /// Creates a gate allowing `permits` acquisitions per `window`.
    ///
    /// A zero `permits` value is treated as one so the gate can always
    /// make progress.
    pub fn new(permits: usize, window: Duration) -> Self {
        let permits = permits.max(1);
        Self {
            permits,
            window,
            grants: Mutex::new(VecDeque::with_capacity(permits)),
        }
    }

    /// Maximum number of grants per window.
    pub fn permits(&self) -> usize {
        self.permits
    }

    /// Length of the rolling window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Waits until a request may be issued and returns its permit.
    ///
    /// Waiters are served in arrival order: the grant log lock is fair and
    /// is held while waiting. Dropping the returned future before it
    /// completes records nothing, so abandoning an acquisition (for
    /// example on shutdown) never consumes a slot.
    pub async fn acquire(&self) -> Permit {
        let mut grants = self.grants.lock().await;
        loop {
            let now = Instant::now();
            while let Some(&oldest) = grants.front() {
                if now.duration_since(oldest) >= self.window {
                    grants.pop_front();
                } else {
                    break;
                }
            }

            if grants.len() < self.permits {
                grants.push_back(now);
                return Permit { granted_at: now };
            }

            // Full: the front entry is the next one to age out.
            let Some(&oldest) = grants.front() else {
                continue;
            };
            let wake_at = oldest + self.window;
            debug!(
                permits = self.permits,
                wait_ms = wake_at.saturating_duration_since(now).as_millis() as u64,
                "Rate gate full, waiting"
            );
            sleep_until(wake_at).await;
        }
    }

    /// Number of grants still counted against the current window.
    ///
    /// Returns `None` while an acquisition holds the grant log, which a
    /// waiter on a full gate does for up to one window. Never blocks.
    pub fn in_flight(&self) -> Option<usize> {
        let grants = self.grants.try_lock().ok()?;
        let now = Instant::now();
        Some(
            grants
                .iter()
                .filter(|t| now.duration_since(**t) < self.window)
                .count(),
        )
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(DEFAULT_PERMITS, DEFAULT_WINDOW)
    }
}
