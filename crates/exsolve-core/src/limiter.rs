//! Sliding-window rate limiter shared by all pipeline workers.
//!
//! The limiter keeps a ledger of admission timestamps. Every access prunes
//! entries older than the window; a caller is admitted while fewer than
//! `max_requests` entries remain. Waiters sleep until the oldest entry
//! expires, with the ledger lock released for the whole sleep.

use crate::error::ConfigError;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Slack added to computed waits so a woken waiter finds the slot expired.
const SLOT_EPSILON: Duration = Duration::from_millis(100);

/// Admission control over a shared quota of outbound calls.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    time_window: Duration,
    ledger: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting at most `max_requests` calls in any trailing
    /// `time_window`.
    ///
    /// A zero window or zero capacity is rejected: neither describes a quota
    /// that can make progress.
    pub fn new(max_requests: usize, time_window: Duration) -> Result<Self, ConfigError> {
        if time_window.is_zero() {
            return Err(ConfigError::ValidationError(
                "rate limiter time window must be > 0".into(),
            ));
        }
        if max_requests == 0 {
            return Err(ConfigError::ValidationError(
                "rate limiter max_requests must be > 0".into(),
            ));
        }
        Ok(Self {
            max_requests,
            time_window,
            ledger: Mutex::new(VecDeque::with_capacity(max_requests)),
        })
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn time_window(&self) -> Duration {
        self.time_window
    }

    /// Wait for a request slot.
    ///
    /// Returns `true` once a slot has been recorded in the ledger, or `false`
    /// if `timeout` elapsed first (nothing is recorded in that case).
    /// `None` waits indefinitely.
    pub async fn acquire(&self, timeout: Option<Duration>) -> bool {
        let start = Instant::now();

        loop {
            let wait = match self.try_admit() {
                Ok(()) => return true,
                Err(wait) => wait,
            };

            let sleep_for = match timeout {
                Some(limit) => {
                    let remaining = limit.saturating_sub(start.elapsed());
                    if remaining.is_zero() {
                        return false;
                    }
                    wait.min(remaining)
                }
                None => wait,
            };

            tracing::trace!("Rate limit reached, waiting {sleep_for:?} for a slot");
            tokio::time::sleep(sleep_for).await;
        }
    }

    /// Number of slots that could be taken right now without waiting.
    pub fn available_slots(&self) -> usize {
        let mut ledger = self.lock();
        self.prune(&mut ledger, Instant::now());
        self.max_requests.saturating_sub(ledger.len())
    }

    /// Forget all recorded requests.
    pub fn reset(&self) {
        self.lock().clear();
    }

    /// Admit the caller if capacity remains, otherwise report how long until
    /// the oldest entry leaves the window.
    fn try_admit(&self) -> Result<(), Duration> {
        let mut ledger = self.lock();
        let now = Instant::now();
        self.prune(&mut ledger, now);

        if ledger.len() < self.max_requests {
            ledger.push_back(now);
            return Ok(());
        }

        let oldest = ledger.front().copied().unwrap_or(now);
        // A window past the clock's range never frees the slot within reach
        let until_free = oldest
            .checked_add(self.time_window)
            .map_or(self.time_window, |expiry| expiry.saturating_duration_since(now));
        Err(until_free.saturating_add(SLOT_EPSILON))
    }

    fn prune(&self, ledger: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = ledger.front() {
            if now.saturating_duration_since(front) > self.time_window {
                ledger.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        // The ledger is a plain queue; a panic mid-update cannot leave it
        // half-written, so a poisoned lock is still usable.
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }
}
