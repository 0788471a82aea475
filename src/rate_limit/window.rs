//! Fixed-capacity sliding window limiter.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use niabot_api_client::rate_limit::RateLimit;
//!
//! let limiter = RateLimit::new("mojang-profiles", 2, Duration::from_secs(60));
//!
//! assert!(limiter.try_acquire().is_ok());
//! assert!(limiter.try_acquire().is_ok());
//! assert!(limiter.try_acquire().is_err());
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::error::NiaError;
use crate::rate_limit::{Budget, Limiter, MIN_WAIT, RequestGate, lock};

/// Upper bound on timestamps allocated up front; larger budgets grow on demand.
const MAX_PREALLOCATED_SLOTS: u32 = 1024;

/// A fixed budget of `capacity` calls per sliding `window`.
///
/// Grants are recorded as timestamps; a slot frees itself once its timestamp
/// falls out of the window, so there is nothing to release after a request.
/// A capacity of zero is allowed and means the limiter never admits anything.
#[derive(Debug)]
pub struct RateLimit {
    name: String,
    capacity: u32,
    window: Duration,
    /// Grant timestamps, oldest first
    granted: Mutex<VecDeque<Instant>>,
}

impl RateLimit {
    /// Create a new limiter.
    ///
    /// # Arguments
    ///
    /// * `name` - Name used in logs and health reports
    /// * `capacity` - Maximum number of calls per window
    /// * `window` - The sliding window duration
    pub fn new(name: impl Into<String>, capacity: u32, window: Duration) -> Self {
        Self {
            name: name.into(),
            capacity,
            window,
            granted: Mutex::new(VecDeque::with_capacity(
                capacity.min(MAX_PREALLOCATED_SLOTS) as usize,
            )),
        }
    }

    /// Create a new limiter from a [`Budget`].
    pub fn from_budget(name: impl Into<String>, budget: Budget) -> Self {
        Self::new(name, budget.capacity, budget.window)
    }

    /// Try to acquire a slot.
    ///
    /// Returns `Ok(())` if allowed, `Err(wait_time)` if rate limited.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut granted = lock(&self.granted);
        self.prune(&mut granted, now);

        if (granted.len() as u32) < self.capacity {
            granted.push_back(now);
            Ok(())
        } else {
            // Wait for the oldest grant to leave the window.
            let wait_time = granted
                .front()
                .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
                .unwrap_or(self.window);
            Err(wait_time.max(MIN_WAIT))
        }
    }

    /// Wait until a slot is free, then take it.
    ///
    /// Waiters are not served in order: after each sleep the check runs again
    /// and may lose the slot to a newer caller. Dropping the future while it
    /// waits takes nothing.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire() {
                Ok(()) => return,
                Err(wait_time) => {
                    tracing::debug!(
                        limiter = %self.name,
                        wait_ms = wait_time.as_millis() as u64,
                        "rate limit reached, waiting for a free slot"
                    );
                    tokio::time::sleep(wait_time).await;
                }
            }
        }
    }

    /// Get the number of slots free right now.
    pub fn remaining(&self) -> u32 {
        let now = Instant::now();
        let mut granted = lock(&self.granted);
        self.prune(&mut granted, now);
        self.capacity.saturating_sub(granted.len() as u32)
    }

    /// Get the time until the next slot is available.
    ///
    /// Returns `None` if a slot is available now.
    pub fn time_until_available(&self) -> Option<Duration> {
        let now = Instant::now();
        let mut granted = lock(&self.granted);
        self.prune(&mut granted, now);

        if (granted.len() as u32) < self.capacity {
            None
        } else {
            Some(
                granted
                    .front()
                    .map_or(self.window, |oldest| {
                        self.window.saturating_sub(now.duration_since(*oldest))
                    }),
            )
        }
    }

    /// Get the window duration.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Remove grants that are outside the window.
    fn prune(&self, granted: &mut VecDeque<Instant>, now: Instant) {
        while granted
            .front()
            .is_some_and(|ts| now.duration_since(*ts) >= self.window)
        {
            granted.pop_front();
        }
    }
}

impl Limiter for RateLimit {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn free_capacity(&self) -> u32 {
        self.remaining()
    }
}

impl RequestGate for RateLimit {
    async fn admit(&self) -> Result<(), NiaError> {
        self.acquire().await;
        Ok(())
    }
}
