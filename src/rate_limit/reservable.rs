//! Server-reconciled budget with reservations.
//!
//! The Wynncraft API reports how many calls are left in the current window on
//! every response. [`ReservableRateLimit`] keeps a local estimate of that
//! number between responses, overwrites it whenever a fresh value arrives, and
//! lets callers carve out a [`Reservation`] for a batch of follow-up requests.

use std::pin::pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;

use crate::error::NiaError;
use crate::rate_limit::{Budget, Limiter, MIN_WAIT, RateLimitFeedback, RequestGate, lock};

/// Mutable budget state, guarded by one lock.
#[derive(Debug)]
struct BudgetState {
    /// Calls the upstream will still accept in the current window
    remaining: u32,
    /// Calls promised to outstanding reservations
    reserved: u32,
    /// When the upstream last reported a remaining count
    last_update: Option<Instant>,
    /// When the upstream window is expected to roll over
    reset_deadline: Instant,
    /// Number of roll overs so far; reservations are only valid in theirs
    generation: u64,
}

impl BudgetState {
    /// Restore the full budget once the reset deadline has passed.
    ///
    /// Reservations hold calls of one window only, so they are released too.
    fn roll_over(&mut self, now: Instant, capacity: u32, window: Duration) {
        if now >= self.reset_deadline {
            self.remaining = capacity;
            self.reserved = 0;
            self.generation += 1;
            self.reset_deadline = now + window;
        }
    }

    fn free(&self) -> u32 {
        self.remaining.saturating_sub(self.reserved)
    }
}

/// A request budget reconciled against the upstream's own counter.
///
/// The server-reported remaining count is authoritative and replaces the local
/// estimate outright. Between responses every admitted request lowers the
/// estimate by one. If the reset deadline passes without a fresh reading, the
/// estimate is optimistically restored to `capacity` and every outstanding
/// reservation is released.
///
/// Waiters in [`acquire`](Self::acquire) are woken early when a reservation
/// gives calls back or the upstream reports a new count.
///
/// Use it behind an [`Arc`] so that [`Reservation`]s can borrow from it.
#[derive(Debug)]
pub struct ReservableRateLimit {
    name: String,
    capacity: u32,
    window: Duration,
    state: Mutex<BudgetState>,
    released: Notify,
}

impl ReservableRateLimit {
    /// Create a new limiter with a full budget.
    ///
    /// # Arguments
    ///
    /// * `name` - Name used in logs and health reports
    /// * `capacity` - Calls per upstream window
    /// * `window` - Window length, used until the upstream reports a reset time
    pub fn new(name: impl Into<String>, capacity: u32, window: Duration) -> Self {
        Self {
            name: name.into(),
            capacity,
            window,
            state: Mutex::new(BudgetState {
                remaining: capacity,
                reserved: 0,
                last_update: None,
                reset_deadline: Instant::now() + window,
                generation: 0,
            }),
            released: Notify::new(),
        }
    }

    /// Create a new limiter from a [`Budget`].
    pub fn from_budget(name: impl Into<String>, budget: Budget) -> Self {
        Self::new(name, budget.capacity, budget.window)
    }

    /// Run `f` on the budget state after applying any pending roll over.
    fn with_state<R>(&self, f: impl FnOnce(&mut BudgetState, Instant) -> R) -> R {
        let now = Instant::now();
        let mut state = lock(&self.state);
        state.roll_over(now, self.capacity, self.window);
        f(&mut state, now)
    }

    /// Replace the local estimate with the remaining count reported by the upstream.
    ///
    /// Last write wins. A reading that arrives after the reset deadline belongs
    /// to the next window: the pending roll over is applied first, so the
    /// deadline moves forward with it.
    pub fn update_remaining(&self, remaining: u32) {
        self.with_state(|state, now| {
            tracing::trace!(
                limiter = %self.name,
                estimate = state.remaining,
                reported = remaining,
                "reconciled remaining calls"
            );
            state.remaining = remaining;
            state.last_update = Some(now);
        });
        self.released.notify_waiters();
    }

    /// Set the reset deadline from an upstream "resets in" value.
    pub fn update_reset_after(&self, reset_after: Duration) {
        self.with_state(|state, now| {
            state.reset_deadline = now + reset_after;
        });
        self.released.notify_waiters();
    }

    /// Reserve `amount` calls for future requests.
    ///
    /// Fails with [`NiaError::InsufficientCapacity`] if fewer than `amount`
    /// calls are free. The returned [`Reservation`] gives back whatever it has
    /// not used when dropped.
    pub fn reserve(self: &Arc<Self>, amount: u32) -> Result<Reservation, NiaError> {
        let generation = self.with_state(|state, _| {
            let available = state.free();
            if amount > available {
                tracing::debug!(
                    limiter = %self.name,
                    requested = amount,
                    available,
                    "reservation refused"
                );
                return Err(NiaError::InsufficientCapacity {
                    requested: amount,
                    available,
                });
            }
            state.reserved += amount;
            tracing::debug!(limiter = %self.name, amount, "reservation granted");
            Ok(state.generation)
        })?;

        Ok(Reservation {
            limiter: Arc::clone(self),
            amount,
            outstanding: AtomicU32::new(amount),
            generation,
        })
    }

    /// Calls currently free for unreserved callers.
    ///
    /// Equal to `max(remaining - reserved, 0)`.
    pub fn calculate_remaining_calls(&self) -> u32 {
        self.with_state(|state, _| state.free())
    }

    /// The local estimate of calls left in the upstream window, reservations included.
    pub fn remaining_estimate(&self) -> u32 {
        self.with_state(|state, _| state.remaining)
    }

    /// Calls held by outstanding reservations.
    pub fn reserved(&self) -> u32 {
        self.with_state(|state, _| state.reserved)
    }

    /// When the upstream last reported a remaining count.
    pub fn last_update(&self) -> Option<Instant> {
        lock(&self.state).last_update
    }

    /// Time left until the upstream window resets.
    pub fn ratelimit_reset_time(&self) -> Duration {
        let now = Instant::now();
        lock(&self.state).reset_deadline.saturating_duration_since(now)
    }

    /// Try to take one unreserved call.
    ///
    /// Returns `Ok(())` if allowed, `Err(wait_time)` until the reset deadline otherwise.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        self.with_state(|state, now| {
            if state.free() > 0 {
                state.remaining -= 1;
                Ok(())
            } else {
                Err(state
                    .reset_deadline
                    .saturating_duration_since(now)
                    .max(MIN_WAIT))
            }
        })
    }

    /// Wait until an unreserved call is free, then take it.
    ///
    /// Sleeps until the reset deadline, or less if a reservation is released
    /// or the upstream reports a new count in the meantime.
    pub async fn acquire(&self) {
        loop {
            // Registered before the check so a release in between is not lost.
            let mut released = pin!(self.released.notified());
            released.as_mut().enable();

            match self.try_acquire() {
                Ok(()) => return,
                Err(wait_time) => {
                    tracing::debug!(
                        limiter = %self.name,
                        wait_ms = wait_time.as_millis() as u64,
                        "budget exhausted, waiting for reset"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(wait_time) => {}
                        _ = released => {}
                    }
                }
            }
        }
    }

    /// Apply feedback from a response.
    ///
    /// The remaining count goes first so that a reset value from the same
    /// response is not overridden by the late-reading roll over.
    pub fn apply_feedback(&self, feedback: &RateLimitFeedback) {
        if let Some(remaining) = feedback.remaining {
            self.update_remaining(remaining);
        }
        if let Some(reset_after) = feedback.reset_after {
            self.update_reset_after(reset_after);
        }
    }
}

impl Limiter for ReservableRateLimit {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn free_capacity(&self) -> u32 {
        self.calculate_remaining_calls()
    }
}

impl RequestGate for ReservableRateLimit {
    async fn admit(&self) -> Result<(), NiaError> {
        self.acquire().await;
        Ok(())
    }

    fn reconcile(&self, feedback: &RateLimitFeedback) {
        self.apply_feedback(feedback);
    }
}

/// Capacity borrowed from a [`ReservableRateLimit`] for a fixed number of requests.
///
/// Each [`acquire`](Reservation::acquire) consumes one reserved call without
/// waiting. Calls that were never used go back to the parent when the
/// reservation is dropped, on every exit path. A reservation only holds calls
/// of the window it was made in: once that window resets, its calls are
/// released and it is exhausted.
#[derive(Debug)]
pub struct Reservation {
    limiter: Arc<ReservableRateLimit>,
    amount: u32,
    /// Only changed under the parent's lock
    outstanding: AtomicU32,
    /// Window generation the calls were reserved in
    generation: u64,
}

impl Reservation {
    /// Consume one reserved call.
    ///
    /// Fails with [`NiaError::ReservationExhausted`] once all calls are used
    /// or the window they were reserved in has reset.
    pub fn acquire(&self) -> Result<(), NiaError> {
        self.limiter.with_state(|state, _| {
            if state.generation != self.generation {
                self.outstanding.store(0, Ordering::Relaxed);
            }
            let outstanding = self.outstanding.load(Ordering::Relaxed);
            if outstanding == 0 {
                return Err(NiaError::ReservationExhausted {
                    amount: self.amount,
                });
            }
            self.outstanding.store(outstanding - 1, Ordering::Relaxed);
            state.reserved = state.reserved.saturating_sub(1);
            state.remaining = state.remaining.saturating_sub(1);
            Ok(())
        })
    }

    /// Number of calls this reservation was granted.
    pub fn amount(&self) -> u32 {
        self.amount
    }

    /// Reserved calls not used yet, zero once the window has reset.
    pub fn outstanding(&self) -> u32 {
        self.limiter.with_state(|state, _| {
            if state.generation == self.generation {
                self.outstanding.load(Ordering::Relaxed)
            } else {
                0
            }
        })
    }

    /// The limiter this reservation borrows from.
    pub fn limiter(&self) -> &Arc<ReservableRateLimit> {
        &self.limiter
    }
}

impl RequestGate for Reservation {
    async fn admit(&self) -> Result<(), NiaError> {
        self.acquire()
    }

    fn reconcile(&self, feedback: &RateLimitFeedback) {
        self.limiter.apply_feedback(feedback);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let unused = self.limiter.with_state(|state, _| {
            let unused = self.outstanding.swap(0, Ordering::Relaxed);
            // Already released by the roll over.
            if state.generation != self.generation {
                return 0;
            }
            state.reserved = state.reserved.saturating_sub(unused);
            unused
        });

        if unused > 0 {
            tracing::debug!(
                limiter = %self.limiter.name,
                unused,
                "released unused reservation"
            );
            self.limiter.released.notify_waiters();
        }
    }
}
