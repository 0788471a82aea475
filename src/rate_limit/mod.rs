//! Rate limiting for the Wynncraft and Mojang APIs.
//!
//! Every upstream host hands out a small request budget that is shared by all
//! subsystems of the bot (player lookups, guild lookups, username resolution,
//! background trackers). This module provides the primitives that enforce and
//! reserve those budgets.
//!
//! ## Limiter Kinds
//!
//! - [`RateLimit`]: fixed capacity over a sliding window, for hosts that give no
//!   feedback about the remaining budget (Mojang)
//! - [`ReservableRateLimit`]: budget reconciled against the server-reported
//!   remaining count, with [`Reservation`]s for multi-step operations (Wynncraft)
//! - [`RateLimitRegistry`]: non-owning registry for aggregate health queries
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use niabot_api_client::rate_limit::{RateLimitRegistry, ReservableRateLimit};
//!
//! # fn main() -> Result<(), niabot_api_client::NiaError> {
//! let registry = RateLimitRegistry::new();
//! let limiter = Arc::new(ReservableRateLimit::new("wynncraft", 120, Duration::from_secs(60)));
//! registry.register(&limiter);
//!
//! // Guarantee capacity for a batch of three requests.
//! let reservation = limiter.reserve(3)?;
//! assert_eq!(limiter.calculate_remaining_calls(), 117);
//!
//! reservation.acquire()?;
//! drop(reservation);
//! assert_eq!(registry.total_free_capacity(), 119);
//! # Ok(())
//! # }
//! ```

mod headers;
mod registry;
mod reservable;
mod window;

pub use headers::RateLimitFeedback;
pub use registry::{LimiterStatus, RateLimitRegistry};
pub use reservable::{Reservation, ReservableRateLimit};
pub use window::RateLimit;

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use serde_with::{DurationSeconds, serde_as};

use crate::error::NiaError;

/// A limiter whose free capacity can be inspected.
///
/// This is the object-safe view the [`RateLimitRegistry`] keeps of every
/// limiter it knows about.
pub trait Limiter: Send + Sync + fmt::Debug {
    /// Human readable name, used in logs and health reports.
    fn name(&self) -> &str;

    /// Maximum number of calls per window.
    fn capacity(&self) -> u32;

    /// Calls that an unreserved caller could make right now.
    ///
    /// This is a point-in-time estimate, concurrent callers may change it
    /// immediately after it is returned.
    fn free_capacity(&self) -> u32;
}

/// Admission control placed in front of exactly one upstream request.
///
/// Implemented by [`RateLimit`], [`ReservableRateLimit`] and [`Reservation`]
/// so that a session can run the same acquire/send/reconcile cycle with any of
/// them.
pub trait RequestGate: Send + Sync {
    /// Wait until one request may be sent and account for it.
    fn admit(&self) -> impl Future<Output = Result<(), NiaError>> + Send;

    /// Feed rate-limit information from a response back into the gate.
    fn reconcile(&self, _feedback: &RateLimitFeedback) {}
}

/// A request budget: `capacity` calls per `window`.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Budget {
    /// Maximum calls per window.
    pub capacity: u32,
    /// Window length, in whole seconds when deserialized.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub window: Duration,
}

impl Budget {
    /// Create a new budget.
    pub const fn new(capacity: u32, window: Duration) -> Self {
        Self { capacity, window }
    }

    /// `capacity` calls per minute.
    pub const fn per_minute(capacity: u32) -> Self {
        Self::new(capacity, Duration::from_secs(60))
    }
}

/// Rate limiter configuration.
///
/// The defaults match the published limits of each upstream host.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Whether to enable rate limiting.
    ///
    /// When disabled requests are sent without waiting, but responses are
    /// still used to reconcile the budgets.
    pub enabled: bool,
    /// Single username lookups on api.mojang.com.
    pub mojang_profiles: Budget,
    /// Bulk username lookups on api.mojang.com.
    pub mojang_bulk: Budget,
    /// Profile lookups on sessionserver.mojang.com.
    pub sessionserver: Budget,
    /// Every request against the Wynncraft v3 API.
    pub wynncraft: Budget,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mojang_profiles: Budget::per_minute(limits::mojang::PROFILES_PER_MINUTE),
            mojang_bulk: Budget::per_minute(limits::mojang::BULK_PER_MINUTE),
            sessionserver: Budget::per_minute(limits::mojang::SESSIONSERVER_PER_MINUTE),
            wynncraft: Budget::per_minute(limits::wynncraft::REQUESTS_PER_MINUTE),
        }
    }
}

/// Rate limit constants by upstream host.
pub mod limits {
    /// Mojang limits.
    pub mod mojang {
        /// Single username lookups per minute.
        pub const PROFILES_PER_MINUTE: u32 = 60;
        /// Bulk username lookups per minute.
        pub const BULK_PER_MINUTE: u32 = 20;
        /// Maximum usernames in one bulk lookup.
        pub const MAX_BULK_USERNAMES: usize = 10;
        /// Session server profile lookups per minute.
        pub const SESSIONSERVER_PER_MINUTE: u32 = 200;
    }

    /// Wynncraft limits.
    pub mod wynncraft {
        /// Requests per minute against the v3 API.
        pub const REQUESTS_PER_MINUTE: u32 = 120;
    }
}

/// Smallest sleep used while waiting for capacity.
///
/// Keeps a zero-length window from turning the wait loop into a busy loop.
const MIN_WAIT: Duration = Duration::from_millis(1);

/// Lock a limiter's state, recovering it if a holder panicked.
///
/// Counter updates are single assignments, so a poisoned guard still holds
/// consistent state.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
