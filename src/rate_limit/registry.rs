//! Registry of every limiter in the process.

use std::ptr;
use std::sync::{Arc, Mutex, Weak};

use crate::rate_limit::{Limiter, lock};

/// Point-in-time state of one registered limiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimiterStatus {
    /// Limiter name.
    pub name: String,
    /// Maximum calls per window.
    pub capacity: u32,
    /// Calls free right now.
    pub free: u32,
}

/// Non-owning set of limiters, queried for aggregate health information.
///
/// The registry keeps [`Weak`] references: it never keeps a limiter alive and
/// skips limiters that have been dropped. Totals are read limiter by limiter
/// and are not a consistent snapshot, so they are not meant for admission
/// decisions.
#[derive(Debug, Default)]
pub struct RateLimitRegistry {
    entries: Mutex<Vec<Weak<dyn Limiter>>>,
}

impl RateLimitRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a limiter.
    ///
    /// Registering the same limiter twice is a no-op. Returns `true` if the
    /// limiter was newly added.
    pub fn register<L: Limiter + 'static>(&self, limiter: &Arc<L>) -> bool {
        let mut entries = lock(&self.entries);
        let target = Arc::as_ptr(limiter);
        if entries
            .iter()
            .any(|entry| ptr::addr_eq(entry.as_ptr(), target))
        {
            return false;
        }

        let weak: Weak<L> = Arc::downgrade(limiter);
        entries.push(weak);
        tracing::trace!(limiter = limiter.name(), "registered rate limiter");
        true
    }

    /// Sum of the free capacity of every live limiter.
    pub fn total_free_capacity(&self) -> u64 {
        self.live()
            .iter()
            .map(|limiter| u64::from(limiter.free_capacity()))
            .sum()
    }

    /// Status of every live limiter, in registration order.
    pub fn snapshot(&self) -> Vec<LimiterStatus> {
        self.live()
            .iter()
            .map(|limiter| LimiterStatus {
                name: limiter.name().to_string(),
                capacity: limiter.capacity(),
                free: limiter.free_capacity(),
            })
            .collect()
    }

    /// Number of live limiters.
    pub fn len(&self) -> usize {
        self.live().len()
    }

    /// Check if no live limiter is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upgrade the live entries, releasing the registry lock before any
    /// limiter lock is taken.
    fn live(&self) -> Vec<Arc<dyn Limiter>> {
        lock(&self.entries)
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}
