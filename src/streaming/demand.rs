//! Outstanding demand shared between the requesting side and the worker.

use super::error::{StreamError, StreamResult};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counter of chunks requested but not yet delivered.
///
/// Increments saturate at `u64::MAX`, which reactive consumers use to mean
/// "unbounded". The counter never goes below zero.
#[derive(Debug, Default)]
pub struct Demand {
    outstanding: AtomicU64,
}

impl Demand {
    /// Create a counter with no outstanding demand.
    pub const fn new() -> Self {
        Self {
            outstanding: AtomicU64::new(0),
        }
    }

    /// Add `n` to the outstanding demand and return the previous value.
    ///
    /// Non-positive `n` is rejected without touching the counter.
    pub fn increase(&self, n: i64) -> StreamResult<u64> {
        if n <= 0 {
            return Err(StreamError::demand_violation(n));
        }
        let n = n as u64;
        let previous = self
            .outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(n))
            });
        // The closure always returns Some.
        Ok(previous.unwrap_or_else(|current| current))
    }

    /// Consume one unit of demand, returning `false` if none was outstanding.
    pub fn try_take_one(&self) -> bool {
        self.outstanding
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_sub(1)
            })
            .is_ok()
    }

    /// Current outstanding demand.
    pub fn outstanding(&self) -> u64 {
        self.outstanding.load(Ordering::Acquire)
    }

    /// Check if any demand is outstanding.
    pub fn has_demand(&self) -> bool {
        self.outstanding() > 0
    }
}
