//! Time source for expiry checks
//!
//! Expiries are unix timestamps in seconds.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Source of the current time in unix seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;

    /// True once `expiry` is at or before now
    fn is_expired(&self, expiry: i64) -> bool {
        expiry <= self.now()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Settable clock for tests and replays
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Expiry check against the wall clock
pub fn is_expired(expiry: i64) -> bool {
    SystemClock.is_expired(expiry)
}

/// `now + seconds` on the wall clock
pub fn calc_expiry(seconds: i64) -> i64 {
    SystemClock.now() + seconds
}
