//! Injectable wall-clock time.
//!
//! Renewal scheduling is a function of "now". Production code reads the
//! system clock; tests and simulations drive a [`ManualClock`] so delays can
//! be asserted exactly without waiting.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::fmt;
use tracing::trace;

/// Source of the current time
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current wall-clock time
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// Shared between several schedulers (via `Arc`) it gives every instance
/// the same simulated time.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `now`
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, now: DateTime<Utc>) {
        trace!(now = %now, "Manual clock set");
        *self.now.lock() = now;
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
        trace!(now = %*now, "Manual clock advanced");
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
