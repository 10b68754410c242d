//! A clock that only moves when told to.

use rendezvous_api::{Clock, Timestamp};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// 2024-01-01T00:00:00Z, so test timestamps are readable.
const START_MICROS: i64 = 1_704_067_200_000_000;

/// A [Clock] under test control. Starts at a fixed instant and only
/// advances through [ManualClock::advance] or [ManualClock::set].
#[derive(Debug)]
pub struct ManualClock(AtomicI64);

impl ManualClock {
    /// Construct a new ManualClock.
    ///
    /// This returns the concrete type so tests can keep a handle to
    /// advance it; it coerces to a `DynClock` with `.clone()`.
    pub fn create() -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(START_MICROS)))
    }

    /// Move the clock forward.
    pub fn advance(&self, by: std::time::Duration) {
        self.0.fetch_add(by.as_micros() as i64, Ordering::SeqCst);
    }

    /// Jump the clock to an exact instant.
    pub fn set(&self, at: Timestamp) {
        self.0.store(at.as_micros(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.0.load(Ordering::SeqCst))
    }
}
