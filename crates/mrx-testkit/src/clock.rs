use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use mrx_allocator::Clock;

/// A clock that moves only when told to.
///
/// Expiry tests advance it past a TTL instead of sleeping, so they stay
/// instant and deterministic.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at a fixed, arbitrary instant.
    pub fn new() -> Self {
        Self::starting_at(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap())
    }

    pub fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("clock lock");
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().expect("clock lock");
        *now = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}
