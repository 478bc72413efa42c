//! Injectable time source.
//!
//! Stores stamp `createdAt`/`updatedAt`/`finalizedAt` and the verifier
//! stamps `verifiedAt` through a [`Clock`], so tests can pin time.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

use crate::temporal::Timestamp;

/// A source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_utc(Utc::now())
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            millis: AtomicI64::new(start.as_datetime().timestamp_millis()),
        }
    }

    /// Move the clock forward by `millis` milliseconds.
    pub fn advance(&self, millis: i64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, at: Timestamp) {
        self.millis
            .store(at.as_datetime().timestamp_millis(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let millis = self.millis.load(Ordering::SeqCst);
        let dt = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default();
        Timestamp::from_utc(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances() {
        let start = Timestamp::parse("2026-01-15T12:00:00Z", "t").unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
        clock.advance(1_500);
        assert_eq!(clock.now().to_rfc3339(), "2026-01-15T12:00:01.500Z");
    }

    #[test]
    fn system_clock_is_millisecond_precision() {
        let now = SystemClock.now();
        assert_eq!(now.as_datetime().timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
