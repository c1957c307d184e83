//! Time sources for version stamping.
//!
//! Stamps read the clock once per call. [`MonotonicClock`] guarantees that a
//! stamp never compares earlier than one it handed out before, even if the
//! wall clock steps backwards between calls. [`ProcessClock`] shares one
//! such clock across the whole process and backs the default stamping paths.

use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// A source of timestamps.
pub trait Clock {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that always returns the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Wall clock that never goes backwards.
///
/// If the wall clock has not advanced past the last returned instant, the
/// last instant is returned again.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    /// Create a new monotonic clock.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    fn advance(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        // A poisoned lock still holds a valid instant.
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let next = match *last {
            Some(prev) if prev >= wall => prev,
            _ => wall,
        };
        *last = Some(next);
        next
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        self.advance(Utc::now())
    }
}

static PROCESS_CLOCK: MonotonicClock = MonotonicClock::new();

/// The process-wide [`MonotonicClock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessClock;

impl Clock for ProcessClock {
    fn now(&self) -> DateTime<Utc> {
        PROCESS_CLOCK.now()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}
