//! Time sources

use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;
use std::rc::Rc;

/// Wall-clock source used for timestamps and timer deadlines
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Instant `ms` milliseconds after `now`.
///
/// Saturates at the latest representable instant, so a deadline that cannot
/// be represented never falls due.
pub fn deadline_after(now: DateTime<Utc>, ms: u64) -> DateTime<Utc> {
    i64::try_from(ms)
        .ok()
        .and_then(Duration::try_milliseconds)
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock shared between the tracker and its driver.
///
/// Replay, FFI and tests move time forward explicitly; clones observe the
/// same instant.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.now.set(at);
    }

    pub fn advance_ms(&self, ms: i64) {
        let now = self.now.get();
        let next = Duration::try_milliseconds(ms)
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(if ms < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            });
        self.now.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}
