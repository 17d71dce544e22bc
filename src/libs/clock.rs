//! Wall-clock source for the tracking engine.
//!
//! The engine never calls `Local::now()` directly. Production code uses
//! [`SystemClock`]; tests drive a [`ManualClock`] so idle periods and midnight
//! rollovers can be reproduced to the second.

use crate::libs::block::truncate_to_seconds;
use chrono::{Local, NaiveDateTime, TimeDelta};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    /// Current local time with whole-second precision.
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        truncate_to_seconds(Local::now().naive_local())
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(truncate_to_seconds(start)),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = truncate_to_seconds(now);
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn manual_clock_moves_only_when_advanced() {
        let start = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(TimeDelta::seconds(90));
        assert_eq!(clock.now(), start + TimeDelta::seconds(90));
    }

    #[test]
    fn system_clock_has_no_subsecond_part() {
        use chrono::Timelike;
        assert_eq!(SystemClock.now().nanosecond(), 0);
    }
}
