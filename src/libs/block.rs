//! Activity blocks and the minute arithmetic shared by the store and the engine.
//!
//! A block's `duration_minutes` is never accumulated. It is always recomputed from
//! the block's absolute `start_time` and `end_time`, so extending the same block
//! twice with the same end time is a no-op and a missed tick cannot cause drift.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::Serialize;

/// Storage and display format for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `app_name` of blocks recorded while a manual break is active.
pub const BREAK_APP_NAME: &str = "Break";

/// `window_title` of manual break blocks.
pub const BREAK_WINDOW_TITLE: &str = "Manual Break Session";

/// A contiguous span of time attributed to one foreground application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityBlock {
    pub id: i64,
    pub app_name: String,
    pub window_title: String,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub duration_minutes: i64,
}

impl ActivityBlock {
    pub fn is_break(&self) -> bool {
        self.app_name == BREAK_APP_NAME
    }

    /// Duration this block would have if it ended at `end_time`.
    pub fn duration_until(&self, end_time: NaiveDateTime) -> i64 {
        block_duration(self.start_time, end_time)
    }
}

/// Rounds an elapsed time to whole minutes, half a minute rounding up.
///
/// Negative spans count as zero.
pub fn round_minutes(elapsed: TimeDelta) -> i64 {
    let seconds = elapsed.num_seconds().max(0);
    (seconds + 30) / 60
}

/// `max(1, round_minutes(end - start))`, the persisted duration of a block.
pub fn block_duration(start: NaiveDateTime, end: NaiveDateTime) -> i64 {
    round_minutes(end - start).max(1)
}

/// Last representable second of `date` (`23:59:59`).
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    start_of_day(date) + TimeDelta::seconds(86_399)
}

/// `00:00:00` of `date`.
pub fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// Drops sub-second precision; the store keeps whole seconds only.
pub fn truncate_to_seconds(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}

pub fn format_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}
