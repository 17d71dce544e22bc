//! Activity block persistence.
//!
//! The engine is the only writer of this table during normal operation. Every
//! method locks the shared connection for the duration of its statement(s), so
//! each call is atomic with respect to other callers holding the same store.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use timereporter::db::store::Store;
//! use chrono::Local;
//!
//! let store = Store::new()?;
//! let now = Local::now().naive_local();
//! let id = store.blocks.create_block("code.exe", "main.rs", now)?;
//! store.blocks.update_last_block(id, 5, now + chrono::TimeDelta::minutes(5))?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::libs::block::{block_duration, format_timestamp, ActivityBlock};
use crate::libs::messages::Message;
use crate::msg_bail_anyhow;
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use std::sync::Arc;

const SELECT_COLUMNS: &str = "SELECT id, app_name, window_title, start_time, end_time, duration_minutes FROM activity_blocks";

const INSERT_BLOCK: &str =
    "INSERT INTO activity_blocks (app_name, window_title, start_time, end_time, duration_minutes) VALUES (?1, ?2, ?3, ?3, 1)";

const UPDATE_BLOCK: &str = "UPDATE activity_blocks SET end_time = ?1, duration_minutes = ?2 WHERE id = ?3";

const DELETE_BLOCK: &str = "DELETE FROM activity_blocks WHERE id = ?1";

const DELETE_OLDER_THAN: &str = "DELETE FROM activity_blocks WHERE start_time < ?1";

const SELECT_USAGE_BY_APP: &str = "SELECT ab.app_name, COALESCE(ac.category, 'Uncategorized') AS category, SUM(ab.duration_minutes) AS total
    FROM activity_blocks ab
    LEFT JOIN app_categories ac ON ab.app_name = ac.app_name
    WHERE date(ab.start_time) BETWEEN date(?1) AND date(?2)
    GROUP BY ab.app_name
    ORDER BY total DESC, ab.app_name ASC";

const SELECT_USAGE_BY_CATEGORY: &str = "SELECT COALESCE(ac.category, 'Uncategorized') AS category, SUM(ab.duration_minutes) AS total
    FROM activity_blocks ab
    LEFT JOIN app_categories ac ON ab.app_name = ac.app_name
    WHERE date(ab.start_time) BETWEEN date(?1) AND date(?2)
    GROUP BY category
    ORDER BY total DESC, category ASC";

const SELECT_USAGE_BY_DAY: &str = "SELECT date(start_time) AS day, SUM(duration_minutes) AS total
    FROM activity_blocks
    WHERE date(start_time) BETWEEN date(?1) AND date(?2)
    GROUP BY day
    ORDER BY day ASC";

/// Total minutes spent in one application over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppUsage {
    pub app_name: String,
    pub category: String,
    pub total_minutes: i64,
}

/// Total minutes attributed to one category over a date range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryUsage {
    pub category: String,
    pub total_minutes: i64,
}

/// Total tracked minutes for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayUsage {
    pub date: NaiveDate,
    pub total_minutes: i64,
}

#[derive(Clone)]
pub struct Blocks {
    conn: Arc<Mutex<Connection>>,
}

fn block_from_row(row: &Row<'_>) -> rusqlite::Result<ActivityBlock> {
    Ok(ActivityBlock {
        id: row.get(0)?,
        app_name: row.get(1)?,
        window_title: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        start_time: row.get(3)?,
        end_time: row.get(4)?,
        duration_minutes: row.get(5)?,
    })
}

fn date_param(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

impl Blocks {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// The highest-id block, which is the open one while tracking runs.
    pub fn get_last_block(&self) -> Result<Option<ActivityBlock>> {
        let conn = self.conn.lock();
        let block = conn
            .query_row(&format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT 1"), [], block_from_row)
            .optional()?;
        Ok(block)
    }

    pub fn get_block(&self, id: i64) -> Result<Option<ActivityBlock>> {
        let conn = self.conn.lock();
        let block = conn
            .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), params![id], block_from_row)
            .optional()?;
        Ok(block)
    }

    /// Opens a new block with `end_time == start_time` and a duration of one minute.
    pub fn create_block(&self, app_name: &str, window_title: &str, start_time: NaiveDateTime) -> Result<i64> {
        let conn = self.conn.lock();
        conn.execute(INSERT_BLOCK, params![app_name, window_title, format_timestamp(start_time)])?;
        Ok(conn.last_insert_rowid())
    }

    /// Rewrites the end and duration of an existing block in place.
    ///
    /// Fails if no block with `id` exists; this never inserts a row.
    pub fn update_last_block(&self, id: i64, duration_minutes: i64, end_time: NaiveDateTime) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(UPDATE_BLOCK, params![format_timestamp(end_time), duration_minutes.max(1), id])?;
        if updated == 0 {
            msg_bail_anyhow!(Message::BlockNotFound(id));
        }
        Ok(())
    }

    /// Most recent blocks first.
    pub fn get_recent_blocks(&self, limit: usize) -> Result<Vec<ActivityBlock>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1"))?;
        let blocks = stmt
            .query_map(params![limit as i64], block_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    /// Blocks that started on `date`, in chronological order.
    pub fn get_blocks_for_date(&self, date: NaiveDate) -> Result<Vec<ActivityBlock>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE date(start_time) = date(?1) ORDER BY start_time ASC, id ASC"))?;
        let blocks = stmt
            .query_map(params![date_param(date)], block_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(blocks)
    }

    /// Folds the most recent block into the one before it.
    ///
    /// The earlier block keeps its id and start, takes the later block's end, and
    /// has its duration recomputed; the later block is deleted. Returns `false`
    /// when fewer than two blocks exist.
    pub fn merge_last_two_blocks(&self) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let (latest, previous) = {
            let mut stmt = tx.prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT 2"))?;
            let blocks = stmt.query_map([], block_from_row)?.collect::<Result<Vec<_>, _>>()?;
            match blocks.as_slice() {
                [latest, previous] => (latest.clone(), previous.clone()),
                _ => return Ok(false),
            }
        };

        let duration = block_duration(previous.start_time, latest.end_time);
        tx.execute(UPDATE_BLOCK, params![format_timestamp(latest.end_time), duration, previous.id])?;
        tx.execute(DELETE_BLOCK, params![latest.id])?;
        tx.commit()?;

        Ok(true)
    }

    /// Retention cleanup: deletes blocks that started before `cutoff`.
    pub fn delete_older_than(&self, cutoff: NaiveDateTime) -> Result<usize> {
        let conn = self.conn.lock();
        let deleted = conn.execute(DELETE_OLDER_THAN, params![format_timestamp(cutoff)])?;
        Ok(deleted)
    }

    pub fn usage_by_app(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<AppUsage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_USAGE_BY_APP)?;
        let usage = stmt
            .query_map(params![date_param(from), date_param(to)], |row| {
                Ok(AppUsage {
                    app_name: row.get(0)?,
                    category: row.get(1)?,
                    total_minutes: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(usage)
    }

    pub fn usage_by_category(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<CategoryUsage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_USAGE_BY_CATEGORY)?;
        let usage = stmt
            .query_map(params![date_param(from), date_param(to)], |row| {
                Ok(CategoryUsage {
                    category: row.get(0)?,
                    total_minutes: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(usage)
    }

    pub fn usage_by_day(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<DayUsage>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_USAGE_BY_DAY)?;
        let usage = stmt
            .query_map(params![date_param(from), date_param(to)], |row| {
                Ok(DayUsage {
                    date: row.get(0)?,
                    total_minutes: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(usage)
    }
}
