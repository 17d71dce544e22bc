//! Key/value settings read by the tracking engine.

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;

const SELECT_SETTING: &str = "SELECT value FROM settings WHERE key = ?1";
const UPSERT_SETTING: &str = "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)";
const SELECT_ALL_SETTINGS: &str = "SELECT key, value FROM settings ORDER BY key";

#[derive(Clone)]
pub struct Settings {
    conn: Arc<Mutex<Connection>>,
}

impl Settings {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Stored value of `key`, or `default` when unset.
    pub fn get_setting(&self, key: &str, default: &str) -> Result<String> {
        let conn = self.conn.lock();
        let value: Option<String> = conn.query_row(SELECT_SETTING, params![key], |row| row.get(0)).optional()?;
        Ok(value.unwrap_or_else(|| default.to_string()))
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(UPSERT_SETTING, params![key, value])?;
        Ok(())
    }

    pub fn all(&self) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_ALL_SETTINGS)?;
        let settings = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(settings)
    }
}
