//! Category list and app → category mappings.
//!
//! Apps without a mapping belong to [`UNCATEGORIZED`]. Deleting a category moves
//! its apps back to [`UNCATEGORIZED`] instead of leaving dangling mappings.

use crate::libs::messages::Message;
use crate::msg_bail_anyhow;
use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const UNCATEGORIZED: &str = "Uncategorized";

const SELECT_APP_CATEGORY: &str = "SELECT category FROM app_categories WHERE app_name = ?1";
const UPSERT_APP_CATEGORY: &str = "INSERT OR REPLACE INTO app_categories (app_name, category) VALUES (?1, ?2)";
const SELECT_ALL_APP_CATEGORIES: &str = "SELECT app_name, category FROM app_categories ORDER BY app_name";
const SELECT_CATEGORIES: &str = "SELECT name FROM categories ORDER BY id";
const INSERT_CATEGORY: &str = "INSERT OR IGNORE INTO categories (name) VALUES (?1)";
const DELETE_CATEGORY: &str = "DELETE FROM categories WHERE name = ?1";
const REASSIGN_APPS: &str = "UPDATE app_categories SET category = ?1 WHERE category = ?2";

#[derive(Clone)]
pub struct Categories {
    conn: Arc<Mutex<Connection>>,
}

impl Categories {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Category of `app_name`, or `"Uncategorized"` when it has no mapping.
    pub fn get_app_category(&self, app_name: &str) -> Result<String> {
        let conn = self.conn.lock();
        let category: Option<String> = conn
            .query_row(SELECT_APP_CATEGORY, params![app_name], |row| row.get(0))
            .optional()?;
        Ok(category.unwrap_or_else(|| UNCATEGORIZED.to_string()))
    }

    /// Maps `app_name` to `category`, registering the category if it is new.
    pub fn set_app_category(&self, app_name: &str, category: &str) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute(INSERT_CATEGORY, params![category])?;
        tx.execute(UPSERT_APP_CATEGORY, params![app_name, category])?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_all_app_categories(&self) -> Result<BTreeMap<String, String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_ALL_APP_CATEGORIES)?;
        let mappings = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(mappings)
    }

    pub fn list(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(SELECT_CATEGORIES)?;
        let names = stmt.query_map([], |row| row.get(0))?.collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    /// Adds a category. Returns `false` if it already existed.
    pub fn add(&self, name: &str) -> Result<bool> {
        let name = name.trim();
        if name.is_empty() {
            msg_bail_anyhow!(Message::CategoryNameEmpty);
        }
        let conn = self.conn.lock();
        Ok(conn.execute(INSERT_CATEGORY, params![name])? > 0)
    }

    /// Deletes a category and reassigns its apps to `"Uncategorized"`.
    ///
    /// Returns the number of apps that were reassigned.
    pub fn delete(&self, name: &str) -> Result<usize> {
        if name == UNCATEGORIZED {
            msg_bail_anyhow!(Message::CategoryProtected(name.to_string()));
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(DELETE_CATEGORY, params![name])?;
        if removed == 0 {
            msg_bail_anyhow!(Message::CategoryNotFound(name.to_string()));
        }
        let reassigned = tx.execute(REASSIGN_APPS, params![UNCATEGORIZED, name])?;
        tx.commit()?;

        Ok(reassigned)
    }
}
