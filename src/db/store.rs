//! The activity store: one SQLite connection shared by the block, category and
//! settings tables.
//!
//! Cloning a [`Store`] is cheap and every clone talks to the same connection, so
//! the engine, the heartbeat task and CLI handlers can each hold one.

use crate::db::blocks::Blocks;
use crate::db::categories::Categories;
use crate::db::db::{Db, DB_FILE_NAME};
use crate::db::settings::Settings;
use crate::libs::data_storage::DataStorage;
use anyhow::Result;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

#[derive(Clone)]
pub struct Store {
    pub blocks: Blocks,
    pub categories: Categories,
    pub settings: Settings,
}

impl Store {
    /// Opens the store in the per-user data directory.
    pub fn new() -> Result<Self> {
        Self::in_storage(&DataStorage::new())
    }

    pub fn in_storage(storage: &DataStorage) -> Result<Self> {
        let path = storage.get_path(DB_FILE_NAME)?;
        Self::open(&path)
    }

    /// Opens (creating and migrating if needed) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Db::open(path)?;
        let conn = Arc::new(Mutex::new(db.conn));

        Ok(Self {
            blocks: Blocks::new(conn.clone()),
            categories: Categories::new(conn.clone()),
            settings: Settings::new(conn),
        })
    }
}
