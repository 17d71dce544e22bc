/// Activity block rows: create, extend, merge, cleanup and usage aggregation.
pub mod blocks;

/// Category list and app to category assignments.
pub mod categories;

/// Connection opening and migration on first use.
pub mod db;

/// Versioned schema changes and seed data.
pub mod migrations;

/// Key/value settings read by the engine.
pub mod settings;

/// The three stores above over one shared connection.
pub mod store;
