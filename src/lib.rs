//! # timereporter
//!
//! Records which application has the foreground, in minute-granular activity
//! blocks, and turns them into per-day reports.
//!
//! - **Tracking engine**: opens, extends and closes blocks from window events
//!   and a periodic heartbeat ([`libs::engine`]).
//! - **Idle detection**: time away from the keyboard is flagged and left for the
//!   user to classify as a break or as work.
//! - **Manual breaks** and **midnight rollover** without double counting.
//! - **Categories** for apps, with usage reports by app, category or day.
//! - **Export** of a day as a text timeline, CSV or JSON.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use timereporter::commands::Cli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Cli::menu().await
//! }
//! ```

pub mod commands;
pub mod db;
pub mod libs;
