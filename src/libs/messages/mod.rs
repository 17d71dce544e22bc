//! User-facing text.
//!
//! All console output is described by [`Message`] variants and rendered by its
//! `Display` impl in [`display`]. The macros in [`macros`] decide whether a
//! message goes to the terminal or to `tracing`.

pub mod display;
pub mod macros;
pub mod types;

pub use types::Message;
