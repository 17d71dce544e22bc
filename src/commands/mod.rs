//! Command-line interface.
//!
//! Each subcommand lives in its own module with an `Args` struct and an async
//! `cmd` entry point. [`Cli::menu`] parses the arguments and dispatches.

pub mod blocks;
pub mod category;
pub mod cleanup;
pub mod export;
pub mod report;
pub mod settings;
pub mod watch;

use crate::libs::messages::Message;
use crate::msg_error_anyhow;
use anyhow::Result;
use chrono::{Local, NaiveDate, TimeDelta};
use clap::{Parser, Subcommand};

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Track the foreground application until interrupted")]
    Watch(watch::WatchArgs),
    #[command(about = "Show usage aggregated by app, category or day")]
    Report(report::ReportArgs),
    #[command(about = "Show the most recent activity blocks")]
    Blocks(blocks::BlocksArgs),
    #[command(about = "Write the activity report of a day to a file")]
    Export(export::ExportArgs),
    #[command(about = "Manage categories and app assignments", arg_required_else_help = true)]
    Category(category::CategoryArgs),
    #[command(about = "Read and change tracker settings", arg_required_else_help = true)]
    Settings(settings::SettingsArgs),
    #[command(about = "Delete activity blocks past the retention period")]
    Cleanup(cleanup::CleanupArgs),
}

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help(true))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub async fn menu() -> Result<()> {
        let cli = Self::parse();
        match cli.command {
            Commands::Watch(args) => watch::cmd(args).await,
            Commands::Report(args) => report::cmd(args).await,
            Commands::Blocks(args) => blocks::cmd(args).await,
            Commands::Export(args) => export::cmd(args).await,
            Commands::Category(args) => category::cmd(args).await,
            Commands::Settings(args) => settings::cmd(args).await,
            Commands::Cleanup(args) => cleanup::cmd(args).await,
        }
    }
}

/// Parses `today`, `yesterday` or a `YYYY-MM-DD` date.
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let today = Local::now().date_naive();
    match input.trim().to_lowercase().as_str() {
        "today" => Ok(today),
        "yesterday" => Ok(today - TimeDelta::days(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").map_err(|_| msg_error_anyhow!(Message::InvalidDate(input.to_string()))),
    }
}
