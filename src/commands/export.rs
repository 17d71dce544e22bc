//! Writes the activity of one day to `activity_<date>.<ext>`.

use crate::commands::parse_date;
use crate::db::store::Store;
use crate::libs::clock::SystemClock;
use crate::libs::config::Config;
use crate::libs::data_storage::{DataStorage, EXPORTS_DIR};
use crate::libs::export::{DayExporter, ExportFormat, ReportExporter};
use crate::libs::messages::Message;
use crate::{msg_info, msg_success};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(short, long, default_value = "today")]
    date: String,

    #[arg(short, long, value_enum, default_value = "text")]
    format: ExportFormat,

    /// Target directory. Defaults to `export_dir` from the config, then the data directory
    #[arg(short, long)]
    output: Option<PathBuf>,
}

pub async fn cmd(args: ExportArgs) -> Result<()> {
    let date = parse_date(&args.date)?;
    let storage = DataStorage::new();

    let dir = match args.output {
        Some(dir) => dir,
        None => match Config::read_or_default().tracker().export_dir {
            Some(dir) => dir,
            None => storage.get_dir(EXPORTS_DIR)?,
        },
    };

    let exporter = ReportExporter::new(Store::in_storage(&storage)?, dir, args.format, Arc::new(SystemClock));
    match exporter.export_day(date)? {
        Some(path) => msg_success!(Message::ExportWritten(path.display().to_string())),
        None => msg_info!(Message::NoActivityForDate(date.format("%Y-%m-%d").to_string())),
    }

    Ok(())
}
