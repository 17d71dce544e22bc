//! Aggregated usage over a date range.

use crate::commands::parse_date;
use crate::db::store::Store;
use crate::libs::messages::Message;
use crate::libs::view::View;
use crate::{msg_bail_anyhow, msg_info, msg_print};
use anyhow::Result;
use clap::{Args, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GroupBy {
    App,
    Category,
    Day,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// First day of the range: `today`, `yesterday` or YYYY-MM-DD
    #[arg(short, long, default_value = "today")]
    from: String,

    /// Last day of the range, inclusive. Defaults to `--from`
    #[arg(short, long)]
    to: Option<String>,

    #[arg(short, long, value_enum, default_value = "category")]
    by: GroupBy,
}

pub async fn cmd(args: ReportArgs) -> Result<()> {
    let from = parse_date(&args.from)?;
    let to = match &args.to {
        Some(to) => parse_date(to)?,
        None => from,
    };
    if to < from {
        msg_bail_anyhow!(Message::InvalidDateRange(from.to_string(), to.to_string()));
    }

    let store = Store::new()?;
    let range = if from == to {
        from.format("%Y-%m-%d").to_string()
    } else {
        format!("{} .. {}", from.format("%Y-%m-%d"), to.format("%Y-%m-%d"))
    };

    match args.by {
        GroupBy::App => {
            let usage = store.blocks.usage_by_app(from, to)?;
            if usage.is_empty() {
                msg_info!(Message::NoUsageData(range));
                return Ok(());
            }
            msg_print!(Message::ReportTitle("app".to_string(), range), true);
            View::usage_by_app(&usage)?;
        }
        GroupBy::Category => {
            let usage = store.blocks.usage_by_category(from, to)?;
            if usage.is_empty() {
                msg_info!(Message::NoUsageData(range));
                return Ok(());
            }
            msg_print!(Message::ReportTitle("category".to_string(), range), true);
            View::usage_by_category(&usage)?;
        }
        GroupBy::Day => {
            let usage = store.blocks.usage_by_day(from, to)?;
            if usage.is_empty() {
                msg_info!(Message::NoUsageData(range));
                return Ok(());
            }
            msg_print!(Message::ReportTitle("day".to_string(), range), true);
            View::usage_by_day(&usage)?;
        }
    }

    Ok(())
}
