use crate::db::store::Store;
use crate::libs::block::start_of_day;
use crate::libs::config::EngineConfig;
use crate::libs::messages::Message;
use crate::{msg_info, msg_success};
use anyhow::Result;
use chrono::{Local, TimeDelta};
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};

#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Retention in days. Defaults to the `db_cleanup_days` setting
    #[arg(short, long)]
    days: Option<u32>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

pub async fn cmd(args: CleanupArgs) -> Result<()> {
    let store = Store::new()?;
    let days = match args.days {
        Some(days) => days,
        None => EngineConfig::load(&store.settings)?.db_cleanup_days,
    };

    let cutoff = start_of_day(Local::now().date_naive()) - TimeDelta::days(i64::from(days));

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(Message::ConfirmCleanup(cutoff.format("%Y-%m-%d").to_string()).to_string())
            .default(false)
            .interact()?;
        if !confirmed {
            msg_info!(Message::OperationCancelled);
            return Ok(());
        }
    }

    let deleted = store.blocks.delete_older_than(cutoff)?;
    msg_success!(Message::CleanupCompleted(deleted));
    Ok(())
}
