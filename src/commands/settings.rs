//! Access to the engine settings table.
//!
//! Values are validated before they are written. A running watcher picks them
//! up on `r` in interactive mode or on its next start.

use crate::db::store::Store;
use crate::libs::config::{EngineConfig, ENGINE_SETTING_KEYS};
use crate::libs::messages::Message;
use crate::libs::view::View;
use crate::{msg_bail_anyhow, msg_print, msg_success};
use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show every setting, with defaults for keys never written
    List,
    /// Print one setting
    Get { key: String },
    /// Change one setting
    Set { key: String, value: String },
}

#[derive(Debug, Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    command: SettingsCommand,
}

pub async fn cmd(args: SettingsArgs) -> Result<()> {
    let store = Store::new()?;

    match args.command {
        SettingsCommand::List => {
            let stored = store.settings.all()?;
            let mut rows: Vec<(String, String)> = Vec::new();
            for key in ENGINE_SETTING_KEYS {
                let value = match stored.iter().find(|(k, _)| k == key) {
                    Some((_, value)) => value.clone(),
                    None => EngineConfig::default_value(key).unwrap_or_default(),
                };
                rows.push((key.to_string(), value));
            }
            // Keys written by other tools are shown as-is.
            rows.extend(stored.into_iter().filter(|(k, _)| !ENGINE_SETTING_KEYS.contains(&k.as_str())));
            View::settings(&rows)?;
        }
        SettingsCommand::Get { key } => {
            let Some(default) = EngineConfig::default_value(&key) else {
                msg_bail_anyhow!(Message::UnknownSetting(key));
            };
            let value = store.settings.get_setting(&key, &default)?;
            msg_print!(Message::SettingValue(key, value));
        }
        SettingsCommand::Set { key, value } => {
            EngineConfig::validate(&key, &value)?;
            store.settings.set_setting(&key, value.trim())?;
            msg_success!(Message::SettingUpdated(key, value.trim().to_string()));
        }
    }

    Ok(())
}
