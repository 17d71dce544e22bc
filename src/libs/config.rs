//! Configuration.
//!
//! Two layers feed the tracker:
//!
//! - [`Config`]: a `config.json` file in the data directory holding process-level
//!   options ([`TrackerConfig`]). A missing file means defaults.
//! - [`EngineConfig`]: an immutable snapshot of the engine settings stored in the
//!   `settings` table. The engine swaps in a fresh snapshot on reload; values that
//!   fail to parse fall back to their defaults with a warning.

use super::data_storage::DataStorage;
use crate::db::settings::Settings;
use crate::libs::messages::Message;
use crate::{msg_bail_anyhow, msg_warning};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE_NAME: &str = "config.json";

pub const IDLE_THRESHOLD_KEY: &str = "idle_threshold";
pub const MERGE_SHORT_BROWSING_KEY: &str = "merge_short_browsing";
pub const DB_CLEANUP_DAYS_KEY: &str = "db_cleanup_days";
pub const IDLE_DECISION_TIMEOUT_KEY: &str = "idle_decision_timeout";

/// Every settings key the engine reads.
pub const ENGINE_SETTING_KEYS: [&str; 4] = [
    IDLE_THRESHOLD_KEY,
    MERGE_SHORT_BROWSING_KEY,
    DB_CLEANUP_DAYS_KEY,
    IDLE_DECISION_TIMEOUT_KEY,
];

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TrackerConfig {
    /// Seconds between heartbeat ticks.
    pub heartbeat_interval: u64,
    /// Write today's text report when tracking stops.
    pub export_on_exit: bool,
    /// Where reports are written. Defaults to `<data dir>/exports`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            heartbeat_interval: 10,
            export_on_exit: true,
            export_dir: None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracker: Option<TrackerConfig>,
}

impl Config {
    /// Reads `config.json` from the per-user data directory.
    pub fn read() -> Result<Config> {
        let path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        Self::read_from(&path)
    }

    pub fn read_from(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let config_str = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_str)?;
        Ok(config)
    }

    /// Like [`Config::read`], but a malformed file yields defaults plus a warning.
    pub fn read_or_default() -> Config {
        match Self::read() {
            Ok(config) => config,
            Err(e) => {
                msg_warning!(Message::ConfigParseFailed(e.to_string()));
                Config::default()
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = DataStorage::new().get_path(CONFIG_FILE_NAME)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(&file, &self)?;
        Ok(())
    }

    pub fn tracker(&self) -> TrackerConfig {
        self.tracker.clone().unwrap_or_default()
    }
}

/// Engine settings as read from the `settings` table at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Seconds without input before the user counts as idle.
    pub idle_threshold: u64,
    /// Fold short browsing detours back into the preceding development block.
    pub merge_short_browsing: bool,
    /// Blocks older than this many days are deleted.
    pub db_cleanup_days: u32,
    /// Seconds an idle decision may stay pending before it resolves as work.
    pub idle_decision_timeout: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            idle_threshold: 300,
            merge_short_browsing: false,
            db_cleanup_days: 30,
            idle_decision_timeout: 900,
        }
    }
}

impl EngineConfig {
    /// Builds a snapshot from stored settings.
    ///
    /// Store errors propagate. Unparsable values are replaced by their default.
    pub fn load(settings: &Settings) -> Result<Self> {
        let defaults = EngineConfig::default();

        Ok(EngineConfig {
            idle_threshold: read_setting(settings, IDLE_THRESHOLD_KEY, defaults.idle_threshold, parse_positive)?,
            merge_short_browsing: read_setting(settings, MERGE_SHORT_BROWSING_KEY, defaults.merge_short_browsing, parse_flag)?,
            db_cleanup_days: read_setting(settings, DB_CLEANUP_DAYS_KEY, defaults.db_cleanup_days, parse_positive)?,
            idle_decision_timeout: read_setting(
                settings,
                IDLE_DECISION_TIMEOUT_KEY,
                defaults.idle_decision_timeout,
                parse_positive,
            )?,
        })
    }

    /// Checks that `value` is acceptable for the engine setting `key`.
    pub fn validate(key: &str, value: &str) -> Result<()> {
        let valid = match key {
            IDLE_THRESHOLD_KEY | IDLE_DECISION_TIMEOUT_KEY => parse_positive::<u64>(value).is_some(),
            DB_CLEANUP_DAYS_KEY => parse_positive::<u32>(value).is_some(),
            MERGE_SHORT_BROWSING_KEY => parse_flag(value).is_some(),
            _ => msg_bail_anyhow!(Message::UnknownSetting(key.to_string())),
        };

        if !valid {
            msg_bail_anyhow!(Message::InvalidSettingValue(key.to_string(), value.to_string()));
        }
        Ok(())
    }

    /// Default value of an engine setting, as stored text.
    pub fn default_value(key: &str) -> Option<String> {
        let defaults = EngineConfig::default();
        match key {
            IDLE_THRESHOLD_KEY => Some(defaults.idle_threshold.to_string()),
            MERGE_SHORT_BROWSING_KEY => Some(format_flag(defaults.merge_short_browsing)),
            DB_CLEANUP_DAYS_KEY => Some(defaults.db_cleanup_days.to_string()),
            IDLE_DECISION_TIMEOUT_KEY => Some(defaults.idle_decision_timeout.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "idle threshold {}s, merge short browsing {}, retention {} days, idle decision timeout {}s",
            self.idle_threshold, self.merge_short_browsing, self.db_cleanup_days, self.idle_decision_timeout
        )
    }
}

fn read_setting<T: ToString>(settings: &Settings, key: &str, default: T, parse: fn(&str) -> Option<T>) -> Result<T> {
    let raw = settings.get_setting(key, &default.to_string())?;
    match parse(&raw) {
        Some(value) => Ok(value),
        None => {
            msg_warning!(Message::SettingParseFallback(key.to_string(), raw, default.to_string()));
            Ok(default)
        }
    }
}

/// A number above zero.
fn parse_positive<T: FromStr + PartialOrd + Default>(raw: &str) -> Option<T> {
    raw.trim().parse().ok().filter(|value| *value > T::default())
}

/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`, case-insensitively.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn format_flag(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}
