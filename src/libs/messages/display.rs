use super::types::Message;
use std::fmt::{Display, Formatter, Result};

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let text = match self {
            // === TRACKING ===
            Message::TrackingStarted => "Tracking started. Press Ctrl-C to stop.".to_string(),
            Message::TrackingAlreadyRunning => "Tracking is already running".to_string(),
            Message::TrackingShuttingDown => "Stopping tracking...".to_string(),
            Message::TrackingStatus(state, block) => format!("State: {}, current block: {}", state, block),
            Message::IdleReturned(from, to, minutes) => format!("You were away from {} to {} ({} min)", from, to, minutes),
            Message::IdleDecisionPrompt => "Was that a break or work? Type 'break' or 'work'.".to_string(),
            Message::IdleDecisionApplied(decision) => format!("Idle period recorded as {}", decision),
            Message::NoPendingIdleDecision => "There is no idle period waiting for a decision".to_string(),
            Message::ManualBreakStarted => "Break started".to_string(),
            Message::ManualBreakEnded => "Break ended, back to tracking".to_string(),
            Message::SettingsReloaded(config) => format!("Settings reloaded: {}", config),
            Message::InteractiveHelp => "Commands: break/work (answer idle prompt), p (toggle break), r (reload settings), s (status), q (quit)".to_string(),
            Message::UnknownConsoleCommand(input) => format!("Unknown command '{}'", input),
            Message::ConsoleFailed(error) => format!("Console input failed: {}", error),
            Message::ConsoleCommandFailed(error) => format!("Command failed, tracking continues: {}", error),

            // === WATCHER / DAEMON ===
            Message::WatcherStarted(pid) => format!("Watcher started in background (PID: {})", pid),
            Message::WatcherStopped(pid) => format!("Watcher stopped (PID: {})", pid),
            Message::WatcherNotRunning => "Watcher is not running".to_string(),
            Message::WatcherStoppingExisting(pid) => format!("Stopping existing watcher (PID: {})", pid),
            Message::WatcherFailedToStopExisting(error) => format!("Failed to stop existing watcher: {}", error),
            Message::WatcherReceivedSigterm => "Received SIGTERM".to_string(),
            Message::WatcherReceivedSigint => "Received SIGINT".to_string(),
            Message::WatcherReceivedCtrlC => "Received Ctrl-C".to_string(),
            Message::WatcherSignalHandlerFailed(error) => format!("Failed to install signal handlers: {}", error),
            Message::WatcherCtrlCListenFailed(error) => format!("Failed to listen for Ctrl-C: {}", error),
            Message::WatcherSignalHandlingNotSupported => "Signal handling is not supported on this platform".to_string(),
            Message::DaemonModeNotSupported => "Background mode is not supported on this platform".to_string(),
            Message::InvalidPidFileContent => "PID file does not contain a valid process id".to_string(),
            Message::FailedToGetCurrentExecutable(error) => format!("Failed to locate the current executable: {}", error),
            Message::FailedToOpenProcess(code) => format!("Failed to open process (error code {})", code),
            Message::FailedToTerminateProcess(error) => format!("Failed to terminate process: {}", error),
            Message::ProcessTerminationNotSupported => "Process termination is not supported on this platform".to_string(),

            // === BLOCKS / REPORTS ===
            Message::BlockNotFound(id) => format!("Activity block {} not found", id),
            Message::NoBlocksFound => "No activity blocks recorded yet".to_string(),
            Message::NoUsageData(range) => format!("No activity recorded for {}", range),
            Message::ReportTitle(grouping, range) => format!("Usage by {} for {}", grouping, range),
            Message::InvalidDate(input) => format!("Invalid date '{}', expected today, yesterday or YYYY-MM-DD", input),
            Message::InvalidDateRange(from, to) => format!("Invalid range: {} is after {}", from, to),
            Message::ExportWritten(path) => format!("Report written to {}", path),
            Message::NoActivityForDate(date) => format!("No activity recorded on {}, nothing exported", date),
            Message::ConfirmCleanup(cutoff) => format!("Delete all activity blocks before {}?", cutoff),
            Message::CleanupCompleted(count) => format!("Deleted {} old activity blocks", count),

            // === CATEGORIES ===
            Message::CategoryAdded(name) => format!("Category '{}' added", name),
            Message::CategoryAlreadyExists(name) => format!("Category '{}' already exists", name),
            Message::CategoryNameEmpty => "Category name cannot be empty".to_string(),
            Message::CategoryNotFound(name) => format!("Category '{}' not found", name),
            Message::CategoryProtected(name) => format!("Category '{}' cannot be deleted", name),
            Message::CategoryDeleted(name, moved) => format!("Category '{}' deleted, {} apps moved to Uncategorized", name, moved),
            Message::CategoryCreatedOnAssign(name) => format!("Category '{}' does not exist yet and will be created", name),
            Message::ConfirmDeleteCategory(name) => format!("Delete category '{}'?", name),
            Message::AppCategoryAssigned(app, category) => format!("'{}' is now in '{}'", app, category),
            Message::AppCategoryCleared(app) => format!("'{}' is now uncategorized", app),

            // === SETTINGS / CONFIG ===
            Message::SettingValue(key, value) => format!("{} = {}", key, value),
            Message::SettingUpdated(key, value) => format!("Setting '{}' set to '{}'", key, value),
            Message::UnknownSetting(key) => format!("Unknown setting '{}'", key),
            Message::InvalidSettingValue(key, value) => format!("Invalid value '{}' for setting '{}'", value, key),
            Message::SettingParseFallback(key, raw, default) => {
                format!("Stored value '{}' for '{}' is invalid, using default {}", raw, key, default)
            }
            Message::ConfigParseFailed(error) => format!("Failed to read config file, using defaults: {}", error),

            // === DATABASE ===
            Message::MigrationsFound(count) => format!("Found {} pending database migrations", count),
            Message::RunningMigration(version, name) => format!("Running migration v{}: {}", version, name),
            Message::MigrationFailed(version, error) => format!("✗ Migration v{} failed: {}", version, error),
            Message::AllMigrationsCompleted => "All database migrations completed successfully".to_string(),
            Message::DatabaseReady => "Database ready".to_string(),

            // === GENERAL ===
            Message::OperationCancelled => "Operation cancelled".to_string(),
        };

        write!(f, "{}", text)
    }
}
