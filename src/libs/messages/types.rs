/// Every user-facing message of the application.
///
/// Text lives in the `Display` impl in `display.rs`; call sites only pick a
/// variant and fill in its parameters.
#[derive(Debug, Clone)]
pub enum Message {
    // === TRACKING ===
    TrackingStarted,
    TrackingAlreadyRunning,
    TrackingShuttingDown,
    TrackingStatus(String, String), // state, current block
    IdleReturned(String, String, i64), // from, to, minutes
    IdleDecisionPrompt,
    IdleDecisionApplied(String),
    NoPendingIdleDecision,
    ManualBreakStarted,
    ManualBreakEnded,
    SettingsReloaded(String),
    InteractiveHelp,
    UnknownConsoleCommand(String),
    ConsoleFailed(String),
    ConsoleCommandFailed(String),

    // === WATCHER / DAEMON ===
    WatcherStarted(u32),
    WatcherStopped(u32),
    WatcherNotRunning,
    WatcherStoppingExisting(String),
    WatcherFailedToStopExisting(String),
    WatcherReceivedSigterm,
    WatcherReceivedSigint,
    WatcherReceivedCtrlC,
    WatcherSignalHandlerFailed(String),
    WatcherCtrlCListenFailed(String),
    WatcherSignalHandlingNotSupported,
    DaemonModeNotSupported,
    InvalidPidFileContent,
    FailedToGetCurrentExecutable(String),
    FailedToOpenProcess(u32),
    FailedToTerminateProcess(String),
    ProcessTerminationNotSupported,

    // === BLOCKS / REPORTS ===
    BlockNotFound(i64),
    NoBlocksFound,
    NoUsageData(String),
    ReportTitle(String, String), // grouping, range
    InvalidDate(String),
    InvalidDateRange(String, String),
    ExportWritten(String),
    NoActivityForDate(String),
    ConfirmCleanup(String),
    CleanupCompleted(usize),

    // === CATEGORIES ===
    CategoryAdded(String),
    CategoryAlreadyExists(String),
    CategoryNameEmpty,
    CategoryNotFound(String),
    CategoryProtected(String),
    CategoryDeleted(String, usize),
    CategoryCreatedOnAssign(String),
    ConfirmDeleteCategory(String),
    AppCategoryAssigned(String, String),
    AppCategoryCleared(String),

    // === SETTINGS / CONFIG ===
    SettingValue(String, String),
    SettingUpdated(String, String),
    UnknownSetting(String),
    InvalidSettingValue(String, String),
    SettingParseFallback(String, String, String), // key, stored value, default
    ConfigParseFailed(String),

    // === DATABASE ===
    MigrationsFound(usize),
    RunningMigration(u32, String),
    MigrationFailed(u32, String),
    AllMigrationsCompleted,
    DatabaseReady,

    // === GENERAL ===
    OperationCancelled,
}
