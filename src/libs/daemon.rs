//! Running the tracker as a foreground watcher or a detached daemon.
//!
//! `watch --background` re-executes the current binary with the hidden
//! `--daemon-run` flag in a new session (Unix) or without a console window
//! (Windows) and records the child's pid in `timereporter-watch.pid`.
//! `watch --stop` reads that file and terminates the process: SIGTERM first,
//! SIGKILL if it does not exit within a second. SIGTERM lands in
//! [`shutdown_signal`], so the engine still closes its block and writes the
//! exit report.

use crate::db::store::Store;
use crate::libs::clock::{Clock, SystemClock};
use crate::libs::config::{Config, TrackerConfig};
use crate::libs::data_storage::{DataStorage, EXPORTS_DIR};
use crate::libs::engine::Engine;
use crate::libs::export::{ExportFormat, ReportExporter};
use crate::libs::idle::system_idle_detector;
use crate::libs::messages::Message;
use crate::libs::observer::system_observer;
use crate::libs::runtime::RuntimeOptions;
use crate::{msg_bail_anyhow, msg_error, msg_error_anyhow, msg_info, msg_success, msg_warning};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

pub const PID_FILE: &str = "timereporter-watch.pid";

/// Wires the store, platform leaves and the text exporter into an engine.
///
/// Fails only when the database cannot be opened.
pub fn build_engine(storage: &DataStorage, tracker: &TrackerConfig) -> Result<Arc<Engine>> {
    let store = Store::in_storage(storage)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let export_dir = match &tracker.export_dir {
        Some(dir) => dir.clone(),
        None => storage.get_dir(EXPORTS_DIR)?,
    };
    let exporter = Arc::new(ReportExporter::new(store.clone(), export_dir, ExportFormat::Text, clock.clone()));

    let engine = Engine::new(store, system_observer(), system_idle_detector(), clock).with_exporter(exporter);
    Ok(Arc::new(engine))
}

pub fn runtime_options(tracker: &TrackerConfig) -> RuntimeOptions {
    RuntimeOptions {
        heartbeat_interval: Duration::from_secs(tracker.heartbeat_interval.max(1)),
        export_on_exit: tracker.export_on_exit,
    }
}

/// Resolves once the process is asked to terminate.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => msg_info!(Message::WatcherReceivedSigterm),
                    _ = sigint.recv() => msg_info!(Message::WatcherReceivedSigint),
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                msg_error!(Message::WatcherSignalHandlerFailed(e.to_string()));
                if tokio::signal::ctrl_c().await.is_ok() {
                    msg_info!(Message::WatcherReceivedCtrlC);
                }
            }
        }
    }

    #[cfg(windows)]
    {
        match tokio::signal::ctrl_c().await {
            Ok(()) => msg_info!(Message::WatcherReceivedCtrlC),
            Err(e) => {
                msg_error!(Message::WatcherCtrlCListenFailed(e.to_string()));
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        msg_warning!(Message::WatcherSignalHandlingNotSupported);
        std::future::pending::<()>().await;
    }
}

/// Body of the detached process: track until a termination signal arrives.
pub async fn run_with_signal_handling() -> Result<()> {
    let storage = DataStorage::new();
    let tracker = Config::read_or_default().tracker();

    let engine = build_engine(&storage, &tracker)?;
    engine.start(runtime_options(&tracker))?;

    shutdown_signal().await;
    msg_info!(Message::TrackingShuttingDown);
    engine.stop().await?;

    let pid_path = storage.get_path(PID_FILE)?;
    if pid_path.exists() {
        let _ = std::fs::remove_file(&pid_path);
    }

    Ok(())
}

/// Starts the detached watcher, replacing one that is already running.
pub fn spawn() -> Result<()> {
    let pid_path = DataStorage::new().get_path(PID_FILE)?;

    if pid_path.exists() {
        if let Ok(pid_str) = std::fs::read_to_string(&pid_path) {
            msg_info!(Message::WatcherStoppingExisting(pid_str.trim().to_string()));
            if let Err(e) = stop_internal() {
                msg_warning!(Message::WatcherFailedToStopExisting(e.to_string()));
                let _ = std::fs::remove_file(&pid_path);
            }
            std::thread::sleep(Duration::from_millis(1000));
        }
    }

    let current_exe = std::env::current_exe().map_err(|e| msg_error_anyhow!(Message::FailedToGetCurrentExecutable(e.to_string())))?;

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        let mut command = std::process::Command::new(current_exe);
        command.arg("--daemon-run");
        // SAFETY: setsid is async-signal-safe and touches no parent state.
        unsafe {
            command.pre_exec(|| {
                nix::unistd::setsid()?;
                Ok(())
            });
        }
        let child = command.spawn()?;
        let pid = child.id();
        std::fs::write(&pid_path, pid.to_string())?;
        msg_success!(Message::WatcherStarted(pid));
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;
        let child = std::process::Command::new(current_exe)
            .arg("--daemon-run")
            .creation_flags(CREATE_NO_WINDOW)
            .spawn()?;
        let pid = child.id();
        std::fs::write(&pid_path, pid.to_string())?;
        msg_success!(Message::WatcherStarted(pid));
    }

    #[cfg(not(any(unix, windows)))]
    {
        msg_bail_anyhow!(Message::DaemonModeNotSupported);
    }

    Ok(())
}

/// Stops the detached watcher. Not running is not an error.
pub fn stop() -> Result<()> {
    let pid_path = DataStorage::new().get_path(PID_FILE)?;
    if !pid_path.exists() {
        msg_info!(Message::WatcherNotRunning);
        return Ok(());
    }
    stop_internal()
}

fn stop_internal() -> Result<()> {
    let pid_path = DataStorage::new().get_path(PID_FILE)?;
    if !pid_path.exists() {
        msg_bail_anyhow!(Message::WatcherNotRunning);
    }

    let pid_str = std::fs::read_to_string(&pid_path)?;
    let pid: u32 = pid_str.trim().parse().map_err(|_| msg_error_anyhow!(Message::InvalidPidFileContent))?;

    let killed = kill_process(pid)?;

    std::fs::remove_file(pid_path)?;

    if killed {
        msg_info!(Message::WatcherStopped(pid));
    } else {
        msg_info!(Message::WatcherNotRunning);
    }
    Ok(())
}

/// Terminates `pid`. Returns `false` if no such process exists.
#[cfg(unix)]
fn kill_process(pid: u32) -> Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let target = Pid::from_raw(pid as i32);

    match kill(target, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Ok(false),
        Err(e) => msg_bail_anyhow!(Message::FailedToTerminateProcess(e.to_string())),
    }

    for _ in 0..10 {
        std::thread::sleep(Duration::from_millis(100));
        // Signal 0 only checks that the process still exists.
        if let Err(Errno::ESRCH) = kill(target, None) {
            return Ok(true);
        }
    }

    let _ = kill(target, Signal::SIGKILL);
    std::thread::sleep(Duration::from_millis(100));
    Ok(true)
}

#[cfg(windows)]
fn kill_process(pid: u32) -> Result<bool> {
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::handleapi::CloseHandle;
    use winapi::um::processthreadsapi::{OpenProcess, TerminateProcess};
    use winapi::um::winnt::PROCESS_TERMINATE;

    const ERROR_INVALID_PARAMETER: u32 = 87;

    unsafe {
        let handle = OpenProcess(PROCESS_TERMINATE, 0, pid);
        if handle.is_null() {
            let error = GetLastError();
            if error == ERROR_INVALID_PARAMETER {
                return Ok(false);
            }
            msg_bail_anyhow!(Message::FailedToOpenProcess(error));
        }

        let result = TerminateProcess(handle, 0);
        CloseHandle(handle);

        if result == 0 {
            msg_bail_anyhow!(Message::FailedToTerminateProcess(GetLastError().to_string()));
        }
        std::thread::sleep(Duration::from_millis(100));
        Ok(true)
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_process(_pid: u32) -> Result<bool> {
    msg_bail_anyhow!(Message::ProcessTerminationNotSupported);
}
