//! `watch`: run the tracker.
//!
//! Without flags the engine runs in the foreground until Ctrl-C. Idle periods
//! are announced and left to resolve as work after `idle_decision_timeout`.
//! With `--interactive` the terminal also accepts single-line commands:
//!
//! | input         | effect                                  |
//! |---------------|-----------------------------------------|
//! | `break`, `b`  | the pending idle period was a break     |
//! | `work`, `w`   | the pending idle period was work        |
//! | `p`           | start or end a manual break             |
//! | `r`           | reload settings from the database       |
//! | `s`           | print the current state                 |
//! | `q`           | stop tracking                           |

use crate::libs::config::Config;
use crate::libs::daemon::{self, build_engine, runtime_options, shutdown_signal};
use crate::libs::data_storage::DataStorage;
use crate::libs::engine::{Engine, IdleDecision, IdleWindow};
use crate::libs::messages::Message;
use crate::{msg_error, msg_info, msg_print, msg_success, msg_warning};
use anyhow::Result;
use clap::Args;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Answer idle prompts and control breaks from the terminal
    #[arg(short, long, conflicts_with_all = ["background", "stop"])]
    interactive: bool,

    /// Run detached, replacing a watcher that is already running
    #[arg(short, long, conflicts_with = "stop")]
    background: bool,

    /// Stop the detached watcher
    #[arg(short, long)]
    stop: bool,
}

pub async fn cmd(args: WatchArgs) -> Result<()> {
    if args.stop {
        return daemon::stop();
    }
    if args.background {
        return daemon::spawn();
    }

    let storage = DataStorage::new();
    let tracker = Config::read_or_default().tracker();
    let engine = build_engine(&storage, &tracker)?;
    let idle_returns = engine.subscribe_idle_returns();

    engine.start(runtime_options(&tracker))?;
    msg_success!(Message::TrackingStarted);

    if args.interactive {
        msg_print!(Message::InteractiveHelp, true);
        tokio::select! {
            _ = shutdown_signal() => {}
            result = console(engine.clone(), idle_returns, BufReader::new(tokio::io::stdin())) => {
                if let Err(e) = result {
                    msg_error!(Message::ConsoleFailed(format!("{:#}", e)));
                }
            }
        }
    } else {
        tokio::select! {
            _ = shutdown_signal() => {}
            _ = announce_idle_returns(idle_returns) => {}
        }
    }

    msg_info!(Message::TrackingShuttingDown);
    engine.stop().await
}

async fn announce_idle_returns(mut idle_returns: UnboundedReceiver<IdleWindow>) {
    while let Some(window) = idle_returns.recv().await {
        msg_info!(idle_return_message(&window));
    }
    // Engine gone: wait for the signal instead.
    std::future::pending::<()>().await;
}

fn idle_return_message(window: &IdleWindow) -> Message {
    Message::IdleReturned(
        window.idle_start.format("%H:%M:%S").to_string(),
        window.idle_end.format("%H:%M:%S").to_string(),
        window.duration().num_minutes(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsoleCommand {
    Decide(IdleDecision),
    ToggleBreak,
    Reload,
    Status,
    Quit,
}

fn parse_console_command(line: &str) -> Option<ConsoleCommand> {
    match line.trim().to_lowercase().as_str() {
        "p" | "pause" => Some(ConsoleCommand::ToggleBreak),
        "r" | "reload" => Some(ConsoleCommand::Reload),
        "s" | "status" => Some(ConsoleCommand::Status),
        "q" | "quit" | "exit" => Some(ConsoleCommand::Quit),
        other => other.parse::<IdleDecision>().ok().map(ConsoleCommand::Decide),
    }
}

/// Reads commands from `input` until `q` or end of input.
///
/// A failed command is reported and the loop keeps going; only a broken input
/// stream ends it with an error.
async fn console<R>(engine: Arc<Engine>, mut idle_returns: UnboundedReceiver<IdleWindow>, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    loop {
        tokio::select! {
            Some(window) = idle_returns.recv() => {
                msg_print!(idle_return_message(&window));
                msg_print!(Message::IdleDecisionPrompt);
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }

                match parse_console_command(&line) {
                    Some(ConsoleCommand::Quit) => return Ok(()),
                    Some(command) => {
                        let engine = engine.clone();
                        match tokio::task::spawn_blocking(move || run_console_command(&engine, command)).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => msg_error!(Message::ConsoleCommandFailed(format!("{:#}", e))),
                            Err(e) => msg_error!(Message::ConsoleCommandFailed(e.to_string())),
                        }
                    }
                    None => msg_warning!(Message::UnknownConsoleCommand(line.trim().to_string())),
                }
            }
        }
    }
}

fn run_console_command(engine: &Engine, command: ConsoleCommand) -> Result<()> {
    match command {
        ConsoleCommand::Decide(decision) => match engine.pending_idle_decision() {
            Some(pending) => {
                engine.handle_idle_decision(decision, pending.window.idle_start, pending.window.idle_end)?;
                msg_success!(Message::IdleDecisionApplied(decision.to_string()));
            }
            None => msg_warning!(Message::NoPendingIdleDecision),
        },
        ConsoleCommand::ToggleBreak => {
            if engine.toggle_manual_break()? {
                msg_success!(Message::ManualBreakStarted);
            } else {
                msg_success!(Message::ManualBreakEnded);
            }
        }
        ConsoleCommand::Reload => {
            engine.reload_settings()?;
            msg_success!(Message::SettingsReloaded(engine.config().to_string()));
        }
        ConsoleCommand::Status => {
            let current = match engine.open_block_id() {
                Some(id) => engine.store().blocks.get_block(id)?,
                None => None,
            };
            let block = match current {
                Some(block) => format!("{} ({}m since {})", block.app_name, block.duration_minutes, block.start_time.format("%H:%M")),
                None => "-".to_string(),
            };
            msg_print!(Message::TrackingStatus(engine.state().to_string(), block));
        }
        ConsoleCommand::Quit => {}
    }
    Ok(())
}
