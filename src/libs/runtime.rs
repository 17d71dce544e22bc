//! Background tasks that drive an [`Engine`].
//!
//! [`Engine::start`] bootstraps the engine, subscribes to foreground changes and
//! spawns two tokio tasks: a heartbeat on a fixed interval and a consumer for
//! pushed window events. Each engine call runs on the blocking pool since it
//! touches SQLite and the display server.
//!
//! [`Engine::stop`] flips the shutdown watch, cancels the push listener, waits
//! for in-flight work, then runs the optional export-on-exit.

use crate::libs::engine::Engine;
use crate::libs::messages::Message;
use crate::libs::observer::{Subscription, WindowInfo};
use crate::msg_bail_anyhow;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Knobs for the background loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeOptions {
    pub heartbeat_interval: Duration,
    pub export_on_exit: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            export_on_exit: true,
        }
    }
}

pub(crate) struct RuntimeTasks {
    shutdown: watch::Sender<bool>,
    heartbeat: JoinHandle<()>,
    events: JoinHandle<()>,
    subscription: Option<Subscription>,
    export_on_exit: bool,
}

impl Engine {
    /// Starts tracking in the background. Must be called inside a tokio runtime.
    ///
    /// Fails only if the engine is already running or the initial block cannot
    /// be written. A failed push subscription is logged and tracking continues
    /// on heartbeats alone.
    pub fn start(self: &Arc<Self>, options: RuntimeOptions) -> Result<()> {
        if self.tasks.lock().is_some() {
            msg_bail_anyhow!(Message::TrackingAlreadyRunning);
        }

        self.bootstrap()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel::<WindowInfo>();
        let subscription = match self.observer().subscribe(event_tx) {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!("window change notifications unavailable ({}), continuing on heartbeat only", e);
                None
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let heartbeat = tokio::spawn(run_heartbeat(self.clone(), options.heartbeat_interval, shutdown_rx.clone()));
        let events = tokio::spawn(run_event_consumer(self.clone(), event_rx, shutdown_rx));

        *self.tasks.lock() = Some(RuntimeTasks {
            shutdown: shutdown_tx,
            heartbeat,
            events,
            subscription,
            export_on_exit: options.export_on_exit,
        });

        info!("tracking started, heartbeat every {}s", options.heartbeat_interval.as_secs());
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.tasks.lock().is_some()
    }

    /// Stops the background tasks, extends the open block to now and runs the
    /// export on exit. A no-op if the engine is not running.
    pub async fn stop(self: &Arc<Self>) -> Result<()> {
        let Some(tasks) = self.tasks.lock().take() else {
            return Ok(());
        };

        let _ = tasks.shutdown.send(true);

        if let Some(subscription) = tasks.subscription {
            if let Err(e) = tokio::task::spawn_blocking(move || subscription.cancel()).await {
                warn!("window listener did not shut down cleanly: {}", e);
            }
        }

        for (name, handle) in [("heartbeat", tasks.heartbeat), ("event consumer", tasks.events)] {
            if let Err(e) = handle.await {
                error!("{} task failed: {}", name, e);
            }
        }

        let engine = self.clone();
        match tokio::task::spawn_blocking(move || engine.close_open_block()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("failed to close the open block: {:#}", e),
            Err(e) => error!("closing task failed: {}", e),
        }

        if tasks.export_on_exit {
            let engine = self.clone();
            let exported = tokio::task::spawn_blocking(move || match engine.exporter() {
                Some(exporter) => exporter.export_day(engine.today()),
                None => Ok(None),
            })
            .await;

            match exported {
                Ok(Ok(Some(path))) => info!("report written to {}", path.display()),
                Ok(Ok(None)) => debug!("nothing to export on exit"),
                Ok(Err(e)) => error!("export on exit failed: {:#}", e),
                Err(e) => error!("export on exit task failed: {}", e),
            }
        }

        info!("tracking stopped");
        Ok(())
    }
}

async fn run_heartbeat(engine: Arc<Engine>, period: Duration, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; bootstrap already covered it.
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let engine = engine.clone();
                match tokio::task::spawn_blocking(move || engine.heartbeat_tick()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("heartbeat failed: {:#}", e),
                    Err(e) => error!("heartbeat task failed: {}", e),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}

async fn run_event_consumer(engine: Arc<Engine>, mut events: mpsc::UnboundedReceiver<WindowInfo>, mut shutdown: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(info) = event else {
                    debug!("window listener closed");
                    // Keep the task alive until shutdown so stop() sees a clean exit.
                    let _ = shutdown.changed().await;
                    break;
                };
                let engine = engine.clone();
                match tokio::task::spawn_blocking(move || engine.handle_window_change(info)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("window change handling failed: {:#}", e),
                    Err(e) => error!("window change task failed: {}", e),
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
