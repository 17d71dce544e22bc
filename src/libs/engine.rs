//! The tracking engine.
//!
//! The engine turns foreground-window events and periodic heartbeats into
//! activity blocks. It owns three pieces of transient state:
//!
//! - the [`TrackingState`] (`Active`, `Idle`, `ManualBreak`),
//! - the date it last saw, for midnight rollover,
//! - the [`PendingIdleDecision`] left behind when the user returns from an idle
//!   period and has not yet said whether it was a break or work.
//!
//! Every entry point (window change, heartbeat, manual break toggle, idle
//! decision) locks the same mutex for its whole "read open block, decide, write"
//! step, so a push event and a heartbeat can never both open a block for the same
//! transition.
//!
//! ## Idle handling
//!
//! ```text
//!            idle >= threshold                  idle < threshold
//!  Active ─────────────────────▶ Idle{started_at} ────────────────▶ Active
//!                                                     │
//!                                                     └─ IdleWindow published,
//!                                                        decision now pending
//! ```
//!
//! The engine never waits for the decision. A pending decision resolves when
//! [`Engine::handle_idle_decision`] is called, when it has been pending longer
//! than `idle_decision_timeout` (resolves as work), when a new idle period begins,
//! or at midnight. While it is pending the pre-idle block is frozen: heartbeats
//! open a new block for the current window instead of stretching the old one
//! across the gap.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use timereporter::db::store::Store;
//! use timereporter::libs::clock::SystemClock;
//! use timereporter::libs::engine::Engine;
//! use timereporter::libs::idle::system_idle_detector;
//! use timereporter::libs::observer::system_observer;
//!
//! let engine = Engine::new(Store::new()?, system_observer(), system_idle_detector(), Arc::new(SystemClock));
//! engine.bootstrap()?;
//! engine.heartbeat_tick()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use crate::db::store::Store;
use crate::libs::block::{end_of_day, start_of_day, ActivityBlock, BREAK_APP_NAME, BREAK_WINDOW_TITLE};
use crate::libs::clock::Clock;
use crate::libs::config::EngineConfig;
use crate::libs::export::{DayExporter, BREAK_GAP_SECONDS};
use crate::libs::idle::IdleDetector;
use crate::libs::observer::{WindowInfo, WindowObserver};
use crate::libs::runtime::RuntimeTasks;
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

const BROWSING_CATEGORY: &str = "Browsing";
const DEVELOPMENT_CATEGORY: &str = "Development";

/// Browsing blocks shorter than this many seconds can be folded into the
/// preceding development block.
const SHORT_BROWSING_LIMIT_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Active,
    Idle { started_at: NaiveDateTime },
    ManualBreak { started_at: NaiveDateTime },
}

impl fmt::Display for TrackingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingState::Active => write!(f, "active"),
            TrackingState::Idle { started_at } => write!(f, "idle since {}", started_at.format("%H:%M:%S")),
            TrackingState::ManualBreak { started_at } => write!(f, "on break since {}", started_at.format("%H:%M:%S")),
        }
    }
}

/// The span the user was away: from the last input to the moment they returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleWindow {
    pub idle_start: NaiveDateTime,
    pub idle_end: NaiveDateTime,
}

impl IdleWindow {
    pub fn duration(&self) -> TimeDelta {
        self.idle_end - self.idle_start
    }
}

/// An idle period waiting for the user to classify it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingIdleDecision {
    pub window: IdleWindow,
    /// The block that was open when the user went idle.
    pub pre_idle_block: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleDecision {
    /// The time away was a break: cut the pre-idle block at the idle start.
    Break,
    /// The time away was work: stretch the pre-idle block to the idle end.
    Work,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown idle decision '{0}', expected 'break' or 'work'")]
pub struct IdleDecisionParseError(pub String);

impl FromStr for IdleDecision {
    type Err = IdleDecisionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "break" | "b" => Ok(IdleDecision::Break),
            "work" | "w" => Ok(IdleDecision::Work),
            other => Err(IdleDecisionParseError(other.to_string())),
        }
    }
}

impl fmt::Display for IdleDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdleDecision::Break => write!(f, "break"),
            IdleDecision::Work => write!(f, "work"),
        }
    }
}

struct EngineCore {
    state: TrackingState,
    last_date: NaiveDate,
    open_block: Option<i64>,
    pre_idle_block: Option<i64>,
    pending: Option<PendingIdleDecision>,
}

impl EngineCore {
    /// True when `block_id` is frozen until the pending idle decision arrives.
    fn awaiting_decision(&self, block_id: i64) -> bool {
        self.pending.is_some_and(|pending| pending.pre_idle_block == Some(block_id))
    }
}

pub struct Engine {
    store: Store,
    observer: Arc<dyn WindowObserver>,
    idle: Arc<dyn IdleDetector>,
    clock: Arc<dyn Clock>,
    exporter: Option<Arc<dyn DayExporter>>,
    config: RwLock<Arc<EngineConfig>>,
    core: Mutex<EngineCore>,
    idle_returns: Mutex<Option<UnboundedSender<IdleWindow>>>,
    pub(crate) tasks: Mutex<Option<RuntimeTasks>>,
}

impl Engine {
    /// Creates an engine in the `Active` state.
    ///
    /// Settings are read once here; if the store cannot be read the defaults are
    /// used and [`Engine::reload_settings`] can pick up stored values later.
    pub fn new(store: Store, observer: Arc<dyn WindowObserver>, idle: Arc<dyn IdleDetector>, clock: Arc<dyn Clock>) -> Self {
        let config = EngineConfig::load(&store.settings).unwrap_or_else(|e| {
            error!("failed to read engine settings, using defaults: {:#}", e);
            EngineConfig::default()
        });
        let today = clock.now().date();

        Self {
            store,
            observer,
            idle,
            clock,
            exporter: None,
            config: RwLock::new(Arc::new(config)),
            core: Mutex::new(EngineCore {
                state: TrackingState::Active,
                last_date: today,
                open_block: None,
                pre_idle_block: None,
                pending: None,
            }),
            idle_returns: Mutex::new(None),
            tasks: Mutex::new(None),
        }
    }

    /// Exporter invoked for the concluded day at midnight and on shutdown.
    pub fn with_exporter(mut self, exporter: Arc<dyn DayExporter>) -> Self {
        self.exporter = Some(exporter);
        self
    }

    /// Returns a channel that receives one [`IdleWindow`] per idle episode.
    ///
    /// Calling this again replaces the previous receiver.
    pub fn subscribe_idle_returns(&self) -> UnboundedReceiver<IdleWindow> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.idle_returns.lock() = Some(tx);
        rx
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn observer(&self) -> &Arc<dyn WindowObserver> {
        &self.observer
    }

    pub(crate) fn exporter(&self) -> Option<&Arc<dyn DayExporter>> {
        self.exporter.as_ref()
    }

    pub(crate) fn today(&self) -> NaiveDate {
        self.clock.now().date()
    }

    /// The settings snapshot currently in effect.
    pub fn config(&self) -> Arc<EngineConfig> {
        self.config.read().clone()
    }

    pub fn state(&self) -> TrackingState {
        self.core.lock().state
    }

    pub fn pending_idle_decision(&self) -> Option<PendingIdleDecision> {
        self.core.lock().pending
    }

    /// Id of the block the engine is currently extending, if any.
    pub fn open_block_id(&self) -> Option<i64> {
        self.core.lock().open_block
    }

    /// Resets transient state and opens a fresh block for the focused window.
    ///
    /// A block left over from a previous run is never extended, so downtime is
    /// not counted. Retention cleanup runs here too.
    pub fn bootstrap(&self) -> Result<()> {
        let mut core = self.core.lock();
        let now = self.clock.now();

        core.state = TrackingState::Active;
        core.last_date = now.date();
        core.open_block = None;
        core.pre_idle_block = None;
        core.pending = None;

        self.cleanup_logged(now);

        match self.observer.poll() {
            Some(info) => {
                self.open_new_block(&mut core, &info, now)?;
            }
            None => debug!("no focused window at startup"),
        }
        Ok(())
    }

    /// Reacts to a pushed foreground change.
    pub fn handle_window_change(&self, info: WindowInfo) -> Result<()> {
        let mut core = self.core.lock();
        let now = self.clock.now();

        if now.date() != core.last_date {
            self.midnight_transition(&mut core, now)?;
        }

        match core.state {
            TrackingState::ManualBreak { .. } => {
                debug!(app = %info.app_name, "window change ignored during manual break");
                Ok(())
            }
            TrackingState::Idle { started_at } => {
                if self.is_idle() {
                    return Ok(());
                }
                self.return_from_idle(&mut core, started_at, now);
                self.open_new_block(&mut core, &info, now)?;
                Ok(())
            }
            TrackingState::Active => {
                if self.is_idle() {
                    debug!(app = %info.app_name, "window change ignored while input is idle");
                    return Ok(());
                }
                self.switch_to(&mut core, &info, now)
            }
        }
    }

    /// One periodic tick: midnight check, break extension, idle detection, and
    /// extension of the open block.
    pub fn heartbeat_tick(&self) -> Result<()> {
        let mut core = self.core.lock();
        let now = self.clock.now();

        if now.date() != core.last_date {
            return self.midnight_transition(&mut core, now);
        }

        self.expire_pending_decision(&mut core, now)?;

        if let TrackingState::ManualBreak { .. } = core.state {
            if let Some(block) = self.open_block(&core)? {
                self.extend_block(&block, now)?;
            }
            return Ok(());
        }

        let idle_seconds = self.idle.idle_seconds();
        let config = self.config();
        debug!(idle_seconds, threshold = config.idle_threshold, state = %core.state, "heartbeat");

        if idle_seconds >= config.idle_threshold as f64 {
            if core.state == TrackingState::Active {
                self.enter_idle(&mut core, now, idle_seconds)?;
            }
            return Ok(());
        }

        if let TrackingState::Idle { started_at } = core.state {
            self.return_from_idle(&mut core, started_at, now);
            return Ok(());
        }

        let Some(info) = self.observer.poll() else {
            debug!("foreground window unavailable, tick skipped");
            return Ok(());
        };

        match self.open_block(&core)? {
            Some(block) if block.app_name == info.app_name && !core.awaiting_decision(block.id) => self.extend_block(&block, now),
            _ => self.switch_to(&mut core, &info, now),
        }
    }

    /// Starts or ends a manual break. Returns `true` when a break started.
    pub fn toggle_manual_break(&self) -> Result<bool> {
        let mut core = self.core.lock();
        let now = self.clock.now();

        if now.date() != core.last_date {
            self.midnight_transition(&mut core, now)?;
        }

        match core.state {
            TrackingState::ManualBreak { .. } => {
                if let Some(block) = self.open_block(&core)? {
                    self.extend_block(&block, now)?;
                }
                core.state = TrackingState::Active;
                core.open_block = None;

                if let Some(info) = self.observer.poll() {
                    self.open_new_block(&mut core, &info, now)?;
                }
                info!("manual break ended at {}", now.format("%H:%M:%S"));
                Ok(false)
            }
            TrackingState::Idle { started_at } => {
                self.return_from_idle(&mut core, started_at, now);
                self.start_manual_break(&mut core, now)?;
                Ok(true)
            }
            TrackingState::Active => {
                self.start_manual_break(&mut core, now)?;
                Ok(true)
            }
        }
    }

    /// Applies the user's classification of an idle period.
    ///
    /// `idle_start`/`idle_end` must match the pending decision; a decision for a
    /// period that already resolved (timed out, superseded) is ignored.
    pub fn handle_idle_decision(&self, decision: IdleDecision, idle_start: NaiveDateTime, idle_end: NaiveDateTime) -> Result<()> {
        let mut core = self.core.lock();
        let now = self.clock.now();

        let pending = match core.pending {
            Some(pending) if pending.window.idle_start == idle_start && pending.window.idle_end == idle_end => pending,
            _ => {
                warn!("no pending idle decision for {} - {}, ignoring '{}'", idle_start, idle_end, decision);
                return Ok(());
            }
        };

        self.apply_decision(&mut core, decision, &pending, now)?;
        core.pending = None;
        info!(%decision, "idle period {} - {} resolved", idle_start.format("%H:%M:%S"), idle_end.format("%H:%M:%S"));
        Ok(())
    }

    /// Re-reads settings and swaps in a new snapshot.
    pub fn reload_settings(&self) -> Result<()> {
        let config = EngineConfig::load(&self.store.settings)?;
        info!("settings reloaded: {}", config);
        *self.config.write() = Arc::new(config);
        Ok(())
    }

    /// Brings the open block up to the current time before shutdown.
    ///
    /// Nothing is extended while idle or for a block frozen by a pending decision.
    pub(crate) fn close_open_block(&self) -> Result<()> {
        let mut core = self.core.lock();
        let now = self.clock.now();

        if now.date() != core.last_date {
            return self.midnight_transition(&mut core, now);
        }
        if let TrackingState::Idle { .. } = core.state {
            return Ok(());
        }

        if let Some(block) = self.open_block(&core)?.filter(|block| !core.awaiting_decision(block.id)) {
            self.extend_block(&block, now)?;
            debug!(block_id = block.id, "open block closed at {}", now.format("%H:%M:%S"));
        }
        Ok(())
    }

    /// Deletes blocks older than the retention window. Returns how many went.
    pub fn run_cleanup(&self) -> Result<usize> {
        self.cleanup_at(self.clock.now())
    }

    fn is_idle(&self) -> bool {
        self.idle.idle_seconds() >= self.config().idle_threshold as f64
    }

    fn open_block(&self, core: &EngineCore) -> Result<Option<ActivityBlock>> {
        match core.open_block {
            Some(id) => self.store.blocks.get_block(id),
            None => Ok(None),
        }
    }

    /// Moves `block`'s end to `end` and recomputes its duration from scratch.
    fn extend_block(&self, block: &ActivityBlock, end: NaiveDateTime) -> Result<()> {
        let end = end.max(block.start_time);
        self.store.blocks.update_last_block(block.id, block.duration_until(end), end)
    }

    fn open_new_block(&self, core: &mut EngineCore, info: &WindowInfo, start: NaiveDateTime) -> Result<i64> {
        let id = self.store.blocks.create_block(&info.app_name, &info.window_title, start)?;
        core.open_block = Some(id);
        info!(block_id = id, app = %info.app_name, "new block at {}", start.format("%H:%M:%S"));
        Ok(id)
    }

    /// Makes `info` the tracked window, closing the current block at `now`.
    fn switch_to(&self, core: &mut EngineCore, info: &WindowInfo, now: NaiveDateTime) -> Result<()> {
        let current = self.open_block(core)?.filter(|block| !core.awaiting_decision(block.id));

        if let Some(block) = current {
            if block.app_name == info.app_name {
                return Ok(());
            }

            self.extend_block(&block, now)?;

            if self.config().merge_short_browsing && self.merge_short_browsing(core, &block, now)? {
                if let Some(merged) = self.store.blocks.get_last_block()? {
                    core.open_block = Some(merged.id);
                    if merged.app_name == info.app_name {
                        info!(app = %merged.app_name, "short browsing merged, continuing block {}", merged.id);
                        return Ok(());
                    }
                }
            }
        }

        self.open_new_block(core, info, now)?;
        Ok(())
    }

    /// Folds a just-closed short "Browsing" block into the "Development" block
    /// right before it.
    fn merge_short_browsing(&self, core: &EngineCore, closed: &ActivityBlock, now: NaiveDateTime) -> Result<bool> {
        if (now - closed.start_time).num_seconds() >= SHORT_BROWSING_LIMIT_SECS {
            return Ok(false);
        }
        if self.store.categories.get_app_category(&closed.app_name)? != BROWSING_CATEGORY {
            return Ok(false);
        }

        let recent = self.store.blocks.get_recent_blocks(2)?;
        let [latest, previous] = recent.as_slice() else {
            return Ok(false);
        };
        if latest.id != closed.id
            || previous.is_break()
            || core.awaiting_decision(previous.id)
            || previous.start_time.date() != closed.start_time.date()
            || (closed.start_time - previous.end_time).num_seconds() > BREAK_GAP_SECONDS
        {
            return Ok(false);
        }
        if self.store.categories.get_app_category(&previous.app_name)? != DEVELOPMENT_CATEGORY {
            return Ok(false);
        }

        let merged = self.store.blocks.merge_last_two_blocks()?;
        if merged {
            info!(browsing = %closed.app_name, development = %previous.app_name, "merged short browsing block");
        }
        Ok(merged)
    }

    fn enter_idle(&self, core: &mut EngineCore, now: NaiveDateTime, idle_seconds: f64) -> Result<()> {
        if let Some(pending) = core.pending {
            self.apply_decision(core, IdleDecision::Work, &pending, now)?;
            core.pending = None;
            info!("previous idle period auto-resolved as work");
        }

        let mut started_at = now - TimeDelta::seconds(idle_seconds.floor() as i64);
        if let Some(block) = self.open_block(core)? {
            started_at = started_at.max(block.start_time);
        }

        core.pre_idle_block = core.open_block;
        core.state = TrackingState::Idle { started_at };
        info!("idle since {}", started_at.format("%H:%M:%S"));
        Ok(())
    }

    /// Leaves `Idle`, records the pending decision and publishes the idle window.
    fn return_from_idle(&self, core: &mut EngineCore, started_at: NaiveDateTime, now: NaiveDateTime) {
        let window = IdleWindow {
            idle_start: started_at,
            idle_end: now,
        };

        core.pending = Some(PendingIdleDecision {
            window,
            pre_idle_block: core.pre_idle_block.take(),
        });
        core.state = TrackingState::Active;
        info!(
            "user returned at {} after {} minutes idle",
            now.format("%H:%M:%S"),
            window.duration().num_minutes()
        );

        if let Some(sender) = self.idle_returns.lock().as_ref() {
            if sender.send(window).is_err() {
                debug!("idle return listener is gone");
            }
        }
    }

    fn apply_decision(&self, core: &mut EngineCore, decision: IdleDecision, pending: &PendingIdleDecision, now: NaiveDateTime) -> Result<()> {
        let block = match pending.pre_idle_block {
            Some(id) => self.store.blocks.get_block(id)?,
            None => None,
        };
        let Some(block) = block else {
            return Ok(());
        };

        match decision {
            IdleDecision::Break => {
                let end = pending.window.idle_start.max(block.start_time);
                self.store.blocks.update_last_block(block.id, block.duration_until(end), end)?;

                // No block was opened since the user came back; start one now.
                if core.open_block == Some(block.id) && core.state == TrackingState::Active {
                    core.open_block = None;
                    if let Some(info) = self.observer.poll() {
                        self.open_new_block(core, &info, now)?;
                    }
                }
            }
            IdleDecision::Work => {
                let end = pending.window.idle_end.min(end_of_day(block.start_time.date()));
                if end > block.end_time {
                    self.store.blocks.update_last_block(block.id, block.duration_until(end), end)?;
                }
                self.rejoin_pre_idle_block(core, &block, pending)?;
            }
        }
        Ok(())
    }

    /// After a "work" decision, a block opened for the same app once the user came
    /// back continues the pre-idle block instead of standing next to it.
    fn rejoin_pre_idle_block(&self, core: &mut EngineCore, block: &ActivityBlock, pending: &PendingIdleDecision) -> Result<()> {
        let Some(open) = self.open_block(core)? else {
            return Ok(());
        };
        if open.id == block.id
            || open.app_name != block.app_name
            || open.start_time < pending.window.idle_end
            || open.start_time.date() != block.start_time.date()
        {
            return Ok(());
        }

        let recent = self.store.blocks.get_recent_blocks(2)?;
        if !matches!(recent.as_slice(), [latest, previous] if latest.id == open.id && previous.id == block.id) {
            return Ok(());
        }

        if self.store.blocks.merge_last_two_blocks()? {
            core.open_block = Some(block.id);
            info!(block_id = block.id, app = %block.app_name, "idle period counted as work, block continues");
        }
        Ok(())
    }

    fn expire_pending_decision(&self, core: &mut EngineCore, now: NaiveDateTime) -> Result<()> {
        let Some(pending) = core.pending else {
            return Ok(());
        };

        let timeout = TimeDelta::seconds(self.config().idle_decision_timeout as i64);
        if now - pending.window.idle_end < timeout {
            return Ok(());
        }

        self.apply_decision(core, IdleDecision::Work, &pending, now)?;
        core.pending = None;
        info!(
            "idle period {} - {} undecided, counted as work",
            pending.window.idle_start.format("%H:%M:%S"),
            pending.window.idle_end.format("%H:%M:%S")
        );
        Ok(())
    }

    fn start_manual_break(&self, core: &mut EngineCore, now: NaiveDateTime) -> Result<()> {
        if let Some(block) = self.open_block(core)?.filter(|block| !core.awaiting_decision(block.id)) {
            self.extend_block(&block, now)?;
        }

        let id = self.store.blocks.create_block(BREAK_APP_NAME, BREAK_WINDOW_TITLE, now)?;
        core.open_block = Some(id);
        core.state = TrackingState::ManualBreak { started_at: now };
        info!(block_id = id, "manual break started at {}", now.format("%H:%M:%S"));
        Ok(())
    }

    /// Closes the concluded day at `23:59:59` and continues the same activity at
    /// `00:00:00` of the new one.
    fn midnight_transition(&self, core: &mut EngineCore, now: NaiveDateTime) -> Result<()> {
        let old_date = core.last_date;
        let day_end = end_of_day(old_date);
        let day_start = start_of_day(now.date());
        info!("date changed {} -> {}", old_date, now.date());

        if let Some(pending) = core.pending {
            self.apply_decision(core, IdleDecision::Work, &pending, now)?;
            core.pending = None;
        }

        match core.state {
            // The pre-idle block is left where it stopped; a later decision is
            // clamped to its own day.
            TrackingState::Idle { .. } => {}
            TrackingState::Active | TrackingState::ManualBreak { .. } => {
                if let Some(block) = self.open_block(core)? {
                    if block.start_time <= day_end {
                        self.extend_block(&block, day_end)?;
                    }
                    let info = WindowInfo::new(block.app_name.clone(), block.window_title.clone());
                    self.open_new_block(core, &info, day_start)?;
                    if let TrackingState::ManualBreak { .. } = core.state {
                        core.state = TrackingState::ManualBreak { started_at: day_start };
                    }
                }
            }
        }

        core.last_date = now.date();

        if let Some(exporter) = &self.exporter {
            match exporter.export_day(old_date) {
                Ok(Some(path)) => info!("report for {} written to {}", old_date, path.display()),
                Ok(None) => debug!("nothing to export for {}", old_date),
                Err(e) => error!("end of day export for {} failed: {:#}", old_date, e),
            }
        }

        self.cleanup_logged(now);
        Ok(())
    }

    fn cleanup_at(&self, now: NaiveDateTime) -> Result<usize> {
        let days = self.config().db_cleanup_days;
        let cutoff = start_of_day(now.date() - TimeDelta::days(i64::from(days)));
        let deleted = self.store.blocks.delete_older_than(cutoff)?;
        if deleted > 0 {
            info!("retention cleanup removed {} blocks older than {}", deleted, cutoff.date());
        }
        Ok(deleted)
    }

    fn cleanup_logged(&self, now: NaiveDateTime) {
        if let Err(e) = self.cleanup_at(now) {
            error!("retention cleanup failed: {:#}", e);
        }
    }
}
