#![allow(dead_code)]

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use test_context::TestContext;
use timereporter::db::store::Store;
use timereporter::libs::clock::ManualClock;
use timereporter::libs::engine::Engine;
use timereporter::libs::export::DayExporter;
use timereporter::libs::idle::IdleDetector;
use timereporter::libs::observer::{ObserverError, Subscription, WindowInfo, WindowObserver};
use tokio::sync::mpsc::UnboundedSender;

pub const CODE: &str = "code.exe";
pub const CHROME: &str = "chrome.exe";
pub const SLACK: &str = "slack.exe";

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
}

pub fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    day().and_hms_opt(h, m, s).unwrap()
}

/// Foreground window controlled by the test.
#[derive(Default)]
pub struct ScriptedObserver {
    current: Mutex<Option<WindowInfo>>,
    listener: Mutex<Option<UnboundedSender<WindowInfo>>>,
}

impl ScriptedObserver {
    /// Changes what `poll` returns without emitting an event (a missed change).
    pub fn focus(&self, app: &str, title: &str) {
        *self.current.lock() = Some(WindowInfo::new(app, title));
    }

    pub fn clear(&self) {
        *self.current.lock() = None;
    }

    /// Changes focus and delivers the event to the subscriber, if any.
    pub fn push(&self, app: &str, title: &str) -> bool {
        self.focus(app, title);
        match self.listener.lock().as_ref() {
            Some(tx) => tx.send(WindowInfo::new(app, title)).is_ok(),
            None => false,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.listener.lock().is_some()
    }
}

impl WindowObserver for ScriptedObserver {
    fn poll(&self) -> Option<WindowInfo> {
        self.current.lock().clone()
    }

    fn subscribe(&self, events: UnboundedSender<WindowInfo>) -> Result<Subscription, ObserverError> {
        *self.listener.lock() = Some(events);
        Ok(Subscription::detached())
    }
}

/// Observer whose push registration always fails.
pub struct PollOnlyObserver(pub ScriptedObserver);

impl WindowObserver for PollOnlyObserver {
    fn poll(&self) -> Option<WindowInfo> {
        self.0.poll()
    }

    fn subscribe(&self, _events: UnboundedSender<WindowInfo>) -> Result<Subscription, ObserverError> {
        Err(ObserverError::Registration("hook refused".to_string()))
    }
}

#[derive(Default)]
pub struct ScriptedIdle {
    seconds: Mutex<f64>,
}

impl ScriptedIdle {
    pub fn set(&self, seconds: f64) {
        *self.seconds.lock() = seconds;
    }
}

impl IdleDetector for ScriptedIdle {
    fn idle_seconds(&self) -> f64 {
        *self.seconds.lock()
    }
}

/// Records which days were exported instead of writing files.
#[derive(Default)]
pub struct RecordingExporter {
    pub days: Mutex<Vec<NaiveDate>>,
    pub fail: bool,
}

impl DayExporter for RecordingExporter {
    fn export_day(&self, date: NaiveDate) -> Result<Option<PathBuf>> {
        self.days.lock().push(date);
        if self.fail {
            anyhow::bail!("disk full");
        }
        Ok(Some(PathBuf::from(format!("activity_{}.txt", date))))
    }
}

/// A fresh database in a temp directory and an engine wired to scripted leaves.
///
/// The clock starts at 14:00:00 on 2025-03-14 with `code.exe` focused and no
/// idle time.
pub struct EngineContext {
    pub temp_dir: TempDir,
    pub store: Store,
    pub observer: Arc<ScriptedObserver>,
    pub idle: Arc<ScriptedIdle>,
    pub clock: Arc<ManualClock>,
    pub exporter: Arc<RecordingExporter>,
    pub engine: Arc<Engine>,
}

impl EngineContext {
    pub fn with_exporter(exporter: RecordingExporter) -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(&temp_dir.path().join("timereporter.db")).unwrap();
        let observer = Arc::new(ScriptedObserver::default());
        observer.focus(CODE, "main.rs - timereporter");
        let idle = Arc::new(ScriptedIdle::default());
        let clock = Arc::new(ManualClock::new(at(14, 0, 0)));
        let exporter = Arc::new(exporter);

        let engine = Engine::new(store.clone(), observer.clone(), idle.clone(), clock.clone()).with_exporter(exporter.clone());

        EngineContext {
            temp_dir,
            store,
            observer,
            idle,
            clock,
            exporter,
            engine: Arc::new(engine),
        }
    }

    /// Sets the clock and runs one heartbeat.
    pub fn tick_at(&self, now: NaiveDateTime) {
        self.clock.set(now);
        self.engine.heartbeat_tick().unwrap();
    }

    /// Sets the clock and delivers a foreground change straight to the engine.
    pub fn switch_at(&self, now: NaiveDateTime, app: &str, title: &str) {
        self.clock.set(now);
        self.observer.focus(app, title);
        self.engine.handle_window_change(WindowInfo::new(app, title)).unwrap();
    }

    pub fn set_setting(&self, key: &str, value: &str) {
        self.store.settings.set_setting(key, value).unwrap();
        self.engine.reload_settings().unwrap();
    }

    /// All blocks, oldest first.
    pub fn blocks(&self) -> Vec<timereporter::libs::block::ActivityBlock> {
        let mut blocks = self.store.blocks.get_recent_blocks(1000).unwrap();
        blocks.reverse();
        blocks
    }
}

impl TestContext for EngineContext {
    fn setup() -> Self {
        EngineContext::with_exporter(RecordingExporter::default())
    }
}

/// A fresh database in a temp directory.
pub struct StoreContext {
    pub temp_dir: TempDir,
    pub store: Store,
}

impl TestContext for StoreContext {
    fn setup() -> Self {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = Store::open(&temp_dir.path().join("timereporter.db")).unwrap();
        StoreContext { temp_dir, store }
    }
}
