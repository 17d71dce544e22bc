//! Seconds since the last system-wide keyboard or mouse input.
//!
//! Platform backends:
//!
//! - Windows: `GetLastInputInfo` against `GetTickCount`. Both are 32-bit
//!   millisecond counters that wrap roughly every 49.7 days, so the difference is
//!   taken with wrapping arithmetic.
//! - Linux/X11: the MIT-SCREEN-SAVER extension's `ms_since_user_input`.
//! - Anywhere else, or when the display is unavailable: a background `rdev`
//!   listener that timestamps every input event it sees.
//!
//! A failed query reports `0.0`, which the engine reads as "user present".

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub trait IdleDetector: Send + Sync {
    fn idle_seconds(&self) -> f64;
}

/// Milliseconds between two readings of a wrapping 32-bit tick counter.
pub fn tick_elapsed_ms(now: u32, last_input: u32) -> u32 {
    now.wrapping_sub(last_input)
}

#[cfg(windows)]
#[derive(Debug, Default)]
pub struct WindowsIdle;

#[cfg(windows)]
impl IdleDetector for WindowsIdle {
    fn idle_seconds(&self) -> f64 {
        use winapi::um::sysinfoapi::GetTickCount;
        use winapi::um::winuser::{GetLastInputInfo, LASTINPUTINFO};

        let mut info = LASTINPUTINFO {
            cbSize: std::mem::size_of::<LASTINPUTINFO>() as u32,
            dwTime: 0,
        };

        unsafe {
            if GetLastInputInfo(&mut info) == 0 {
                debug!("GetLastInputInfo failed");
                return 0.0;
            }
            f64::from(tick_elapsed_ms(GetTickCount(), info.dwTime)) / 1000.0
        }
    }
}

#[cfg(target_os = "linux")]
pub struct X11Idle {
    conn: x11rb::rust_connection::RustConnection,
    root: x11rb::protocol::xproto::Window,
}

#[cfg(target_os = "linux")]
impl X11Idle {
    pub fn connect() -> Result<Self, x11rb::errors::ConnectError> {
        let (conn, screen_num) = x11rb::connect(None)?;
        let root = x11rb::connection::Connection::setup(&conn).roots[screen_num].root;
        Ok(Self { conn, root })
    }
}

#[cfg(target_os = "linux")]
impl IdleDetector for X11Idle {
    fn idle_seconds(&self) -> f64 {
        use x11rb::protocol::screensaver;

        let info = screensaver::query_info(&self.conn, self.root)
            .ok()
            .and_then(|cookie| cookie.reply().ok());

        match info {
            Some(info) => f64::from(info.ms_since_user_input) / 1000.0,
            None => {
                debug!("screensaver query failed");
                0.0
            }
        }
    }
}

/// Idle time derived from a global input hook.
///
/// The listener thread restarts itself after errors and lives for the rest of the
/// process; `rdev::listen` offers no way to stop it.
pub struct InputListenerIdle {
    last_input: Arc<Mutex<Instant>>,
}

impl InputListenerIdle {
    pub fn spawn() -> Self {
        let last_input = Arc::new(Mutex::new(Instant::now()));
        let shared = last_input.clone();

        std::thread::spawn(move || loop {
            let seen = shared.clone();
            let result = rdev::listen(move |event: rdev::Event| match event.event_type {
                rdev::EventType::KeyPress(_)
                | rdev::EventType::ButtonPress(_)
                | rdev::EventType::MouseMove { .. }
                | rdev::EventType::Wheel { .. } => *seen.lock() = Instant::now(),
                _ => {}
            });

            match result {
                Ok(()) => break,
                Err(e) => {
                    warn!("input listener failed: {:?}, retrying in 1s", e);
                    std::thread::sleep(Duration::from_secs(1));
                }
            }
        });

        Self { last_input }
    }
}

impl IdleDetector for InputListenerIdle {
    fn idle_seconds(&self) -> f64 {
        self.last_input.lock().elapsed().as_secs_f64()
    }
}

/// The best idle detector available on this machine.
pub fn system_idle_detector() -> Arc<dyn IdleDetector> {
    #[cfg(windows)]
    {
        Arc::new(WindowsIdle)
    }

    #[cfg(target_os = "linux")]
    {
        match X11Idle::connect() {
            Ok(detector) => Arc::new(detector),
            Err(e) => {
                warn!("X11 idle query unavailable ({}), falling back to input listener", e);
                Arc::new(InputListenerIdle::spawn())
            }
        }
    }

    #[cfg(not(any(windows, target_os = "linux")))]
    {
        Arc::new(InputListenerIdle::spawn())
    }
}
