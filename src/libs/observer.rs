//! Foreground window observation.
//!
//! A [`WindowObserver`] offers two ways to learn what the user is looking at:
//! [`WindowObserver::poll`] for an on-demand reading and
//! [`WindowObserver::subscribe`] for a push stream of focus changes. The engine
//! bootstraps and self-corrects with `poll` and reacts immediately to pushed
//! events.
//!
//! ## Platforms
//!
//! | Platform | Push | Poll |
//! |---|---|---|
//! | Windows | `EVENT_SYSTEM_FOREGROUND` WinEvent hook on a dedicated message-loop thread | `GetForegroundWindow` |
//! | Linux (X11) | `PropertyNotify` for `_NET_ACTIVE_WINDOW` on the root window | `_NET_ACTIVE_WINDOW` + `_NET_WM_PID` |
//! | Other | unsupported | no info |
//!
//! Process names come from `sysinfo`. Any lookup that fails (the process exited
//! between the focus change and the query, a window without a pid) yields `None`
//! and the event is dropped.

use parking_lot::Mutex;
use std::thread::JoinHandle;
use sysinfo::{Pid, ProcessesToUpdate, System};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// The focused application and the title of its foreground window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub app_name: String,
    pub window_title: String,
}

impl WindowInfo {
    pub fn new(app_name: impl Into<String>, window_title: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            window_title: window_title.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("foreground change notifications are not supported on this platform")]
    Unsupported,
    #[error("cannot connect to the display: {0}")]
    Connection(String),
    #[error("cannot register for foreground changes: {0}")]
    Registration(String),
}

pub trait WindowObserver: Send + Sync {
    /// The currently focused window, or `None` if it cannot be determined.
    fn poll(&self) -> Option<WindowInfo>;

    /// Starts delivering focus changes to `events` until the returned
    /// [`Subscription`] is cancelled or dropped.
    fn subscribe(&self, events: UnboundedSender<WindowInfo>) -> Result<Subscription, ObserverError>;
}

/// Handle to a running push listener.
///
/// Cancelling signals the listener to stop and joins its thread. Dropping the
/// handle cancels it as well.
pub struct Subscription {
    stop: Option<Box<dyn FnOnce() + Send>>,
    thread: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(thread: Option<JoinHandle<()>>, stop: impl FnOnce() + Send + 'static) -> Self {
        Self {
            stop: Some(Box::new(stop)),
            thread,
        }
    }

    /// A subscription with nothing to stop, for observers that deliver events
    /// from elsewhere.
    pub fn detached() -> Self {
        Self { stop: None, thread: None }
    }

    pub fn cancel(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop();
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("window listener thread panicked");
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// pid → executable name lookups with a reused `sysinfo` table.
#[derive(Default)]
pub struct ProcessNames {
    system: Mutex<System>,
}

impl ProcessNames {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    pub fn name_of(&self, pid: u32) -> Option<String> {
        let pid = Pid::from_u32(pid);
        let mut system = self.system.lock();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system
            .process(pid)
            .map(|process| process.name().to_string_lossy().into_owned())
            .filter(|name| !name.is_empty())
    }
}

/// Observer for platforms without a backend: never knows the focused window and
/// cannot subscribe.
#[derive(Debug, Default)]
pub struct NullObserver;

impl WindowObserver for NullObserver {
    fn poll(&self) -> Option<WindowInfo> {
        None
    }

    fn subscribe(&self, _events: UnboundedSender<WindowInfo>) -> Result<Subscription, ObserverError> {
        Err(ObserverError::Unsupported)
    }
}

/// The native observer for this platform.
pub fn system_observer() -> std::sync::Arc<dyn WindowObserver> {
    #[cfg(windows)]
    {
        std::sync::Arc::new(windows::WinEventObserver::new())
    }

    #[cfg(target_os = "linux")]
    {
        match x11::X11Observer::connect() {
            Ok(observer) => std::sync::Arc::new(observer),
            Err(e) => {
                tracing::warn!("{}", e);
                std::sync::Arc::new(NullObserver)
            }
        }
    }

    #[cfg(not(any(windows, target_os = "linux")))]
    {
        std::sync::Arc::new(NullObserver)
    }
}

#[cfg(windows)]
pub mod windows {
    use super::{ObserverError, ProcessNames, Subscription, WindowInfo, WindowObserver};
    use std::cell::RefCell;
    use std::ptr::null_mut;
    use std::sync::mpsc;
    use tokio::sync::mpsc::UnboundedSender;
    use winapi::shared::windef::{HWINEVENTHOOK, HWND};
    use winapi::um::processthreadsapi::GetCurrentThreadId;
    use winapi::um::winuser::{
        DispatchMessageW, GetForegroundWindow, GetMessageW, GetWindowTextW, GetWindowThreadProcessId, PostThreadMessageW,
        SetWinEventHook, TranslateMessage, UnhookWinEvent, EVENT_SYSTEM_FOREGROUND, MSG, WINEVENT_OUTOFCONTEXT, WM_QUIT,
    };

    const OBJID_WINDOW: i32 = 0;

    struct HookSink {
        events: UnboundedSender<WindowInfo>,
        processes: ProcessNames,
    }

    thread_local! {
        static HOOK_SINK: RefCell<Option<HookSink>> = const { RefCell::new(None) };
    }

    #[derive(Default)]
    pub struct WinEventObserver {
        processes: ProcessNames,
    }

    impl WinEventObserver {
        pub fn new() -> Self {
            Self::default()
        }
    }

    fn window_info(hwnd: HWND, processes: &ProcessNames) -> Option<WindowInfo> {
        if hwnd.is_null() {
            return None;
        }

        let mut buffer = [0u16; 512];
        let len = unsafe { GetWindowTextW(hwnd, buffer.as_mut_ptr(), buffer.len() as i32) };
        let window_title = String::from_utf16_lossy(&buffer[..len.max(0) as usize]);

        let mut pid: u32 = 0;
        unsafe { GetWindowThreadProcessId(hwnd, &mut pid) };
        if pid == 0 {
            return None;
        }

        let app_name = processes.name_of(pid)?;
        Some(WindowInfo { app_name, window_title })
    }

    unsafe extern "system" fn on_foreground_change(
        _hook: HWINEVENTHOOK,
        event: u32,
        hwnd: HWND,
        id_object: i32,
        _id_child: i32,
        _event_thread: u32,
        _event_time: u32,
    ) {
        if event != EVENT_SYSTEM_FOREGROUND || id_object != OBJID_WINDOW {
            return;
        }

        HOOK_SINK.with(|sink| {
            if let Some(sink) = sink.borrow().as_ref() {
                if let Some(info) = window_info(hwnd, &sink.processes) {
                    let _ = sink.events.send(info);
                }
            }
        });
    }

    impl WindowObserver for WinEventObserver {
        fn poll(&self) -> Option<WindowInfo> {
            let hwnd = unsafe { GetForegroundWindow() };
            window_info(hwnd, &self.processes)
        }

        fn subscribe(&self, events: UnboundedSender<WindowInfo>) -> Result<Subscription, ObserverError> {
            let (ready_tx, ready_rx) = mpsc::channel::<Result<u32, ObserverError>>();

            let thread = std::thread::spawn(move || {
                HOOK_SINK.with(|sink| {
                    *sink.borrow_mut() = Some(HookSink {
                        events,
                        processes: ProcessNames::new(),
                    })
                });

                let hook = unsafe {
                    SetWinEventHook(
                        EVENT_SYSTEM_FOREGROUND,
                        EVENT_SYSTEM_FOREGROUND,
                        null_mut(),
                        Some(on_foreground_change),
                        0,
                        0,
                        WINEVENT_OUTOFCONTEXT,
                    )
                };
                if hook.is_null() {
                    let _ = ready_tx.send(Err(ObserverError::Registration("SetWinEventHook returned null".to_string())));
                    return;
                }

                let _ = ready_tx.send(Ok(unsafe { GetCurrentThreadId() }));

                unsafe {
                    let mut msg: MSG = std::mem::zeroed();
                    while GetMessageW(&mut msg, null_mut(), 0, 0) > 0 {
                        TranslateMessage(&msg);
                        DispatchMessageW(&msg);
                    }
                    UnhookWinEvent(hook);
                }

                HOOK_SINK.with(|sink| sink.borrow_mut().take());
            });

            let thread_id = match ready_rx.recv() {
                Ok(Ok(thread_id)) => thread_id,
                Ok(Err(e)) => {
                    let _ = thread.join();
                    return Err(e);
                }
                Err(_) => {
                    let _ = thread.join();
                    return Err(ObserverError::Registration("listener thread exited".to_string()));
                }
            };

            Ok(Subscription::new(Some(thread), move || unsafe {
                PostThreadMessageW(thread_id, WM_QUIT, 0, 0);
            }))
        }
    }
}

#[cfg(target_os = "linux")]
pub mod x11 {
    use super::{ObserverError, ProcessNames, Subscription, WindowInfo, WindowObserver};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedSender;
    use x11rb::connection::Connection;
    use x11rb::protocol::xproto::{Atom, AtomEnum, ChangeWindowAttributesAux, ConnectionExt, EventMask, Window};
    use x11rb::protocol::Event;
    use x11rb::rust_connection::RustConnection;

    const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

    struct Atoms {
        net_active_window: Atom,
        net_wm_name: Atom,
        net_wm_pid: Atom,
        utf8_string: Atom,
    }

    struct X11Session {
        conn: RustConnection,
        root: Window,
        atoms: Atoms,
    }

    impl X11Session {
        fn connect() -> Result<Self, ObserverError> {
            let (conn, screen_num) = x11rb::connect(None).map_err(|e| ObserverError::Connection(e.to_string()))?;
            let root = conn.setup().roots[screen_num].root;
            let intern = |name: &str| -> Result<Atom, ObserverError> {
                conn.intern_atom(false, name.as_bytes())
                    .map_err(|e| ObserverError::Connection(e.to_string()))?
                    .reply()
                    .map(|reply| reply.atom)
                    .map_err(|e| ObserverError::Connection(e.to_string()))
            };
            let atoms = Atoms {
                net_active_window: intern("_NET_ACTIVE_WINDOW")?,
                net_wm_name: intern("_NET_WM_NAME")?,
                net_wm_pid: intern("_NET_WM_PID")?,
                utf8_string: intern("UTF8_STRING")?,
            };
            Ok(Self { conn, root, atoms })
        }

        fn active_window(&self) -> Option<Window> {
            let reply = self
                .conn
                .get_property(false, self.root, self.atoms.net_active_window, AtomEnum::WINDOW, 0, 1)
                .ok()?
                .reply()
                .ok()?;
            let window = reply.value32()?.next();
            window.filter(|window| *window != 0)
        }

        fn string_property(&self, window: Window, property: Atom, kind: Atom) -> Option<String> {
            let reply = self.conn.get_property(false, window, property, kind, 0, 1024).ok()?.reply().ok()?;
            if reply.value.is_empty() {
                return None;
            }
            Some(String::from_utf8_lossy(&reply.value).into_owned())
        }

        fn pid(&self, window: Window) -> Option<u32> {
            let reply = self
                .conn
                .get_property(false, window, self.atoms.net_wm_pid, AtomEnum::CARDINAL, 0, 1)
                .ok()?
                .reply()
                .ok()?;
            let pid = reply.value32()?.next();
            pid
        }

        fn window_info(&self, processes: &ProcessNames) -> Option<WindowInfo> {
            let window = self.active_window()?;

            let window_title = self
                .string_property(window, self.atoms.net_wm_name, self.atoms.utf8_string)
                .or_else(|| self.string_property(window, AtomEnum::WM_NAME.into(), AtomEnum::STRING.into()))
                .unwrap_or_default();

            // WM_CLASS is "instance\0class\0"; the class is the stable application name.
            let app_name = self.pid(window).and_then(|pid| processes.name_of(pid)).or_else(|| {
                self.string_property(window, AtomEnum::WM_CLASS.into(), AtomEnum::STRING.into())
                    .and_then(|class| class.split('\0').filter(|part| !part.is_empty()).last().map(str::to_string))
            })?;

            Some(WindowInfo { app_name, window_title })
        }
    }

    pub struct X11Observer {
        session: Mutex<X11Session>,
        processes: Arc<ProcessNames>,
    }

    impl X11Observer {
        pub fn connect() -> Result<Self, ObserverError> {
            Ok(Self {
                session: Mutex::new(X11Session::connect()?),
                processes: Arc::new(ProcessNames::new()),
            })
        }
    }

    impl WindowObserver for X11Observer {
        fn poll(&self) -> Option<WindowInfo> {
            self.session.lock().window_info(&self.processes)
        }

        fn subscribe(&self, events: UnboundedSender<WindowInfo>) -> Result<Subscription, ObserverError> {
            // The listener gets its own connection so polls never consume its events.
            let session = X11Session::connect()?;
            let aux = ChangeWindowAttributesAux::new().event_mask(EventMask::PROPERTY_CHANGE);
            session
                .conn
                .change_window_attributes(session.root, &aux)
                .map_err(|e| ObserverError::Registration(e.to_string()))?
                .check()
                .map_err(|e| ObserverError::Registration(e.to_string()))?;
            session.conn.flush().map_err(|e| ObserverError::Registration(e.to_string()))?;

            let stop = Arc::new(AtomicBool::new(false));
            let stop_flag = stop.clone();
            let processes = self.processes.clone();

            let thread = std::thread::spawn(move || {
                let mut last: Option<WindowInfo> = None;
                while !stop_flag.load(Ordering::SeqCst) {
                    match session.conn.poll_for_event() {
                        Ok(Some(Event::PropertyNotify(event))) if event.atom == session.atoms.net_active_window => {
                            let Some(info) = session.window_info(&processes) else {
                                continue;
                            };
                            if last.as_ref() != Some(&info) {
                                if events.send(info.clone()).is_err() {
                                    break;
                                }
                                last = Some(info);
                            }
                        }
                        Ok(Some(_)) => {}
                        Ok(None) => std::thread::sleep(EVENT_POLL_INTERVAL),
                        Err(e) => {
                            tracing::warn!("X11 event stream closed: {}", e);
                            break;
                        }
                    }
                }
            });

            Ok(Subscription::new(Some(thread), move || stop.store(true, Ordering::SeqCst)))
        }
    }
}
