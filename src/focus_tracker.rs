//! Subscribes to OS foreground and object-location change notifications on
//! a dedicated thread, plus a 100 ms safety poll, and marshals every
//! accepted event onto the engine thread via the shared message window.
//! Produces no observations itself: the engine thread re-derives the
//! current (display index, bounds) pair when it receives the marshaled
//! event, which keeps this module free of window-inspection logic.

use crate::message_window::{self, MessageWindowHandle};
use lazy_static::lazy_static;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use winapi::shared::minwindef::DWORD;
use winapi::shared::windef::{HWINEVENTHOOK, HWND};
use winapi::um::winuser::{
    DispatchMessageW, GetForegroundWindow, GetMessageW, PostThreadMessageW, SetWinEventHook,
    TranslateMessage, UnhookWinEvent, MSG, WM_QUIT,
};

const EVENT_SYSTEM_FOREGROUND: DWORD = 0x0003;
const EVENT_OBJECT_LOCATIONCHANGE: DWORD = 0x800B;
const WINEVENT_OUTOFCONTEXT: DWORD = 0x0000;
const OBJID_WINDOW: i32 = 0x0000_0000;

/// Process-wide weak handle to the engine message window (§9 "Global
/// mutable state"): `WinEventProc` cannot carry user data, so it reaches
/// the engine thread through this cell instead. Populated at tracker-start,
/// cleared at tracker-stop; the callback no-ops when the cell is empty.
lazy_static! {
    static ref ENGINE_MESSAGE_WINDOW: Mutex<Option<MessageWindowHandle>> = Mutex::new(None);
}

pub struct FocusTracker {
    hook_thread: Option<JoinHandle<()>>,
    hook_thread_id: Arc<AtomicThreadId>,
    stopped: Arc<AtomicBool>,
}

#[derive(Default)]
struct AtomicThreadId(std::sync::atomic::AtomicU32);

impl FocusTracker {
    pub fn start(message_window: MessageWindowHandle) -> Result<Self, String> {
        *ENGINE_MESSAGE_WINDOW.lock().unwrap() = Some(message_window);

        let hook_thread_id = Arc::new(AtomicThreadId::default());
        let hook_thread_id_for_thread = hook_thread_id.clone();
        let stopped = Arc::new(AtomicBool::new(false));
        let stopped_for_thread = stopped.clone();

        let handle = std::thread::Builder::new()
            .name("spotlight-dimmer-focus-hook".into())
            .spawn(move || run_hook_thread(hook_thread_id_for_thread, stopped_for_thread))
            .map_err(|e| format!("failed to spawn focus hook thread: {}", e))?;

        Ok(FocusTracker { hook_thread: Some(handle), hook_thread_id, stopped })
    }

    /// Unregisters hooks, kills the dedicated thread, and clears the static
    /// routing cell so any in-flight callback becomes a no-op.
    pub fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);

        let thread_id = self.hook_thread_id.0.load(Ordering::SeqCst);
        if thread_id != 0 {
            unsafe {
                PostThreadMessageW(thread_id, WM_QUIT, 0, 0);
            }
        }

        if let Some(handle) = self.hook_thread.take() {
            let _ = handle.join();
        }

        *ENGINE_MESSAGE_WINDOW.lock().unwrap() = None;
    }
}

impl Drop for FocusTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_hook_thread(thread_id_cell: Arc<AtomicThreadId>, stopped: Arc<AtomicBool>) {
    unsafe {
        let this_thread_id = winapi::um::processthreadsapi::GetCurrentThreadId();
        thread_id_cell.0.store(this_thread_id, Ordering::SeqCst);

        let foreground_hook = SetWinEventHook(
            EVENT_SYSTEM_FOREGROUND,
            EVENT_SYSTEM_FOREGROUND,
            std::ptr::null_mut(),
            Some(win_event_proc),
            0,
            0,
            WINEVENT_OUTOFCONTEXT,
        );
        let location_hook = SetWinEventHook(
            EVENT_OBJECT_LOCATIONCHANGE,
            EVENT_OBJECT_LOCATIONCHANGE,
            std::ptr::null_mut(),
            Some(win_event_proc),
            0,
            0,
            WINEVENT_OUTOFCONTEXT,
        );

        if foreground_hook.is_null() || location_hook.is_null() {
            log::error!(target: "focus_tracker", "SetWinEventHook failed to register");
        }

        let mut msg: MSG = std::mem::zeroed();
        while !stopped.load(Ordering::SeqCst) {
            let result = GetMessageW(&mut msg, std::ptr::null_mut(), 0, 0);
            if result <= 0 {
                break;
            }
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }

        if !foreground_hook.is_null() {
            UnhookWinEvent(foreground_hook);
        }
        if !location_hook.is_null() {
            UnhookWinEvent(location_hook);
        }
    }
}

unsafe extern "system" fn win_event_proc(
    _hook: HWINEVENTHOOK,
    event: DWORD,
    hwnd: HWND,
    id_object: i32,
    _id_child: i32,
    _id_event_thread: DWORD,
    _event_time: DWORD,
) {
    let accepted = match event {
        EVENT_SYSTEM_FOREGROUND => true,
        EVENT_OBJECT_LOCATIONCHANGE => {
            id_object == OBJID_WINDOW && !hwnd.is_null() && hwnd == GetForegroundWindow()
        }
        _ => false,
    };

    if !accepted {
        return;
    }

    if let Ok(guard) = ENGINE_MESSAGE_WINDOW.lock() {
        if let Some(handle) = *guard {
            message_window::post_focus_observation(handle);
        }
    }
}
