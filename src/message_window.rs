//! A hidden top-level window owned by the engine thread. It is the single
//! marshaling point OS callbacks (arbitrary threads) funnel into before
//! anything touches the AppState or the overlay window pool.
//!
//! This is deliberately NOT a message-only window (`HWND_MESSAGE`): those
//! cannot receive broadcast messages like `WM_DISPLAYCHANGE`. A hidden
//! top-level popup window (`WS_EX_TOOLWINDOW`, never shown) receives
//! broadcasts while staying out of the taskbar and Alt+Tab.

use std::cell::Cell;
use std::ffi::OsStr;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use std::sync::mpsc::Sender;
use winapi::shared::minwindef::{LPARAM, LRESULT, UINT, UINT_PTR, WPARAM};
use winapi::shared::windef::HWND;
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::libloaderapi::GetModuleHandleW;
use winapi::um::winuser::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, GetForegroundWindow, GetWindowLongPtrW,
    KillTimer, PostMessageW, RegisterClassExW, SetTimer, SetWindowLongPtrW, GWLP_USERDATA,
    WM_DISPLAYCHANGE, WM_NCDESTROY, WM_TIMER, WNDCLASSEXW, WS_EX_TOOLWINDOW, WS_POPUP,
};

const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;

/// Custom message posted from any thread to request one focus observation
/// be (re-)derived and fed through the Focus-Change Decider. No payload is
/// carried: the engine thread re-queries the OS state itself at receipt
/// time, which keeps the cross-thread hop allocation-free.
const WM_APP: UINT = 0x8000;
pub const FOCUS_OBSERVATION_MSG: UINT = WM_APP + 1;

const DISPLAY_CHANGE_REFIRE_TIMER_ID: UINT_PTR = 1;
const SAFETY_POLL_TIMER_ID: UINT_PTR = 2;

/// Safety-poll interval (§4.5): re-reads the foreground handle even when no
/// hook fired.
pub const SAFETY_POLL_INTERVAL_MS: u32 = 100;

/// Re-fire delay after a `WM_DISPLAYCHANGE` broadcast (§4.6): the OS may
/// deliver the broadcast before the display inventory has settled.
pub const DISPLAY_CHANGE_REFIRE_DELAY_MS: u32 = 2_000;

/// Events the message window marshals onto the engine thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    FocusObservationReady,
    CheckDisplaysRequested,
}

/// Thread-safe wrapper for `HWND`. Kernel handles are safe to pass between
/// threads as integers; only the engine thread dereferences this as a real
/// window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageWindowHandle(usize);

unsafe impl Send for MessageWindowHandle {}

impl MessageWindowHandle {
    pub fn as_hwnd(&self) -> HWND {
        self.0 as HWND
    }
}

/// Everything the wndproc needs, addressed through one `GWLP_USERDATA`
/// pointer: the event sender, plus the last foreground handle seen by the
/// safety poll (§4.5: the poll only posts when that handle changes).
struct WindowState {
    sender: Sender<EngineEvent>,
    last_foreground: Cell<HWND>,
}

pub struct MessageWindow {
    hwnd: HWND,
    // Kept alive for the window's lifetime: wndproc reads this pointer out
    // of GWLP_USERDATA on every message.
    _state: Box<WindowState>,
}

impl MessageWindow {
    pub fn new(sender: Sender<EngineEvent>) -> Result<Self, String> {
        unsafe {
            let class_name = to_wstring("SpotlightDimmerEngineMessageWindow");
            let hinstance = GetModuleHandleW(ptr::null());

            let wnd_class = WNDCLASSEXW {
                cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
                style: 0,
                lpfnWndProc: Some(message_window_proc),
                cbClsExtra: 0,
                cbWndExtra: 0,
                hInstance: hinstance,
                hIcon: ptr::null_mut(),
                hCursor: ptr::null_mut(),
                hbrBackground: ptr::null_mut(),
                lpszMenuName: ptr::null(),
                lpszClassName: class_name.as_ptr(),
                hIconSm: ptr::null_mut(),
            };

            if RegisterClassExW(&wnd_class) == 0 {
                let err = GetLastError();
                if err != ERROR_CLASS_ALREADY_EXISTS {
                    return Err(format!("failed to register message window class: error {}", err));
                }
            }

            let window_name = to_wstring("Spotlight Dimmer Engine");
            let hwnd = CreateWindowExW(
                WS_EX_TOOLWINDOW,
                class_name.as_ptr(),
                window_name.as_ptr(),
                WS_POPUP,
                0,
                0,
                0,
                0,
                ptr::null_mut(), // NULL parent: top-level window, required to receive broadcasts
                ptr::null_mut(),
                hinstance,
                ptr::null_mut(),
            );

            if hwnd.is_null() {
                let err = GetLastError();
                return Err(format!("failed to create engine message window: error {}", err));
            }

            let boxed_state = Box::new(WindowState { sender, last_foreground: Cell::new(ptr::null_mut()) });
            SetWindowLongPtrW(hwnd, GWLP_USERDATA, Box::as_ref(&boxed_state) as *const _ as isize);

            log::info!(target: "message_window", "engine message window created");
            Ok(MessageWindow { hwnd, _state: boxed_state })
        }
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    pub fn handle(&self) -> MessageWindowHandle {
        MessageWindowHandle(self.hwnd as usize)
    }

    pub fn arm_safety_poll(&self) {
        unsafe {
            SetTimer(self.hwnd, SAFETY_POLL_TIMER_ID, SAFETY_POLL_INTERVAL_MS, None);
        }
    }

    pub fn disarm_safety_poll(&self) {
        unsafe {
            KillTimer(self.hwnd, SAFETY_POLL_TIMER_ID);
        }
    }
}

/// Posts a focus-observation request from any thread, given only the
/// engine message window's handle. Used both by OS hook callbacks and by
/// the safety-poll timer path.
pub fn post_focus_observation(handle: MessageWindowHandle) {
    unsafe {
        PostMessageW(handle.as_hwnd(), FOCUS_OBSERVATION_MSG, 0, 0);
    }
}

impl Drop for MessageWindow {
    fn drop(&mut self) {
        unsafe {
            KillTimer(self.hwnd, DISPLAY_CHANGE_REFIRE_TIMER_ID);
            KillTimer(self.hwnd, SAFETY_POLL_TIMER_ID);
            DestroyWindow(self.hwnd);
        }
        log::info!(target: "message_window", "engine message window destroyed");
    }
}

unsafe extern "system" fn message_window_proc(hwnd: HWND, msg: UINT, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    let state_ptr = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const WindowState;

    match msg {
        FOCUS_OBSERVATION_MSG => {
            if let Some(state) = state_ptr.as_ref() {
                let _ = state.sender.send(EngineEvent::FocusObservationReady);
            }
            0
        }
        WM_DISPLAYCHANGE => {
            if let Some(state) = state_ptr.as_ref() {
                let _ = state.sender.send(EngineEvent::CheckDisplaysRequested);
            }
            SetTimer(hwnd, DISPLAY_CHANGE_REFIRE_TIMER_ID, DISPLAY_CHANGE_REFIRE_DELAY_MS, None);
            0
        }
        WM_TIMER => {
            match wparam as UINT_PTR {
                DISPLAY_CHANGE_REFIRE_TIMER_ID => {
                    KillTimer(hwnd, DISPLAY_CHANGE_REFIRE_TIMER_ID);
                    if let Some(state) = state_ptr.as_ref() {
                        let _ = state.sender.send(EngineEvent::CheckDisplaysRequested);
                    }
                }
                SAFETY_POLL_TIMER_ID => {
                    if let Some(state) = state_ptr.as_ref() {
                        // §4.5: only post when the foreground handle actually
                        // differs from the last tick's, rather than every
                        // 100 ms unconditionally.
                        let current = GetForegroundWindow();
                        if current != state.last_foreground.get() {
                            state.last_foreground.set(current);
                            let _ = state.sender.send(EngineEvent::FocusObservationReady);
                        }
                    }
                }
                _ => {}
            }
            0
        }
        WM_NCDESTROY => {
            // Drop is responsible for freeing the boxed state; nothing to
            // do here beyond not touching it again.
            DefWindowProcW(hwnd, msg, wparam, lparam)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

fn to_wstring(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}
