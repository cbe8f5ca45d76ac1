//! Seam between the platform-agnostic engine and the OS. `windows.rs`
//! supplies the only concrete implementation; non-Windows builds get a stub
//! that reports no displays and no foreground window so the crate still
//! type-checks off Windows.

use crate::error::CoreResult;
use crate::primitives::Rectangle;

#[cfg(windows)]
pub mod windows;

/// Opaque OS window handle. Kernel handles are safe to copy and pass
/// between threads as plain integers; the unsafety is in dereferencing them,
/// which only the platform-specific backend does, and only on the thread
/// that owns the corresponding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub usize);

unsafe impl Send for WindowHandle {}

/// One monitor as reported by the OS enumerator, before it is assigned a
/// stable-within-snapshot index by the Monitor Inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDisplay {
    pub bounds: Rectangle,
    pub is_primary: bool,
}

pub trait DisplayManager {
    fn enumerate_displays(&self) -> CoreResult<Vec<RawDisplay>>;
}

pub trait WindowManager {
    fn foreground_window(&self) -> Option<WindowHandle>;

    /// DWM's extended frame bounds (excludes the invisible drop-shadow
    /// border). `None` means the DWM lookup failed.
    fn extended_frame_bounds(&self, handle: WindowHandle) -> Option<Rectangle>;

    /// Raw `GetWindowRect`-equivalent bounds, used as a fallback when the
    /// DWM lookup is unavailable.
    fn raw_window_bounds(&self, handle: WindowHandle) -> Option<Rectangle>;

    fn process_name(&self, handle: WindowHandle) -> Option<String>;

    /// Direct, currently-visible child windows of `handle`, in OS-reported
    /// order.
    fn visible_child_windows(&self, handle: WindowHandle) -> Vec<WindowHandle>;

    fn is_maximized(&self, handle: WindowHandle) -> bool;
}

#[cfg(not(windows))]
mod stub {
    use super::*;

    pub struct NullDisplayManager;

    impl DisplayManager for NullDisplayManager {
        fn enumerate_displays(&self) -> CoreResult<Vec<RawDisplay>> {
            Err(crate::error::CoreError::MonitorEnumerationEmpty)
        }
    }

    pub struct NullWindowManager;

    impl WindowManager for NullWindowManager {
        fn foreground_window(&self) -> Option<WindowHandle> {
            None
        }

        fn extended_frame_bounds(&self, _handle: WindowHandle) -> Option<Rectangle> {
            None
        }

        fn raw_window_bounds(&self, _handle: WindowHandle) -> Option<Rectangle> {
            None
        }

        fn process_name(&self, _handle: WindowHandle) -> Option<String> {
            None
        }

        fn visible_child_windows(&self, _handle: WindowHandle) -> Vec<WindowHandle> {
            Vec::new()
        }

        fn is_maximized(&self, _handle: WindowHandle) -> bool {
            false
        }
    }
}

#[cfg(not(windows))]
pub use stub::{NullDisplayManager as DefaultDisplayManager, NullWindowManager as DefaultWindowManager};

#[cfg(windows)]
pub use windows::{WindowsDisplayManager as DefaultDisplayManager, WindowsWindowManager as DefaultWindowManager};
