//! Given a top-level window handle, resolves its visible bounds and, for
//! UWP host frames, the real content window underneath.

use crate::platform::{WindowHandle, WindowManager};
use crate::primitives::Rectangle;

/// Process name of the host frame UWP apps are shown inside of. Apps hosted
/// this way report their own bounds from a child window, not the frame.
const UWP_HOST_PROCESS_NAME: &str = "ApplicationFrameHost.exe";

pub struct WindowInspector {
    window_manager: Box<dyn WindowManager>,
}

impl WindowInspector {
    pub fn new(window_manager: Box<dyn WindowManager>) -> Self {
        WindowInspector { window_manager }
    }

    pub fn foreground_window(&self) -> Option<WindowHandle> {
        self.window_manager.foreground_window()
    }

    /// Prefers the DWM-extended frame (excludes invisible drop-shadow
    /// borders); falls back to the raw window rectangle if that lookup
    /// fails. Returns `None` only when both fail.
    pub fn visible_bounds(&self, handle: WindowHandle) -> Option<Rectangle> {
        self.window_manager
            .extended_frame_bounds(handle)
            .or_else(|| self.window_manager.raw_window_bounds(handle))
    }

    /// If `handle`'s owning process is the UWP host frame, returns the
    /// largest-area visible direct child (the heuristic is adequate because
    /// the content window dominates the frame by construction). Otherwise
    /// returns `handle` unchanged.
    pub fn resolve_uwp_content(&self, handle: WindowHandle) -> WindowHandle {
        let is_host = self
            .window_manager
            .process_name(handle)
            .map(|name| name.eq_ignore_ascii_case(UWP_HOST_PROCESS_NAME))
            .unwrap_or(false);

        if !is_host {
            return handle;
        }

        let children = self.window_manager.visible_child_windows(handle);
        let largest = children.into_iter().max_by_key(|child| {
            self.window_manager
                .raw_window_bounds(*child)
                .map(|b| b.width as i64 * b.height as i64)
                .unwrap_or(0)
        });

        largest.unwrap_or(handle)
    }

    pub fn is_maximized(&self, handle: WindowHandle) -> bool {
        self.window_manager.is_maximized(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeWindowManager {
        foreground: Option<WindowHandle>,
        extended_bounds: HashMap<usize, Rectangle>,
        raw_bounds: HashMap<usize, Rectangle>,
        process_names: HashMap<usize, String>,
        children: HashMap<usize, Vec<WindowHandle>>,
        maximized: RefCell<HashMap<usize, bool>>,
    }

    impl WindowManager for FakeWindowManager {
        fn foreground_window(&self) -> Option<WindowHandle> {
            self.foreground
        }

        fn extended_frame_bounds(&self, handle: WindowHandle) -> Option<Rectangle> {
            self.extended_bounds.get(&handle.0).copied()
        }

        fn raw_window_bounds(&self, handle: WindowHandle) -> Option<Rectangle> {
            self.raw_bounds.get(&handle.0).copied()
        }

        fn process_name(&self, handle: WindowHandle) -> Option<String> {
            self.process_names.get(&handle.0).cloned()
        }

        fn visible_child_windows(&self, handle: WindowHandle) -> Vec<WindowHandle> {
            self.children.get(&handle.0).cloned().unwrap_or_default()
        }

        fn is_maximized(&self, handle: WindowHandle) -> bool {
            self.maximized.borrow().get(&handle.0).copied().unwrap_or(false)
        }
    }

    #[test]
    fn visible_bounds_prefers_dwm_extended_frame() {
        let mut fake = FakeWindowManager::default();
        fake.extended_bounds.insert(1, Rectangle::new(0, 0, 800, 600));
        fake.raw_bounds.insert(1, Rectangle::new(-5, -5, 810, 610));
        let inspector = WindowInspector::new(Box::new(fake));
        assert_eq!(inspector.visible_bounds(WindowHandle(1)), Some(Rectangle::new(0, 0, 800, 600)));
    }

    #[test]
    fn visible_bounds_falls_back_to_raw_rect() {
        let mut fake = FakeWindowManager::default();
        fake.raw_bounds.insert(1, Rectangle::new(1, 2, 3, 4));
        let inspector = WindowInspector::new(Box::new(fake));
        assert_eq!(inspector.visible_bounds(WindowHandle(1)), Some(Rectangle::new(1, 2, 3, 4)));
    }

    #[test]
    fn visible_bounds_none_when_both_fail() {
        let inspector = WindowInspector::new(Box::new(FakeWindowManager::default()));
        assert_eq!(inspector.visible_bounds(WindowHandle(1)), None);
    }

    #[test]
    fn resolve_uwp_content_passes_through_non_host_processes() {
        let mut fake = FakeWindowManager::default();
        fake.process_names.insert(1, "notepad.exe".to_string());
        let inspector = WindowInspector::new(Box::new(fake));
        assert_eq!(inspector.resolve_uwp_content(WindowHandle(1)), WindowHandle(1));
    }

    #[test]
    fn resolve_uwp_content_picks_largest_visible_child() {
        let mut fake = FakeWindowManager::default();
        fake.process_names.insert(1, "ApplicationFrameHost.exe".to_string());
        fake.children.insert(1, vec![WindowHandle(2), WindowHandle(3)]);
        fake.raw_bounds.insert(2, Rectangle::new(0, 0, 100, 100));
        fake.raw_bounds.insert(3, Rectangle::new(0, 0, 800, 600));
        let inspector = WindowInspector::new(Box::new(fake));
        assert_eq!(inspector.resolve_uwp_content(WindowHandle(1)), WindowHandle(3));
    }

    #[test]
    fn resolve_uwp_content_falls_back_to_host_when_no_children() {
        let mut fake = FakeWindowManager::default();
        fake.process_names.insert(1, "ApplicationFrameHost.exe".to_string());
        let inspector = WindowInspector::new(Box::new(fake));
        assert_eq!(inspector.resolve_uwp_content(WindowHandle(1)), WindowHandle(1));
    }
}
