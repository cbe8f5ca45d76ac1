//! Owns a pool of click-through, always-on-top rectangular windows — six
//! per display — and applies `AppState` to them as an atomic batch. The
//! renderer is specified as a capability set so the configured backend
//! string can select among substitutable implementations (§9 "Dynamic
//! dispatch over renderer backends"); only `LayeredWindow` has a concrete
//! Windows implementation here, grounded directly in this project's
//! existing overlay window pool (`examples/thomazmoura-spotlight-dimmer/src/overlay.rs`).

use crate::error::{CoreError, CoreResult};
use crate::monitor::DisplayInfo;
use crate::overlay_calculator::{AppState, OverlayCalculationConfig, OverlayDefinition};
use crate::primitives::OverlayRegion;

/// `{ create_overlays, update_brush_colors, update_overlays,
/// update_screen_capture_exclusion, hide_all_overlays, cleanup_overlays,
/// dispose }` — any concrete backend satisfying this set is substitutable.
pub trait RendererBackend {
    fn create_overlays(&mut self, displays: &[DisplayInfo], config: &OverlayCalculationConfig) -> CoreResult<()>;
    fn update_overlays(&mut self, state: &AppState) -> CoreResult<()>;
    fn update_brush_colors(&mut self, config: &OverlayCalculationConfig) -> CoreResult<()>;
    fn update_screen_capture_exclusion(&mut self, exclude: bool) -> usize;
    fn hide_all_overlays(&mut self);
    fn cleanup_overlays(&mut self);
    fn dispose(&mut self);
}

/// Maps a configured backend name to an implementation. Unknown strings
/// fall back to the default and are logged, per §9.
pub fn create_renderer_backend(name: &str) -> Box<dyn RendererBackend> {
    match name {
        "LayeredWindow" => Box::new(windows_backend::LayeredWindowRenderer::new()),
        "UpdateLayeredWindow" | "CompositeOverlay" => {
            log::warn!(
                target: "overlay_renderer",
                "renderer backend '{}' has no dedicated implementation; falling back to LayeredWindow",
                name
            );
            Box::new(windows_backend::LayeredWindowRenderer::new())
        }
        other => {
            log::warn!(target: "overlay_renderer", "unknown renderer backend '{}', falling back to LayeredWindow", other);
            Box::new(windows_backend::LayeredWindowRenderer::new())
        }
    }
}

#[cfg(windows)]
pub mod windows_backend {
    use super::*;
    use crate::primitives::Rectangle;
    use std::ffi::OsStr;
    use std::mem;
    use std::os::windows::ffi::OsStrExt;
    use std::ptr;
    use winapi::shared::minwindef::DWORD;
    use winapi::shared::windef::{HBRUSH, HWND};
    use winapi::um::errhandlingapi::GetLastError;
    use winapi::um::libloaderapi::GetModuleHandleW;
    use winapi::um::wingdi::{CreateSolidBrush, DeleteObject};
    use winapi::um::winuser::{
        BeginDeferWindowPos, CreateWindowExW, DefWindowProcW, DeferWindowPos, DestroyWindow,
        EndDeferWindowPos, RegisterClassExW, SetClassLongPtrW, SetLayeredWindowAttributes,
        ShowWindow, GCLP_HBRBACKGROUND, LWA_ALPHA, SW_HIDE, SWP_HIDEWINDOW, SWP_NOACTIVATE,
        SWP_NOREDRAW, SWP_NOZORDER, SWP_SHOWWINDOW, WNDCLASSEXW, WS_EX_LAYERED, WS_EX_NOACTIVATE,
        WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_EX_TRANSPARENT, WS_POPUP,
    };

    const ERROR_CLASS_ALREADY_EXISTS: u32 = 1410;
    const WDA_NONE: DWORD = 0x0000_0000;
    const WDA_EXCLUDEFROMCAPTURE: DWORD = 0x0000_0011;

    #[link(name = "user32")]
    extern "system" {
        fn SetWindowDisplayAffinity(hwnd: HWND, dw_affinity: DWORD) -> i32;
    }

    struct DisplayWindows {
        hwnds: [HWND; 6],
        brushes: [HBRUSH; 6],
    }

    pub struct LayeredWindowRenderer {
        class_registered: bool,
        pools: Vec<DisplayWindows>,
        last_applied: Vec<[OverlayDefinition; 6]>,
    }

    impl LayeredWindowRenderer {
        pub fn new() -> Self {
            LayeredWindowRenderer { class_registered: false, pools: Vec::new(), last_applied: Vec::new() }
        }

        fn ensure_class_registered(&mut self) -> CoreResult<()> {
            if self.class_registered {
                return Ok(());
            }
            unsafe {
                let class_name = to_wstring("SpotlightDimmerOverlayWindow");
                let hinstance = GetModuleHandleW(ptr::null());
                let wnd_class = WNDCLASSEXW {
                    cbSize: mem::size_of::<WNDCLASSEXW>() as u32,
                    style: 0,
                    lpfnWndProc: Some(overlay_window_proc),
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
                        return Err(CoreError::WindowCreationFailed(format!(
                            "RegisterClassExW failed: error {}",
                            err
                        )));
                    }
                }
            }
            self.class_registered = true;
            Ok(())
        }

        fn create_window(&self, bounds: Rectangle) -> CoreResult<HWND> {
            unsafe {
                let class_name = to_wstring("SpotlightDimmerOverlayWindow");
                let window_name = to_wstring("Spotlight Dimmer Overlay");
                let hinstance = GetModuleHandleW(ptr::null());

                let hwnd = CreateWindowExW(
                    WS_EX_LAYERED | WS_EX_TRANSPARENT | WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                    class_name.as_ptr(),
                    window_name.as_ptr(),
                    WS_POPUP,
                    bounds.x,
                    bounds.y,
                    bounds.width.max(1),
                    bounds.height.max(1),
                    ptr::null_mut(),
                    ptr::null_mut(),
                    hinstance,
                    ptr::null_mut(),
                );

                if hwnd.is_null() {
                    let err = GetLastError();
                    return Err(CoreError::WindowCreationFailed(format!(
                        "CreateWindowExW failed: error {}",
                        err
                    )));
                }

                Ok(hwnd)
            }
        }
    }

    impl RendererBackend for LayeredWindowRenderer {
        fn create_overlays(&mut self, displays: &[DisplayInfo], config: &OverlayCalculationConfig) -> CoreResult<()> {
            self.cleanup_overlays();
            self.ensure_class_registered()?;

            for display in displays {
                let mut hwnds = [ptr::null_mut(); 6];
                let mut brushes = [ptr::null_mut(); 6];

                for region in OverlayRegion::ALL {
                    let hwnd = self.create_window(display.bounds)?;
                    let (color, opacity) = if region == OverlayRegion::Center {
                        (config.active_color, config.active_opacity)
                    } else {
                        (config.inactive_color, config.inactive_opacity)
                    };

                    unsafe {
                        let brush = CreateSolidBrush(color.to_colorref());
                        SetClassLongPtrW(hwnd, GCLP_HBRBACKGROUND, brush as isize);
                        SetLayeredWindowAttributes(hwnd, 0, opacity, LWA_ALPHA);
                        ShowWindow(hwnd, SW_HIDE);
                        brushes[region.index()] = brush;
                    }
                    hwnds[region.index()] = hwnd;
                }

                self.pools.push(DisplayWindows { hwnds, brushes });
                self.last_applied.push(OverlayRegion::ALL.map(|r| {
                    let mut def = OverlayDefinition::new(r);
                    def.bounds = display.bounds;
                    def
                }));
            }

            Ok(())
        }

        fn update_overlays(&mut self, state: &AppState) -> CoreResult<()> {
            if state.displays.len() != self.pools.len() {
                return Err(CoreError::DisplayChangeDuringUpdate);
            }

            unsafe {
                let total_windows = self.pools.len() * 6;
                let mut defer = BeginDeferWindowPos(total_windows as i32);
                if defer.is_null() {
                    return Err(CoreError::WindowUpdateFailed("BeginDeferWindowPos failed".into()));
                }

                for (pool_index, display_state) in state.displays.iter().enumerate() {
                    let pool = &self.pools[pool_index];
                    let previous = &mut self.last_applied[pool_index];

                    for overlay in &display_state.overlays {
                        let slot = overlay.region.index();
                        if *overlay == previous[slot] {
                            continue;
                        }

                        let hwnd = pool.hwnds[slot];
                        let visibility_flag = if overlay.is_visible { SWP_SHOWWINDOW } else { SWP_HIDEWINDOW };
                        let flags = SWP_NOACTIVATE | SWP_NOZORDER | SWP_NOREDRAW | visibility_flag;
                        let new_defer = DeferWindowPos(
                            defer,
                            hwnd,
                            ptr::null_mut(),
                            overlay.bounds.x,
                            overlay.bounds.y,
                            overlay.bounds.width.max(1),
                            overlay.bounds.height.max(1),
                            flags,
                        );
                        if new_defer.is_null() {
                            log::warn!(target: "overlay_renderer", "DeferWindowPos failed for one overlay window");
                        } else {
                            defer = new_defer;
                        }

                        previous[slot] = *overlay;
                    }
                }

                // Geometry and visibility are both carried in the same
                // DeferWindowPos flags per window, so EndDeferWindowPos
                // commits them together: no intermediate frame with stale
                // visibility and new geometry (or vice versa) is observable.
                if EndDeferWindowPos(defer) == 0 {
                    return Err(CoreError::WindowUpdateFailed("EndDeferWindowPos failed".into()));
                }
            }

            Ok(())
        }

        fn update_brush_colors(&mut self, config: &OverlayCalculationConfig) -> CoreResult<()> {
            for pool in &mut self.pools {
                for region in OverlayRegion::ALL {
                    let slot = region.index();
                    let (color, opacity) = if region == OverlayRegion::Center {
                        (config.active_color, config.active_opacity)
                    } else {
                        (config.inactive_color, config.inactive_opacity)
                    };

                    unsafe {
                        let hwnd = pool.hwnds[slot];
                        let new_brush = CreateSolidBrush(color.to_colorref());
                        let old_brush = pool.brushes[slot];
                        SetClassLongPtrW(hwnd, GCLP_HBRBACKGROUND, new_brush as isize);
                        SetLayeredWindowAttributes(hwnd, 0, opacity, LWA_ALPHA);
                        if !old_brush.is_null() {
                            DeleteObject(old_brush as *mut _);
                        }
                        pool.brushes[slot] = new_brush;
                    }
                }
            }
            Ok(())
        }

        fn update_screen_capture_exclusion(&mut self, exclude: bool) -> usize {
            let affinity = if exclude { WDA_EXCLUDEFROMCAPTURE } else { WDA_NONE };
            let mut accepted = 0usize;
            for pool in &self.pools {
                for &hwnd in &pool.hwnds {
                    unsafe {
                        if SetWindowDisplayAffinity(hwnd, affinity) != 0 {
                            accepted += 1;
                        }
                    }
                }
            }
            accepted
        }

        fn hide_all_overlays(&mut self) {
            for pool in &self.pools {
                for &hwnd in &pool.hwnds {
                    unsafe {
                        ShowWindow(hwnd, SW_HIDE);
                    }
                }
            }
        }

        fn cleanup_overlays(&mut self) {
            for pool in self.pools.drain(..) {
                for i in 0..6 {
                    unsafe {
                        if !pool.hwnds[i].is_null() {
                            DestroyWindow(pool.hwnds[i]);
                        }
                        if !pool.brushes[i].is_null() {
                            DeleteObject(pool.brushes[i] as *mut _);
                        }
                    }
                }
            }
            self.last_applied.clear();
        }

        fn dispose(&mut self) {
            self.cleanup_overlays();
        }
    }

    impl Drop for LayeredWindowRenderer {
        fn drop(&mut self) {
            self.dispose();
        }
    }

    unsafe extern "system" fn overlay_window_proc(
        hwnd: HWND,
        msg: winapi::shared::minwindef::UINT,
        wparam: winapi::shared::minwindef::WPARAM,
        lparam: winapi::shared::minwindef::LPARAM,
    ) -> winapi::shared::minwindef::LRESULT {
        DefWindowProcW(hwnd, msg, wparam, lparam)
    }

    fn to_wstring(s: &str) -> Vec<u16> {
        OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
    }
}

#[cfg(not(windows))]
pub mod windows_backend {
    use super::*;

    pub struct LayeredWindowRenderer;

    impl LayeredWindowRenderer {
        pub fn new() -> Self {
            LayeredWindowRenderer
        }
    }

    impl RendererBackend for LayeredWindowRenderer {
        fn create_overlays(&mut self, _displays: &[DisplayInfo], _config: &OverlayCalculationConfig) -> CoreResult<()> {
            Err(CoreError::WindowCreationFailed("overlay rendering requires Windows".into()))
        }
        fn update_overlays(&mut self, _state: &AppState) -> CoreResult<()> {
            Ok(())
        }
        fn update_brush_colors(&mut self, _config: &OverlayCalculationConfig) -> CoreResult<()> {
            Ok(())
        }
        fn update_screen_capture_exclusion(&mut self, _exclude: bool) -> usize {
            0
        }
        fn hide_all_overlays(&mut self) {}
        fn cleanup_overlays(&mut self) {}
        fn dispose(&mut self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_backend_name_falls_back_without_panicking() {
        let _backend = create_renderer_backend("SomethingMadeUp");
    }
}
