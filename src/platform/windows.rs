use super::{DisplayManager, RawDisplay, WindowHandle, WindowManager};
use crate::error::{CoreError, CoreResult};
use crate::primitives::Rectangle;
use std::mem;
use std::ptr;
use winapi::shared::windef::{HDC, HMONITOR, HWND, LPRECT, RECT};
use winapi::um::dwmapi::{DwmGetWindowAttribute, DWMWA_EXTENDED_FRAME_BOUNDS};
use winapi::um::handleapi::CloseHandle;
use winapi::um::processthreadsapi::OpenProcess;
use winapi::um::psapi::GetModuleBaseNameW;
use winapi::um::winnt::PROCESS_QUERY_INFORMATION;
use winapi::um::winuser::{
    EnumChildWindows, EnumDisplayMonitors, GetForegroundWindow, GetMonitorInfoW, GetWindowRect,
    GetWindowThreadProcessId, IsWindowVisible, IsZoomed, MonitorFromWindow, MONITORINFO,
    MONITOR_DEFAULTTONEAREST,
};

fn rect_to_rectangle(rect: &RECT) -> Rectangle {
    Rectangle::new(rect.left, rect.top, rect.right - rect.left, rect.bottom - rect.top)
}

pub struct WindowsDisplayManager;
pub struct WindowsWindowManager;

impl DisplayManager for WindowsDisplayManager {
    fn enumerate_displays(&self) -> CoreResult<Vec<RawDisplay>> {
        let mut displays: Vec<RawDisplay> = Vec::new();

        unsafe {
            extern "system" fn enum_proc(
                hmonitor: HMONITOR,
                _hdc: HDC,
                _rect: LPRECT,
                lparam: isize,
            ) -> i32 {
                unsafe {
                    let displays = &mut *(lparam as *mut Vec<RawDisplay>);
                    let mut monitor_info: MONITORINFO = mem::zeroed();
                    monitor_info.cbSize = mem::size_of::<MONITORINFO>() as u32;
                    if GetMonitorInfoW(hmonitor, &mut monitor_info) != 0 {
                        displays.push(RawDisplay {
                            bounds: rect_to_rectangle(&monitor_info.rcMonitor),
                            is_primary: monitor_info.dwFlags & 1 != 0, // MONITORINFOF_PRIMARY
                        });
                    }
                }
                1
            }

            EnumDisplayMonitors(
                ptr::null_mut(),
                ptr::null_mut(),
                Some(enum_proc),
                &mut displays as *mut _ as isize,
            );
        }

        if displays.is_empty() {
            Err(CoreError::MonitorEnumerationEmpty)
        } else {
            Ok(displays)
        }
    }
}

impl WindowManager for WindowsWindowManager {
    fn foreground_window(&self) -> Option<WindowHandle> {
        unsafe {
            let hwnd = GetForegroundWindow();
            if hwnd.is_null() {
                None
            } else {
                Some(WindowHandle(hwnd as usize))
            }
        }
    }

    fn extended_frame_bounds(&self, handle: WindowHandle) -> Option<Rectangle> {
        unsafe {
            let hwnd = handle.0 as HWND;
            let mut rect: RECT = mem::zeroed();
            let result = DwmGetWindowAttribute(
                hwnd,
                DWMWA_EXTENDED_FRAME_BOUNDS,
                &mut rect as *mut _ as *mut _,
                mem::size_of::<RECT>() as u32,
            );
            if result == 0 {
                Some(rect_to_rectangle(&rect))
            } else {
                None
            }
        }
    }

    fn raw_window_bounds(&self, handle: WindowHandle) -> Option<Rectangle> {
        unsafe {
            let hwnd = handle.0 as HWND;
            let mut rect: RECT = mem::zeroed();
            if GetWindowRect(hwnd, &mut rect) != 0 {
                Some(rect_to_rectangle(&rect))
            } else {
                None
            }
        }
    }

    fn process_name(&self, handle: WindowHandle) -> Option<String> {
        unsafe {
            let hwnd = handle.0 as HWND;
            let mut process_id = 0u32;
            GetWindowThreadProcessId(hwnd, &mut process_id);
            if process_id == 0 {
                return None;
            }

            let process_handle = OpenProcess(PROCESS_QUERY_INFORMATION, 0, process_id);
            if process_handle.is_null() {
                return None;
            }

            let mut buffer = [0u16; 512];
            let result = GetModuleBaseNameW(
                process_handle,
                ptr::null_mut(),
                buffer.as_mut_ptr(),
                buffer.len() as u32,
            );
            CloseHandle(process_handle);

            if result > 0 {
                Some(String::from_utf16_lossy(&buffer[..result as usize]))
            } else {
                None
            }
        }
    }

    fn visible_child_windows(&self, handle: WindowHandle) -> Vec<WindowHandle> {
        unsafe {
            let mut children: Vec<WindowHandle> = Vec::new();

            extern "system" fn enum_child_proc(hwnd: HWND, lparam: isize) -> i32 {
                unsafe {
                    if IsWindowVisible(hwnd) != 0 {
                        let children = &mut *(lparam as *mut Vec<WindowHandle>);
                        children.push(WindowHandle(hwnd as usize));
                    }
                }
                1
            }

            EnumChildWindows(
                handle.0 as HWND,
                Some(enum_child_proc),
                &mut children as *mut _ as isize,
            );
            children
        }
    }

    fn is_maximized(&self, handle: WindowHandle) -> bool {
        unsafe {
            let hwnd = handle.0 as HWND;
            if IsZoomed(hwnd) != 0 {
                return true;
            }

            let window_rect = match self.raw_window_bounds(handle) {
                Some(r) => r,
                None => return false,
            };
            let hmonitor = MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST);
            let mut monitor_info: MONITORINFO = mem::zeroed();
            monitor_info.cbSize = mem::size_of::<MONITORINFO>() as u32;
            if GetMonitorInfoW(hmonitor, &mut monitor_info) != 0 {
                let m = monitor_info.rcMonitor;
                (window_rect.left() - m.left).abs() <= 10
                    && (window_rect.top() - m.top).abs() <= 10
                    && (window_rect.right() - m.right).abs() <= 10
                    && (window_rect.bottom() - m.bottom).abs() <= 10
            } else {
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_to_rectangle_preserves_dimensions() {
        let rect = RECT { left: 10, top: 20, right: 110, bottom: 220 };
        let rectangle = rect_to_rectangle(&rect);
        assert_eq!(rectangle, Rectangle::new(10, 20, 100, 200));
    }
}
