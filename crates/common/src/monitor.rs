//! Monitor enumeration
//!
//! Monitors are enumerated once at startup; hot-plug is not handled.

use crate::geometry::Rect;
use windows::Win32::Foundation::{BOOL, LPARAM, POINT, RECT, TRUE};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, MonitorFromPoint, HDC, HMONITOR, MONITORINFO,
    MONITOR_DEFAULTTONEAREST,
};

/// One attached display in virtual-desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Raw HMONITOR value.
    pub handle: isize,
    pub rect: Rect,
}

fn rect_from_win32(rect: &RECT) -> Rect {
    Rect::new(
        rect.left,
        rect.top,
        (rect.right - rect.left).max(0) as u32,
        (rect.bottom - rect.top).max(0) as u32,
    )
}

/// Enumerate all attached monitors.
pub fn enumerate_monitors() -> Vec<MonitorInfo> {
    let mut monitors: Vec<MonitorInfo> = Vec::new();

    unsafe {
        let _ = EnumDisplayMonitors(
            None,
            None,
            Some(enum_monitor_callback),
            LPARAM(&mut monitors as *mut Vec<MonitorInfo> as isize),
        );
    }

    monitors
}

unsafe extern "system" fn enum_monitor_callback(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _clip: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let monitors = &mut *(lparam.0 as *mut Vec<MonitorInfo>);

    let mut info = MONITORINFO {
        cbSize: std::mem::size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };

    if GetMonitorInfoW(hmonitor, &mut info).as_bool() {
        monitors.push(MonitorInfo {
            handle: hmonitor.0 as isize,
            rect: rect_from_win32(&info.rcMonitor),
        });
    }

    TRUE
}

/// The monitor nearest to the center of `rect`.
pub fn monitor_containing(rect: &Rect) -> MonitorInfo {
    let center = POINT {
        x: rect.x + rect.width as i32 / 2,
        y: rect.y + rect.height as i32 / 2,
    };

    unsafe {
        let hmonitor = MonitorFromPoint(center, MONITOR_DEFAULTTONEAREST);

        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        let _ = GetMonitorInfoW(hmonitor, &mut info);

        MonitorInfo {
            handle: hmonitor.0 as isize,
            rect: rect_from_win32(&info.rcMonitor),
        }
    }
}
