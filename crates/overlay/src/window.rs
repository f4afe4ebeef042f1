//! Overlay window implementation
//!
//! Window procedures cannot carry context, so window identity is resolved
//! through an explicit per-thread registry mapping HWND to the owning
//! window state. All overlay windows live on the UI thread.

use crate::{paint, snapshot::Snapshot, OverlayEvent, OverlayResult};
use common::{MonitorInfo, Rect};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Once};
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::{BeginPaint, EndPaint, InvalidateRect, UpdateWindow, PAINTSTRUCT};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{ReleaseCapture, SetCapture, VK_ESCAPE};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, LoadCursorW, RegisterClassExW, ShowWindow,
    CS_HREDRAW, CS_VREDRAW, IDC_CROSS, SW_HIDE, SW_SHOW, WM_KEYDOWN, WM_LBUTTONDOWN, WM_LBUTTONUP,
    WM_MOUSEMOVE, WM_PAINT, WNDCLASSEXW, WS_EX_TOOLWINDOW, WS_EX_TOPMOST, WS_POPUP,
};

const OVERLAY_CLASS: PCWSTR = w!("RegionCastOverlay");

static REGISTER: Once = Once::new();

/// Selection rectangle shared between the manager and the paint handlers.
#[derive(Debug, Default)]
pub struct SharedSelection {
    pub rect: Rect,
}

/// Per-window state owned by the registry.
pub struct WindowState {
    pub monitor: MonitorInfo,
    pub snapshot: Option<Snapshot>,
    pub shared: Arc<Mutex<SharedSelection>>,
    pub events: Sender<OverlayEvent>,
}

thread_local! {
    static WINDOWS: RefCell<HashMap<isize, WindowState>> = RefCell::new(HashMap::new());
}

fn register_class(hinstance: HINSTANCE) -> OverlayResult<()> {
    let mut result = Ok(());

    REGISTER.call_once(|| unsafe {
        let cursor = match LoadCursorW(None, IDC_CROSS) {
            Ok(c) => c,
            Err(e) => {
                result = Err(e.into());
                return;
            }
        };

        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(overlay_wnd_proc),
            hInstance: hinstance,
            hCursor: cursor,
            lpszClassName: OVERLAY_CLASS,
            ..Default::default()
        };

        let _ = RegisterClassExW(&wc);
    });

    result
}

/// Create one hidden overlay window covering `monitor`.
pub fn create_overlay_window(
    monitor: MonitorInfo,
    shared: Arc<Mutex<SharedSelection>>,
    events: Sender<OverlayEvent>,
) -> OverlayResult<isize> {
    unsafe {
        let hmodule = GetModuleHandleW(None)?;
        let hinstance = HINSTANCE(hmodule.0);
        register_class(hinstance)?;

        let hwnd = CreateWindowExW(
            WS_EX_TOPMOST | WS_EX_TOOLWINDOW,
            OVERLAY_CLASS,
            w!("RegionCast Overlay"),
            WS_POPUP,
            monitor.rect.x,
            monitor.rect.y,
            monitor.rect.width as i32,
            monitor.rect.height as i32,
            None,
            None,
            hinstance,
            None,
        )?;

        let raw = hwnd.0 as isize;
        WINDOWS.with(|windows| {
            windows.borrow_mut().insert(
                raw,
                WindowState {
                    monitor,
                    snapshot: None,
                    shared,
                    events,
                },
            );
        });

        Ok(raw)
    }
}

pub fn destroy_overlay_window(hwnd_raw: isize) {
    WINDOWS.with(|windows| {
        windows.borrow_mut().remove(&hwnd_raw);
    });

    unsafe {
        let _ = DestroyWindow(hwnd_from_raw(hwnd_raw));
    }
}

/// Install or drop a window's snapshot.
pub fn set_snapshot(hwnd_raw: isize, snapshot: Option<Snapshot>) {
    WINDOWS.with(|windows| {
        if let Some(state) = windows.borrow_mut().get_mut(&hwnd_raw) {
            state.snapshot = snapshot;
        }
    });
}

pub fn show_window(hwnd_raw: isize) {
    unsafe {
        let hwnd = hwnd_from_raw(hwnd_raw);
        let _ = ShowWindow(hwnd, SW_SHOW);
        let _ = UpdateWindow(hwnd);
    }
}

pub fn hide_window(hwnd_raw: isize) {
    unsafe {
        let _ = ShowWindow(hwnd_from_raw(hwnd_raw), SW_HIDE);
    }
}

pub fn invalidate_window(hwnd_raw: isize) {
    unsafe {
        let _ = InvalidateRect(hwnd_from_raw(hwnd_raw), None, false);
    }
}

fn hwnd_from_raw(raw: isize) -> HWND {
    HWND(raw as *mut std::ffi::c_void)
}

fn lparam_to_screen(monitor: &MonitorInfo, lparam: LPARAM) -> (i32, i32) {
    // Client coordinates; signed 16-bit so captured-mouse positions left of
    // or above the window stay correct.
    let x = (lparam.0 & 0xFFFF) as i16 as i32;
    let y = ((lparam.0 >> 16) & 0xFFFF) as i16 as i32;

    (x + monitor.rect.x, y + monitor.rect.y)
}

unsafe extern "system" fn overlay_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            let hdc = BeginPaint(hwnd, &mut ps);

            WINDOWS.with(|windows| {
                if let Some(state) = windows.borrow().get(&(hwnd.0 as isize)) {
                    if let Some(ref snapshot) = state.snapshot {
                        let selection = state.shared.lock().rect;
                        paint::paint_window(hdc, &state.monitor, snapshot, selection);
                    }
                }
            });

            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        }

        WM_LBUTTONDOWN => {
            SetCapture(hwnd);
            forward_pointer(hwnd, lparam, |x, y| OverlayEvent::PointerDown { x, y });
            LRESULT(0)
        }

        WM_MOUSEMOVE => {
            forward_pointer(hwnd, lparam, |x, y| OverlayEvent::PointerMove { x, y });
            LRESULT(0)
        }

        WM_LBUTTONUP => {
            let _ = ReleaseCapture();
            forward_pointer(hwnd, lparam, |x, y| OverlayEvent::PointerUp { x, y });
            LRESULT(0)
        }

        WM_KEYDOWN => {
            if wparam.0 as u16 == VK_ESCAPE.0 {
                WINDOWS.with(|windows| {
                    if let Some(state) = windows.borrow().get(&(hwnd.0 as isize)) {
                        let _ = state.events.send(OverlayEvent::Cancel);
                    }
                });
            }
            LRESULT(0)
        }

        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

unsafe fn forward_pointer(
    hwnd: HWND,
    lparam: LPARAM,
    make_event: impl FnOnce(i32, i32) -> OverlayEvent,
) {
    WINDOWS.with(|windows| {
        if let Some(state) = windows.borrow().get(&(hwnd.0 as isize)) {
            let (x, y) = lparam_to_screen(&state.monitor, lparam);
            let _ = state.events.send(make_event(x, y));
        }
    });
}
