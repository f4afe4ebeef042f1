//! Hidden control window
//!
//! Receives the tray icon callbacks and the global hotkey, and forwards
//! them as signals to the main loop. The window is never shown.

use crate::tray::WM_TRAYICON;
use anyhow::Context;
use crossbeam_channel::Sender;
use std::cell::RefCell;
use std::sync::Once;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    RegisterHotKey, UnregisterHotKey, MOD_CONTROL, MOD_SHIFT,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, PostQuitMessage, RegisterClassExW,
    WM_DESTROY, WM_HOTKEY, WM_LBUTTONUP, WM_RBUTTONUP, WNDCLASSEXW, WS_OVERLAPPED,
};

const CONTROL_CLASS: PCWSTR = w!("RegionCastControl");

const HOTKEY_ID: i32 = 1;

/// Ctrl+Shift+R toggles selection.
const HOTKEY_VK: u32 = 0x52;

static REGISTER: Once = Once::new();

/// Signals raised by the control window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlSignal {
    ToggleSelection,
    TrayMenu,
}

thread_local! {
    static SIGNALS: RefCell<Option<Sender<ControlSignal>>> = RefCell::new(None);
}

fn send_signal(signal: ControlSignal) {
    SIGNALS.with(|slot| {
        if let Some(sender) = slot.borrow().as_ref() {
            let _ = sender.send(signal);
        }
    });
}

pub struct ControlWindow {
    hwnd: HWND,
}

impl ControlWindow {
    /// Create the hidden window, wire the signal channel and register the
    /// global hotkey.
    pub fn create(signals: Sender<ControlSignal>) -> anyhow::Result<Self> {
        unsafe {
            let hmodule = GetModuleHandleW(None)?;
            let hinstance = HINSTANCE(hmodule.0);

            REGISTER.call_once(|| {
                let wc = WNDCLASSEXW {
                    cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
                    lpfnWndProc: Some(control_wnd_proc),
                    hInstance: hinstance,
                    lpszClassName: CONTROL_CLASS,
                    ..Default::default()
                };
                let _ = RegisterClassExW(&wc);
            });

            SIGNALS.with(|slot| {
                *slot.borrow_mut() = Some(signals);
            });

            let hwnd = CreateWindowExW(
                Default::default(),
                CONTROL_CLASS,
                w!("RegionCast"),
                WS_OVERLAPPED,
                0,
                0,
                0,
                0,
                None,
                None,
                hinstance,
                None,
            )?;

            RegisterHotKey(hwnd, HOTKEY_ID, MOD_CONTROL | MOD_SHIFT, HOTKEY_VK)
                .context("failed to register the selection hotkey")?;

            Ok(Self { hwnd })
        }
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }
}

impl Drop for ControlWindow {
    fn drop(&mut self) {
        unsafe {
            let _ = UnregisterHotKey(self.hwnd, HOTKEY_ID);
            let _ = DestroyWindow(self.hwnd);
        }
        SIGNALS.with(|slot| {
            *slot.borrow_mut() = None;
        });
    }
}

unsafe extern "system" fn control_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_HOTKEY => {
            if wparam.0 as i32 == HOTKEY_ID {
                send_signal(ControlSignal::ToggleSelection);
            }
            LRESULT(0)
        }

        WM_TRAYICON => {
            let mouse_msg = (lparam.0 as u32) & 0xFFFF;
            if mouse_msg == WM_RBUTTONUP || mouse_msg == WM_LBUTTONUP {
                send_signal(ControlSignal::TrayMenu);
            }
            LRESULT(0)
        }

        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        }

        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
