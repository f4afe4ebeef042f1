//! Off-desktop output window
//!
//! The window a screen-share picker captures. It lives outside the visible
//! desktop so it never obstructs the user; only its size matters.

use crate::OutputResult;
use std::sync::Once;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, RegisterClassExW, SetWindowPos, ShowWindow,
    SWP_NOACTIVATE, SWP_NOZORDER, SW_HIDE, SW_SHOWNOACTIVATE, WM_SIZE, WNDCLASSEXW,
    WS_EX_TOOLWINDOW, WS_POPUP,
};

const OUTPUT_CLASS: PCWSTR = w!("RegionCastOutput");

/// Parked far off the virtual desktop.
const OFFSCREEN_X: i32 = -32000;
const OFFSCREEN_Y: i32 = -32000;

static REGISTER: Once = Once::new();

fn register_class(hinstance: HINSTANCE) {
    REGISTER.call_once(|| unsafe {
        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            lpfnWndProc: Some(output_wnd_proc),
            hInstance: hinstance,
            lpszClassName: OUTPUT_CLASS,
            ..Default::default()
        };

        let _ = RegisterClassExW(&wc);
    });
}

/// Borderless popup window the swapchain presents into.
pub struct OutputWindow {
    hwnd: HWND,
}

impl OutputWindow {
    pub fn new(width: u32, height: u32) -> OutputResult<Self> {
        unsafe {
            let hmodule = GetModuleHandleW(None)?;
            let hinstance = HINSTANCE(hmodule.0);
            register_class(hinstance);

            let hwnd = CreateWindowExW(
                WS_EX_TOOLWINDOW,
                OUTPUT_CLASS,
                w!("RegionCast Output"),
                WS_POPUP,
                OFFSCREEN_X,
                OFFSCREEN_Y,
                width as i32,
                height as i32,
                None,
                None,
                hinstance,
                None,
            )?;

            Ok(Self { hwnd })
        }
    }

    pub fn hwnd(&self) -> HWND {
        self.hwnd
    }

    /// Resize to the new target dimensions, staying off-desktop.
    pub fn resize(&self, width: u32, height: u32) -> OutputResult<()> {
        unsafe {
            SetWindowPos(
                self.hwnd,
                None,
                OFFSCREEN_X,
                OFFSCREEN_Y,
                width as i32,
                height as i32,
                SWP_NOZORDER | SWP_NOACTIVATE,
            )?;
        }
        Ok(())
    }

    pub fn show(&self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_SHOWNOACTIVATE);
        }
    }

    pub fn hide(&self) {
        unsafe {
            let _ = ShowWindow(self.hwnd, SW_HIDE);
        }
    }
}

impl Drop for OutputWindow {
    fn drop(&mut self) {
        unsafe {
            let _ = DestroyWindow(self.hwnd);
        }
    }
}

unsafe extern "system" fn output_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        // The window is only ever resized through the target-rect path,
        // which already resizes the swapchain buffers. Swallowing WM_SIZE
        // keeps that the single resize path.
        WM_SIZE => LRESULT(0),
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
