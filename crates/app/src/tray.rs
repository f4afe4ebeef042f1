//! System tray implementation

use windows::core::w;
use windows::Win32::Foundation::{HWND, POINT};
use windows::Win32::UI::Shell::{
    Shell_NotifyIconW, NIF_ICON, NIF_MESSAGE, NIF_TIP, NIM_ADD, NIM_DELETE, NOTIFYICONDATAW,
};
use windows::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreatePopupMenu, DestroyMenu, GetCursorPos, LoadIconW, SetForegroundWindow,
    TrackPopupMenu, IDI_APPLICATION, MF_STRING, TPM_BOTTOMALIGN, TPM_LEFTALIGN, TPM_NONOTIFY,
    TPM_RETURNCMD, WM_USER,
};

/// Tray icon callback message.
pub const WM_TRAYICON: u32 = WM_USER + 1;

const ID_TRAY_START: u32 = 1001;
const ID_TRAY_STOP: u32 = 1002;
const ID_TRAY_EXIT: u32 = 1003;

/// Commands the tray menu can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    Start,
    Stop,
    Exit,
}

/// System tray manager.
pub struct SystemTray {
    hwnd: HWND,
    nid: NOTIFYICONDATAW,
    visible: bool,
}

impl SystemTray {
    pub fn new(hwnd: HWND) -> Self {
        let mut nid = NOTIFYICONDATAW::default();
        nid.cbSize = std::mem::size_of::<NOTIFYICONDATAW>() as u32;
        nid.hWnd = hwnd;
        nid.uID = 1;
        nid.uFlags = NIF_ICON | NIF_MESSAGE | NIF_TIP;
        nid.uCallbackMessage = WM_TRAYICON;

        let tip = "RegionCast - screen region sharing";
        let tip_wide: Vec<u16> = tip.encode_utf16().collect();
        let len = tip_wide.len().min(127);
        nid.szTip[..len].copy_from_slice(&tip_wide[..len]);

        Self {
            hwnd,
            nid,
            visible: false,
        }
    }

    /// Show the tray icon.
    pub fn show(&mut self) -> windows::core::Result<()> {
        if self.visible {
            return Ok(());
        }

        unsafe {
            self.nid.hIcon = LoadIconW(None, IDI_APPLICATION).unwrap_or_default();
            let _ = Shell_NotifyIconW(NIM_ADD, &self.nid);
            self.visible = true;
        }
        Ok(())
    }

    /// Hide the tray icon.
    pub fn hide(&mut self) -> windows::core::Result<()> {
        if !self.visible {
            return Ok(());
        }

        unsafe {
            let _ = Shell_NotifyIconW(NIM_DELETE, &self.nid);
            self.visible = false;
        }
        Ok(())
    }

    /// Show the context menu at the cursor and return the chosen command.
    pub fn show_context_menu(
        &self,
        can_start: bool,
        can_stop: bool,
    ) -> windows::core::Result<Option<TrayCommand>> {
        unsafe {
            let menu = CreatePopupMenu()?;

            if can_start {
                let _ = AppendMenuW(menu, MF_STRING, ID_TRAY_START as usize, w!("Start sharing"));
            }
            if can_stop {
                let _ = AppendMenuW(menu, MF_STRING, ID_TRAY_STOP as usize, w!("Stop sharing"));
            }
            let _ = AppendMenuW(menu, MF_STRING, ID_TRAY_EXIT as usize, w!("Exit"));

            let mut pt = POINT::default();
            let _ = GetCursorPos(&mut pt);

            // The menu dismisses itself only while we are foreground.
            let _ = SetForegroundWindow(self.hwnd);
            let chosen = TrackPopupMenu(
                menu,
                TPM_LEFTALIGN | TPM_BOTTOMALIGN | TPM_RETURNCMD | TPM_NONOTIFY,
                pt.x,
                pt.y,
                0,
                self.hwnd,
                None,
            );

            let _ = DestroyMenu(menu);

            Ok(match chosen.0 as u32 {
                ID_TRAY_START => Some(TrayCommand::Start),
                ID_TRAY_STOP => Some(TrayCommand::Stop),
                ID_TRAY_EXIT => Some(TrayCommand::Exit),
                _ => None,
            })
        }
    }
}

impl Drop for SystemTray {
    fn drop(&mut self) {
        let _ = self.hide();
    }
}
