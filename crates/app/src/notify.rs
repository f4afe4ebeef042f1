//! User-facing error notification

use windows::core::{w, PCWSTR};
use windows::Win32::UI::WindowsAndMessaging::{MessageBoxW, MB_ICONERROR, MB_OK};

/// Sink for user-visible error messages. The session reports through this
/// so tests can observe notifications without a message box.
pub trait Notifier {
    fn notify(&mut self, message: &str);
}

/// Blocking message-box notifier.
pub struct UserNotifier;

impl Notifier for UserNotifier {
    fn notify(&mut self, message: &str) {
        show_error(message);
    }
}

/// Show a blocking error dialog.
pub fn show_error(message: &str) {
    let wide: Vec<u16> = message.encode_utf16().chain(std::iter::once(0)).collect();

    unsafe {
        MessageBoxW(
            None,
            PCWSTR(wide.as_ptr()),
            w!("RegionCast"),
            MB_OK | MB_ICONERROR,
        );
    }
}
