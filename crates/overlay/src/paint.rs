//! Overlay painting
//!
//! Visual contract: everything dimmed, the selection rectangle bright, a
//! border around it. Drawn into a memory back buffer first so repaints on
//! every pointer move do not flicker.

use crate::snapshot::Snapshot;
use common::{MonitorInfo, Rect};
use windows::Win32::Foundation::{COLORREF, RECT};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, CreateSolidBrush, DeleteDC, DeleteObject,
    FrameRect, SelectObject, HDC, SRCCOPY,
};

const BORDER_COLOR: COLORREF = COLORREF(0x00FFFFFF);

/// Selection intersected with the monitor, in monitor-local coordinates.
/// `None` when the selection does not touch this monitor.
pub fn selection_local(selection: &Rect, monitor: &Rect) -> Option<Rect> {
    let clipped = selection.intersection(monitor)?;
    Some(Rect::new(
        clipped.x - monitor.x,
        clipped.y - monitor.y,
        clipped.width,
        clipped.height,
    ))
}

/// Compose one overlay window's contents into `window_dc`.
pub fn paint_window(window_dc: HDC, monitor: &MonitorInfo, snapshot: &Snapshot, selection: Rect) {
    let width = snapshot.width();
    let height = snapshot.height();

    unsafe {
        let back_dc = CreateCompatibleDC(window_dc);
        let back_bitmap = CreateCompatibleBitmap(window_dc, width, height);
        let old_bitmap = SelectObject(back_dc, back_bitmap);

        // Dimmed backdrop over the whole monitor.
        let _ = BitBlt(
            back_dc,
            0,
            0,
            width,
            height,
            snapshot.dimmed_dc(),
            0,
            0,
            SRCCOPY,
        );

        // Selection area shown bright from the original snapshot, then the
        // border stroke.
        if let Some(local) = selection_local(&selection, &monitor.rect) {
            let _ = BitBlt(
                back_dc,
                local.x,
                local.y,
                local.width as i32,
                local.height as i32,
                snapshot.source_dc(),
                local.x,
                local.y,
                SRCCOPY,
            );

            let border = RECT {
                left: local.x,
                top: local.y,
                right: local.right(),
                bottom: local.bottom(),
            };
            let brush = CreateSolidBrush(BORDER_COLOR);
            FrameRect(back_dc, &border, brush);
            let _ = DeleteObject(brush);
        }

        let _ = BitBlt(window_dc, 0, 0, width, height, back_dc, 0, 0, SRCCOPY);

        SelectObject(back_dc, old_bitmap);
        let _ = DeleteObject(back_bitmap);
        let _ = DeleteDC(back_dc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selection_inside_monitor_maps_to_local() {
        let monitor = Rect::new(0, 0, 1920, 1080);
        let selection = Rect::new(100, 100, 300, 200);

        assert_eq!(
            selection_local(&selection, &monitor),
            Some(Rect::new(100, 100, 300, 200))
        );
    }

    #[test]
    fn selection_on_secondary_monitor_is_offset() {
        let monitor = Rect::new(1920, 0, 1920, 1080);
        let selection = Rect::new(2000, 50, 100, 100);

        assert_eq!(
            selection_local(&selection, &monitor),
            Some(Rect::new(80, 50, 100, 100))
        );
    }

    #[test]
    fn selection_spanning_monitors_is_clipped() {
        let left = Rect::new(0, 0, 1920, 1080);
        let right = Rect::new(1920, 0, 1920, 1080);
        let selection = Rect::new(1800, 100, 300, 200);

        assert_eq!(
            selection_local(&selection, &left),
            Some(Rect::new(1800, 100, 120, 200))
        );
        assert_eq!(
            selection_local(&selection, &right),
            Some(Rect::new(0, 100, 180, 200))
        );
    }

    #[test]
    fn selection_off_monitor_is_none() {
        let monitor = Rect::new(0, 0, 1920, 1080);
        let selection = Rect::new(2000, 0, 50, 50);

        assert_eq!(selection_local(&selection, &monitor), None);
    }
}
