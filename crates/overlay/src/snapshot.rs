//! Per-monitor screen snapshot using GDI
//!
//! Captured once when the overlay is enabled. Two bitmaps are kept per
//! monitor — the original pixels and a pre-darkened copy — each selected
//! into its own memory DC so painting is plain BitBlt work.

use crate::{OverlayError, OverlayResult};
use common::MonitorInfo;
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC, GetDIBits,
    ReleaseDC, SelectObject, SetDIBits, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HDC,
    HGDIOBJ, SRCCOPY,
};

/// Brightness kept by the dimmed copy, out of 256.
const DIM_NUMERATOR: u32 = 96;

/// Darken a BGRA pixel buffer in place, leaving alpha untouched.
pub fn darken_bgra(pixels: &mut [u8]) {
    for chunk in pixels.chunks_exact_mut(4) {
        chunk[0] = ((chunk[0] as u32 * DIM_NUMERATOR) >> 8) as u8;
        chunk[1] = ((chunk[1] as u32 * DIM_NUMERATOR) >> 8) as u8;
        chunk[2] = ((chunk[2] as u32 * DIM_NUMERATOR) >> 8) as u8;
    }
}

fn bitmap_info(width: i32, height: i32) -> BITMAPINFO {
    BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: width,
            biHeight: -height, // Top-down DIB
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        bmiColors: [Default::default()],
    }
}

/// Frozen pixels of one monitor.
pub struct Snapshot {
    source_dc: HDC,
    dimmed_dc: HDC,
    source_bitmap: HGDIOBJ,
    dimmed_bitmap: HGDIOBJ,
    old_source: HGDIOBJ,
    old_dimmed: HGDIOBJ,
    width: i32,
    height: i32,
}

impl Snapshot {
    /// Capture the monitor's current pixels.
    pub fn capture(monitor: &MonitorInfo) -> OverlayResult<Self> {
        let width = monitor.rect.width as i32;
        let height = monitor.rect.height as i32;

        unsafe {
            let screen_dc = GetDC(None);
            if screen_dc.is_invalid() {
                return Err(OverlayError::Snapshot("failed to get screen DC".into()));
            }

            let source_dc = CreateCompatibleDC(screen_dc);
            let source_bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            let old_source = SelectObject(source_dc, source_bitmap);

            let blitted = BitBlt(
                source_dc,
                0,
                0,
                width,
                height,
                screen_dc,
                monitor.rect.x,
                monitor.rect.y,
                SRCCOPY,
            );
            if let Err(e) = blitted {
                SelectObject(source_dc, old_source);
                let _ = DeleteObject(source_bitmap);
                let _ = DeleteDC(source_dc);
                ReleaseDC(None, screen_dc);
                return Err(e.into());
            }

            // Read the pixels back, darken them, and build the second
            // bitmap from the darkened buffer.
            let mut bmi = bitmap_info(width, height);
            let mut pixels = vec![0u8; (width * height * 4) as usize];

            GetDIBits(
                source_dc,
                source_bitmap,
                0,
                height as u32,
                Some(pixels.as_mut_ptr() as *mut _),
                &mut bmi,
                DIB_RGB_COLORS,
            );

            darken_bgra(&mut pixels);

            let dimmed_bitmap = CreateCompatibleBitmap(screen_dc, width, height);
            SetDIBits(
                screen_dc,
                dimmed_bitmap,
                0,
                height as u32,
                pixels.as_ptr() as *const _,
                &bmi,
                DIB_RGB_COLORS,
            );

            let dimmed_dc = CreateCompatibleDC(screen_dc);
            let old_dimmed = SelectObject(dimmed_dc, dimmed_bitmap);

            ReleaseDC(None, screen_dc);

            Ok(Self {
                source_dc,
                dimmed_dc,
                source_bitmap: HGDIOBJ(source_bitmap.0),
                dimmed_bitmap: HGDIOBJ(dimmed_bitmap.0),
                old_source,
                old_dimmed,
                width,
                height,
            })
        }
    }

    /// Memory DC holding the original pixels.
    pub fn source_dc(&self) -> HDC {
        self.source_dc
    }

    /// Memory DC holding the darkened pixels.
    pub fn dimmed_dc(&self) -> HDC {
        self.dimmed_dc
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.source_dc, self.old_source);
            SelectObject(self.dimmed_dc, self.old_dimmed);
            let _ = DeleteObject(self.source_bitmap);
            let _ = DeleteObject(self.dimmed_bitmap);
            let _ = DeleteDC(self.source_dc);
            let _ = DeleteDC(self.dimmed_dc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn darken_reduces_color_channels_only() {
        let mut pixels = [200u8, 100, 50, 255];
        darken_bgra(&mut pixels);

        assert!(pixels[0] < 200);
        assert!(pixels[1] < 100);
        assert!(pixels[2] < 50);
        assert_eq!(pixels[3], 255);
    }

    #[test]
    fn darken_is_stable_on_black() {
        let mut pixels = [0u8, 0, 0, 255, 0, 0, 0, 255];
        darken_bgra(&mut pixels);
        assert_eq!(pixels, [0, 0, 0, 255, 0, 0, 0, 255]);
    }
}
