//! Selection overlay for RegionCast
//!
//! One borderless topmost window per monitor showing a frozen, dimmed
//! snapshot of that monitor with the live selection rectangle punched
//! through undimmed.

pub mod manager;
pub mod paint;
pub mod snapshot;
pub mod window;

pub use manager::OverlayManager;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("screenshot failed: {0}")]
    Snapshot(String),

    #[error("no monitors found")]
    NoMonitors,
}

pub type OverlayResult<T> = Result<T, OverlayError>;

/// Pointer and key events forwarded from the overlay windows, in
/// virtual-desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayEvent {
    PointerDown { x: i32, y: i32 },
    PointerMove { x: i32, y: i32 },
    PointerUp { x: i32, y: i32 },
    Cancel,
}
