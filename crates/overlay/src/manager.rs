//! Overlay manager
//!
//! One overlay window per monitor, a shared selection rectangle, and the
//! snapshot lifecycle tied to the enable latch.

use crate::{
    snapshot::Snapshot,
    window::{
        create_overlay_window, destroy_overlay_window, hide_window, invalidate_window,
        set_snapshot, show_window, SharedSelection,
    },
    OverlayError, OverlayEvent, OverlayResult,
};
use common::monitor::enumerate_monitors;
use common::{MonitorInfo, Rect};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::sync::Arc;

/// Owns the per-monitor overlay windows.
pub struct OverlayManager {
    monitors: Vec<MonitorInfo>,
    windows: Vec<isize>,
    shared: Arc<Mutex<SharedSelection>>,
    enabled: bool,
}

impl OverlayManager {
    /// Enumerate monitors and create one hidden overlay window for each.
    /// Pointer and cancel events are forwarded through `events`.
    pub fn initialize(events: Sender<OverlayEvent>) -> OverlayResult<Self> {
        let monitors = enumerate_monitors();
        if monitors.is_empty() {
            return Err(OverlayError::NoMonitors);
        }

        tracing::info!(count = monitors.len(), "creating overlay windows");

        let shared = Arc::new(Mutex::new(SharedSelection::default()));

        let mut windows = Vec::with_capacity(monitors.len());
        for monitor in &monitors {
            windows.push(create_overlay_window(
                *monitor,
                shared.clone(),
                events.clone(),
            )?);
        }

        Ok(Self {
            monitors,
            windows,
            shared,
            enabled: false,
        })
    }

    pub fn monitors(&self) -> &[MonitorInfo] {
        &self.monitors
    }

    /// Show or hide all overlay windows.
    ///
    /// Snapshots are captured once per false→true edge and dropped on
    /// disable, so re-enabling always shows fresh pixels. Idempotent on a
    /// repeated value.
    pub fn set_enabled(&mut self, enabled: bool) -> OverlayResult<()> {
        if enabled == self.enabled {
            return Ok(());
        }
        self.enabled = enabled;

        if enabled {
            for (monitor, &hwnd) in self.monitors.iter().zip(&self.windows) {
                set_snapshot(hwnd, Some(Snapshot::capture(monitor)?));
                show_window(hwnd);
            }
        } else {
            for &hwnd in &self.windows {
                hide_window(hwnd);
                set_snapshot(hwnd, None);
            }
        }

        Ok(())
    }

    /// Update the selection rectangle consulted by every paint handler.
    pub fn set_selection_rect(&self, rect: Rect) {
        self.shared.lock().rect = rect;
    }

    /// Force a repaint of all overlay windows.
    pub fn update(&self) {
        for &hwnd in &self.windows {
            invalidate_window(hwnd);
        }
    }

    /// Destroy the overlay windows and release snapshot resources.
    pub fn shutdown(&mut self) {
        self.enabled = false;
        for hwnd in self.windows.drain(..) {
            destroy_overlay_window(hwnd);
        }
    }
}

impl Drop for OverlayManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}
