//! Output manager
//!
//! Ties device, window, pipeline and shared surface together and owns the
//! target-rect recreate lifecycle.

use crate::{
    device::GraphicsDevice, pipeline::RenderPipeline, surface::SharedSurface,
    target::TargetTracker, window::OutputWindow, OutputError, OutputResult,
};
use common::sync::{with_lock, RetryPolicy};
use common::Rect;

pub struct OutputManager {
    device: GraphicsDevice,
    window: OutputWindow,
    pipeline: RenderPipeline,
    surface: Option<SharedSurface>,
    target: TargetTracker,
    retry_policy: RetryPolicy,
    enabled: bool,
}

impl OutputManager {
    /// Build the full pipeline sized to the initial target rectangle. Any
    /// failure here is fatal to the process.
    pub fn new(initial: Rect, retry_policy: RetryPolicy) -> OutputResult<Self> {
        let device = GraphicsDevice::new()?;
        let window = OutputWindow::new(initial.width, initial.height)?;
        let pipeline = RenderPipeline::new(&device, window.hwnd(), initial.width, initial.height)?;
        let surface = SharedSurface::new(device.device(), initial.width, initial.height)?;

        tracing::info!(
            width = initial.width,
            height = initial.height,
            "output pipeline initialized"
        );

        Ok(Self {
            device,
            window,
            pipeline,
            surface: Some(surface),
            target: TargetTracker::new(initial),
            retry_policy,
            enabled: false,
        })
    }

    pub fn target_rect(&self) -> Rect {
        self.target.current()
    }

    /// How many times the shared surface has been allocated.
    pub fn allocations(&self) -> u64 {
        self.target.allocations()
    }

    /// Point the pipeline at a new target rectangle.
    ///
    /// No-op when the rectangle is unchanged. Otherwise the shared surface
    /// is destroyed and recreated at the new dimensions — never two alive
    /// at once — so the producer must re-query `shared_handle` afterwards.
    pub fn set_target_rect(&mut self, rect: Rect) -> OutputResult<()> {
        if !self.target.requires_recreate(&rect) {
            return Ok(());
        }

        tracing::info!(
            width = rect.width,
            height = rect.height,
            x = rect.x,
            y = rect.y,
            "recreating output pipeline for new target"
        );

        self.surface = None;
        let surface = SharedSurface::new(self.device.device(), rect.width, rect.height)?;

        self.pipeline.resize(&self.device, rect.width, rect.height)?;
        self.window.resize(rect.width, rect.height)?;

        self.surface = Some(surface);
        self.target.commit(rect);
        Ok(())
    }

    /// Cross-process handle of the current surface; `None` while a failed
    /// recreate has left the manager surface-less.
    pub fn shared_handle(&self) -> Option<isize> {
        self.surface.as_ref().map(|s| s.shared_handle())
    }

    /// Show or hide the output window. Idempotent; the pipeline stays up.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }

        self.enabled = enabled;
        if enabled {
            self.window.show();
        } else {
            self.window.hide();
        }
    }

    /// Draw the shared surface into the output window and present.
    ///
    /// The keyed mutex brackets every GPU read of the surface; the retry
    /// policy bounds how long a stalled producer can hold us off before the
    /// timeout is reported as fatal.
    pub fn render(&mut self) -> OutputResult<()> {
        let surface = self.surface.as_ref().ok_or(OutputError::NoSurface)?;
        let rect = self.target.current();

        with_lock(surface, &self.retry_policy, || {
            self.pipeline
                .draw(&self.device, surface.srv(), rect.width, rect.height)
        })?;

        // Present outside the lock: the producer only needs the texture,
        // not the swapchain.
        self.pipeline.present()
    }
}
