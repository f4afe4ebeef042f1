//! WGC-backed reference producer
//!
//! Captures the monitor containing the target rectangle through a
//! Windows.Graphics.Capture frame pool and copies the monitor-local
//! sub-region into the consumer's shared surface under its keyed mutex.

use crate::{d3d11::CaptureDevice, CaptureError, CaptureProducer, CaptureResult, SharedFrameHandle};
use common::monitor::monitor_containing;
use common::sync::{with_lock, Acquire, RetryPolicy, SurfaceLock};
use common::{MonitorInfo, Rect};
use std::time::Duration;
use windows::core::HRESULT;
use windows::Graphics::Capture::{Direct3D11CaptureFramePool, GraphicsCaptureItem, GraphicsCaptureSession};
use windows::Graphics::DirectX::DirectXPixelFormat;
use windows::Win32::Graphics::Direct3D11::{
    ID3D11Texture2D, D3D11_BOX, D3D11_TEXTURE2D_DESC,
};
use windows::Win32::Graphics::Dxgi::IDXGIKeyedMutex;
use windows::Win32::Graphics::Gdi::HMONITOR;
use windows::Win32::System::WinRT::Graphics::Capture::IGraphicsCaptureItemInterop;

const FRAME_BUFFER_COUNT: i32 = 2;

/// Key value used by both sides of the handshake.
const SURFACE_KEY: u64 = 0;

/// `AcquireSync` reports a busy peer with the Win32 wait code.
const WAIT_TIMEOUT_HR: HRESULT = HRESULT(0x0000_0102);

/// The target rectangle translated into monitor-local coordinates and
/// clipped to the monitor. `None` when the rect lies entirely elsewhere.
fn monitor_local_crop(rect: &Rect, monitor: &Rect) -> Option<Rect> {
    let clipped = rect.intersection(monitor)?;
    Some(Rect::new(
        clipped.x - monitor.x,
        clipped.y - monitor.y,
        clipped.width,
        clipped.height,
    ))
}

/// An open handle to the consumer's shared surface.
struct OpenedSurface {
    handle: isize,
    texture: ID3D11Texture2D,
    mutex: IDXGIKeyedMutex,
    width: u32,
    height: u32,
}

impl SurfaceLock for OpenedSurface {
    type Error = CaptureError;

    fn try_acquire(&self, timeout: Duration) -> Result<Acquire, CaptureError> {
        match unsafe { self.mutex.AcquireSync(SURFACE_KEY, timeout.as_millis() as u32) } {
            Ok(()) => Ok(Acquire::Acquired),
            Err(e) if e.code() == WAIT_TIMEOUT_HR => Ok(Acquire::TimedOut),
            Err(e) => Err(e.into()),
        }
    }

    fn release(&self) -> Result<(), CaptureError> {
        unsafe { self.mutex.ReleaseSync(SURFACE_KEY) }?;
        Ok(())
    }
}

/// A running WGC session bound to one monitor.
struct BoundCapture {
    monitor: MonitorInfo,
    frame_pool: Direct3D11CaptureFramePool,
    session: GraphicsCaptureSession,
}

impl BoundCapture {
    fn close(self) {
        let _ = self.session.Close();
        let _ = self.frame_pool.Close();
    }
}

/// Reference producer capturing one monitor.
pub struct MonitorProducer {
    device: Option<CaptureDevice>,
    bound: Option<BoundCapture>,
    shared: Option<OpenedSurface>,
    running: bool,
    retry_policy: RetryPolicy,
}

impl MonitorProducer {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            device: None,
            bound: None,
            shared: None,
            running: false,
            retry_policy,
        }
    }

    fn bind_monitor(&mut self, rect: &Rect) -> CaptureResult<()> {
        let monitor = monitor_containing(rect);

        if let Some(ref bound) = self.bound {
            if bound.monitor.handle == monitor.handle {
                return Ok(());
            }
        }

        let device = self.device.as_ref().ok_or(CaptureError::NotInitialized)?;

        if let Some(old) = self.bound.take() {
            old.close();
        }

        unsafe {
            let interop: IGraphicsCaptureItemInterop =
                windows::core::factory::<GraphicsCaptureItem, IGraphicsCaptureItemInterop>()?;
            let item: GraphicsCaptureItem =
                interop.CreateForMonitor(HMONITOR(monitor.handle as *mut std::ffi::c_void))?;

            let size = item.Size()?;
            let frame_pool = Direct3D11CaptureFramePool::CreateFreeThreaded(
                device.winrt_device(),
                DirectXPixelFormat::B8G8R8A8UIntNormalized,
                FRAME_BUFFER_COUNT,
                size,
            )?;

            let session = frame_pool.CreateCaptureSession(&item)?;
            session.StartCapture()?;

            tracing::debug!(monitor = monitor.handle, "bound capture to monitor");

            self.bound = Some(BoundCapture {
                monitor,
                frame_pool,
                session,
            });
        }

        Ok(())
    }

    fn open_shared(&mut self, target: SharedFrameHandle) -> CaptureResult<()> {
        if let Some(ref shared) = self.shared {
            if shared.handle == target.0 {
                return Ok(());
            }
        }

        let device = self.device.as_ref().ok_or(CaptureError::NotInitialized)?;
        let (texture, mutex) = device.open_shared_texture(target.0)?;

        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { texture.GetDesc(&mut desc) };

        tracing::debug!(
            width = desc.Width,
            height = desc.Height,
            "opened shared surface"
        );

        self.shared = Some(OpenedSurface {
            handle: target.0,
            texture,
            mutex,
            width: desc.Width,
            height: desc.Height,
        });

        Ok(())
    }
}

impl CaptureProducer for MonitorProducer {
    fn initialize(&mut self) -> CaptureResult<()> {
        if self.device.is_none() {
            self.device = Some(CaptureDevice::new()?);
        }
        Ok(())
    }

    fn start_capture(&mut self) -> CaptureResult<()> {
        if self.device.is_none() {
            return Err(CaptureError::NotInitialized);
        }
        // Monitor binding happens on the first write_frame, once the
        // target rectangle is known.
        self.running = true;
        Ok(())
    }

    fn write_frame(&mut self, target: SharedFrameHandle, rect: Rect) -> CaptureResult<()> {
        if !self.running {
            return Err(CaptureError::NotRunning);
        }

        self.bind_monitor(&rect)?;
        self.open_shared(target)?;

        let bound = self.bound.as_ref().ok_or(CaptureError::NotRunning)?;
        let shared = self.shared.as_ref().ok_or(CaptureError::NotRunning)?;
        let device = self.device.as_ref().ok_or(CaptureError::NotInitialized)?;

        // No new frame this tick: the surface keeps its previous content.
        let frame = match bound.frame_pool.TryGetNextFrame() {
            Ok(frame) => frame,
            Err(_) => return Ok(()),
        };

        let surface = frame.Surface()?;
        let frame_texture = CaptureDevice::texture_from_surface(&surface)?;

        let crop = monitor_local_crop(&rect, &bound.monitor.rect).ok_or(CaptureError::OffScreen)?;
        let width = crop.width.min(shared.width);
        let height = crop.height.min(shared.height);

        let src_box = D3D11_BOX {
            left: crop.x as u32,
            top: crop.y as u32,
            front: 0,
            right: crop.x as u32 + width,
            bottom: crop.y as u32 + height,
            back: 1,
        };

        with_lock(shared, &self.retry_policy, || {
            unsafe {
                device.context().CopySubresourceRegion(
                    &shared.texture,
                    0,
                    0,
                    0,
                    0,
                    &frame_texture,
                    0,
                    Some(&src_box),
                );
            }
            Ok(())
        })?;

        Ok(())
    }

    fn stop_capture(&mut self) -> CaptureResult<()> {
        self.running = false;
        if let Some(bound) = self.bound.take() {
            bound.close();
        }
        // The opened shared surface is kept: restarting with an unchanged
        // target reuses it without renegotiation.
        Ok(())
    }

    fn shutdown(&mut self) -> CaptureResult<()> {
        self.stop_capture()?;
        self.shared = None;
        self.device = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crop_inside_monitor_is_monitor_local() {
        let monitor = Rect::new(1920, 0, 2560, 1440);
        let rect = Rect::new(2000, 100, 300, 200);

        assert_eq!(
            monitor_local_crop(&rect, &monitor),
            Some(Rect::new(80, 100, 300, 200))
        );
    }

    #[test]
    fn crop_clips_to_monitor_edges() {
        let monitor = Rect::new(0, 0, 1920, 1080);
        let rect = Rect::new(1800, 1000, 300, 200);

        assert_eq!(
            monitor_local_crop(&rect, &monitor),
            Some(Rect::new(1800, 1000, 120, 80))
        );
    }

    #[test]
    fn crop_off_monitor_is_none() {
        let monitor = Rect::new(0, 0, 1920, 1080);
        let rect = Rect::new(-500, -500, 100, 100);

        assert_eq!(monitor_local_crop(&rect, &monitor), None);
    }
}
