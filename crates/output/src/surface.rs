//! Keyed-mutex shared surface
//!
//! The surface is the hand-off point between this process and the capture
//! producer: the producer opens it by handle on its own device and writes
//! frames, this process samples it into the output window. Both sides
//! bracket their access with the keyed mutex under key 0.

use crate::{OutputError, OutputResult};
use common::sync::{Acquire, SurfaceLock};
use std::time::Duration;
use windows::core::{Interface, HRESULT};
use windows::Win32::Foundation::HANDLE;
use windows::Win32::Graphics::{
    Direct3D11::{
        ID3D11Device, ID3D11ShaderResourceView, ID3D11Texture2D, D3D11_BIND_RENDER_TARGET,
        D3D11_BIND_SHADER_RESOURCE, D3D11_RESOURCE_MISC_SHARED_KEYEDMUTEX, D3D11_TEXTURE2D_DESC,
        D3D11_USAGE_DEFAULT,
    },
    Dxgi::{Common::DXGI_FORMAT_B8G8R8A8_UNORM, Common::DXGI_SAMPLE_DESC, IDXGIKeyedMutex, IDXGIResource},
};

/// Key value used by both sides of the handshake.
pub const SURFACE_KEY: u64 = 0;

/// `AcquireSync` reports a busy peer with the Win32 wait code.
const WAIT_TIMEOUT_HR: HRESULT = HRESULT(0x0000_0102);

/// GPU texture shared with the capture producer.
pub struct SharedSurface {
    texture: ID3D11Texture2D,
    srv: ID3D11ShaderResourceView,
    mutex: IDXGIKeyedMutex,
    handle: HANDLE,
    width: u32,
    height: u32,
}

impl SharedSurface {
    /// Allocate a BGRA8 shared texture of the given dimensions.
    pub fn new(device: &ID3D11Device, width: u32, height: u32) -> OutputResult<Self> {
        let desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Usage: D3D11_USAGE_DEFAULT,
            BindFlags: (D3D11_BIND_RENDER_TARGET.0 | D3D11_BIND_SHADER_RESOURCE.0) as u32,
            CPUAccessFlags: 0,
            MiscFlags: D3D11_RESOURCE_MISC_SHARED_KEYEDMUTEX.0 as u32,
        };

        unsafe {
            let mut texture: Option<ID3D11Texture2D> = None;
            device
                .CreateTexture2D(&desc, None, Some(&mut texture))
                .map_err(|_| OutputError::SurfaceTooLarge { width, height })?;
            let texture = texture.ok_or(OutputError::SurfaceTooLarge { width, height })?;

            let mut srv: Option<ID3D11ShaderResourceView> = None;
            device.CreateShaderResourceView(&texture, None, Some(&mut srv))?;
            let srv = srv.ok_or_else(|| OutputError::Windows(windows::core::Error::empty()))?;

            let mutex: IDXGIKeyedMutex = texture.cast()?;

            let resource: IDXGIResource = texture.cast()?;
            let handle = resource.GetSharedHandle()?;

            tracing::debug!(width, height, "allocated shared surface");

            Ok(Self {
                texture,
                srv,
                mutex,
                handle,
                width,
                height,
            })
        }
    }

    pub fn srv(&self) -> &ID3D11ShaderResourceView {
        &self.srv
    }

    pub fn texture(&self) -> &ID3D11Texture2D {
        &self.texture
    }

    /// Cross-process handle the producer opens the texture with. Changes
    /// identity every time the surface is recreated.
    pub fn shared_handle(&self) -> isize {
        self.handle.0 as isize
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl SurfaceLock for SharedSurface {
    type Error = OutputError;

    fn try_acquire(&self, timeout: Duration) -> Result<Acquire, OutputError> {
        match unsafe { self.mutex.AcquireSync(SURFACE_KEY, timeout.as_millis() as u32) } {
            Ok(()) => Ok(Acquire::Acquired),
            Err(e) if e.code() == WAIT_TIMEOUT_HR => Ok(Acquire::TimedOut),
            Err(e) => Err(e.into()),
        }
    }

    fn release(&self) -> Result<(), OutputError> {
        unsafe { self.mutex.ReleaseSync(SURFACE_KEY) }?;
        Ok(())
    }
}
