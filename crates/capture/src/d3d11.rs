//! Producer-side D3D11 device
//!
//! The producer runs on its own device; the shared surface is the only
//! resource both devices can see, which is what makes the same code work
//! when the producer moves out of process.

use crate::CaptureResult;
use windows::{
    core::Interface,
    Graphics::DirectX::Direct3D11::{IDirect3DDevice, IDirect3DSurface},
    Win32::Foundation::HANDLE,
    Win32::Graphics::{
        Direct3D::{D3D_DRIVER_TYPE_HARDWARE, D3D_FEATURE_LEVEL_11_0},
        Direct3D11::{
            D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_SDK_VERSION,
        },
        Dxgi::{IDXGIDevice, IDXGIKeyedMutex},
    },
    Win32::System::WinRT::Direct3D11::{
        CreateDirect3D11DeviceFromDXGIDevice, IDirect3DDxgiInterfaceAccess,
    },
};

/// D3D11 device wrapper for the capture producer.
pub struct CaptureDevice {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    winrt_device: IDirect3DDevice,
}

impl CaptureDevice {
    pub fn new() -> CaptureResult<Self> {
        unsafe {
            let mut device: Option<ID3D11Device> = None;
            let mut context: Option<ID3D11DeviceContext> = None;

            D3D11CreateDevice(
                None,
                D3D_DRIVER_TYPE_HARDWARE,
                None,
                D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                Some(&[D3D_FEATURE_LEVEL_11_0]),
                D3D11_SDK_VERSION,
                Some(&mut device),
                None,
                Some(&mut context),
            )?;

            let device = device.ok_or_else(windows::core::Error::empty)?;
            let context = context.ok_or_else(windows::core::Error::empty)?;

            // WinRT wrapper the frame pool is created against.
            let dxgi_device: IDXGIDevice = device.cast()?;
            let inspectable = CreateDirect3D11DeviceFromDXGIDevice(&dxgi_device)?;
            let winrt_device: IDirect3DDevice = inspectable.cast()?;

            Ok(Self {
                device,
                context,
                winrt_device,
            })
        }
    }

    pub fn context(&self) -> &ID3D11DeviceContext {
        &self.context
    }

    pub fn winrt_device(&self) -> &IDirect3DDevice {
        &self.winrt_device
    }

    /// Open the consumer's shared surface on this device.
    pub fn open_shared_texture(
        &self,
        handle: isize,
    ) -> CaptureResult<(ID3D11Texture2D, IDXGIKeyedMutex)> {
        unsafe {
            let texture: ID3D11Texture2D = self
                .device
                .OpenSharedResource(HANDLE(handle as *mut std::ffi::c_void))?;
            let mutex: IDXGIKeyedMutex = texture.cast()?;
            Ok((texture, mutex))
        }
    }

    /// Unwrap the D3D11 texture behind a WinRT capture surface.
    pub fn texture_from_surface(surface: &IDirect3DSurface) -> CaptureResult<ID3D11Texture2D> {
        unsafe {
            let access: IDirect3DDxgiInterfaceAccess = surface.cast()?;
            Ok(access.GetInterface()?)
        }
    }
}
