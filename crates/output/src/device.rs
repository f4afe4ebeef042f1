//! D3D11 device management

use crate::{OutputError, OutputResult};
use windows::{
    core::Interface,
    Win32::Graphics::{
        Direct3D::{
            D3D_DRIVER_TYPE, D3D_DRIVER_TYPE_HARDWARE, D3D_DRIVER_TYPE_REFERENCE,
            D3D_DRIVER_TYPE_WARP, D3D_FEATURE_LEVEL_10_0, D3D_FEATURE_LEVEL_10_1,
            D3D_FEATURE_LEVEL_11_0,
        },
        Direct3D11::{
            D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext,
            D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_SDK_VERSION,
        },
        Dxgi::{IDXGIDevice, IDXGIFactory2},
    },
};

/// D3D11 device wrapper for the output pipeline.
pub struct GraphicsDevice {
    device: ID3D11Device,
    context: ID3D11DeviceContext,
    factory: IDXGIFactory2,
}

impl GraphicsDevice {
    /// Create a device, preferring hardware and falling back to software
    /// rasterizers when none is present.
    pub fn new() -> OutputResult<Self> {
        const DRIVER_TYPES: [D3D_DRIVER_TYPE; 3] = [
            D3D_DRIVER_TYPE_HARDWARE,
            D3D_DRIVER_TYPE_WARP,
            D3D_DRIVER_TYPE_REFERENCE,
        ];
        const FEATURE_LEVELS: [windows::Win32::Graphics::Direct3D::D3D_FEATURE_LEVEL; 3] = [
            D3D_FEATURE_LEVEL_11_0,
            D3D_FEATURE_LEVEL_10_1,
            D3D_FEATURE_LEVEL_10_0,
        ];

        unsafe {
            for driver_type in DRIVER_TYPES {
                let mut device: Option<ID3D11Device> = None;
                let mut context: Option<ID3D11DeviceContext> = None;

                let created = D3D11CreateDevice(
                    None,
                    driver_type,
                    None,
                    D3D11_CREATE_DEVICE_BGRA_SUPPORT,
                    Some(&FEATURE_LEVELS),
                    D3D11_SDK_VERSION,
                    Some(&mut device),
                    None,
                    Some(&mut context),
                );

                if created.is_ok() {
                    let device = device.ok_or(OutputError::NoDevice)?;
                    let context = context.ok_or(OutputError::NoDevice)?;

                    // Walk up to the DXGI factory that owns the adapter, so
                    // the swapchain is created on the same device.
                    let dxgi_device: IDXGIDevice = device.cast()?;
                    let adapter = dxgi_device.GetAdapter()?;
                    let factory: IDXGIFactory2 = adapter.GetParent()?;

                    tracing::debug!(?driver_type, "created output device");

                    return Ok(Self {
                        device,
                        context,
                        factory,
                    });
                }
            }
        }

        Err(OutputError::NoDevice)
    }

    pub fn device(&self) -> &ID3D11Device {
        &self.device
    }

    pub fn context(&self) -> &ID3D11DeviceContext {
        &self.context
    }

    pub fn factory(&self) -> &IDXGIFactory2 {
        &self.factory
    }
}
