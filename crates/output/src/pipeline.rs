//! Textured-quad render pipeline
//!
//! Fixed-function part of the output path: a flip-sequential swapchain and
//! a two-triangle quad that stretches the shared surface over the whole
//! viewport.

use crate::{device::GraphicsDevice, OutputError, OutputResult};
use windows::core::{s, PCSTR};
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::{
    Direct3D::{Fxc::D3DCompile, ID3DBlob},
    Direct3D11::{
        ID3D11BlendState, ID3D11Buffer, ID3D11InputLayout, ID3D11PixelShader,
        ID3D11RenderTargetView, ID3D11SamplerState, ID3D11ShaderResourceView, ID3D11Texture2D,
        ID3D11VertexShader, D3D11_BIND_VERTEX_BUFFER, D3D11_BLEND_DESC, D3D11_BLEND_INV_SRC_ALPHA,
        D3D11_BLEND_ONE, D3D11_BLEND_OP_ADD, D3D11_BLEND_SRC_ALPHA, D3D11_BLEND_ZERO,
        D3D11_BUFFER_DESC, D3D11_COLOR_WRITE_ENABLE_ALL, D3D11_COMPARISON_NEVER,
        D3D11_FILTER_MIN_MAG_MIP_LINEAR, D3D11_INPUT_ELEMENT_DESC, D3D11_INPUT_PER_VERTEX_DATA,
        D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST, D3D11_SAMPLER_DESC, D3D11_SUBRESOURCE_DATA,
        D3D11_TEXTURE_ADDRESS_CLAMP, D3D11_USAGE_IMMUTABLE, D3D11_VIEWPORT,
    },
    Dxgi::{
        Common::{DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_FORMAT_R32G32B32_FLOAT, DXGI_FORMAT_R32G32_FLOAT, DXGI_SAMPLE_DESC},
        IDXGISwapChain1, DXGI_PRESENT, DXGI_SWAP_CHAIN_DESC1, DXGI_SWAP_CHAIN_FLAG,
        DXGI_SWAP_EFFECT_FLIP_SEQUENTIAL, DXGI_USAGE_RENDER_TARGET_OUTPUT,
    },
};

const BACK_BUFFER_COUNT: u32 = 2;

/// Quad shaders; the pixel stage just samples the shared surface.
const QUAD_SHADER_SOURCE: &str = r#"
struct VSInput {
    float3 pos : POSITION;
    float2 tex : TEXCOORD0;
};

struct PSInput {
    float4 pos : SV_POSITION;
    float2 tex : TEXCOORD0;
};

Texture2D frame : register(t0);
SamplerState frameSampler : register(s0);

PSInput VSMain(VSInput input) {
    PSInput output;
    output.pos = float4(input.pos, 1.0);
    output.tex = input.tex;
    return output;
}

float4 PSMain(PSInput input) : SV_TARGET {
    return frame.Sample(frameSampler, input.tex);
}
"#;

#[repr(C)]
struct Vertex {
    position: [f32; 3],
    texcoord: [f32; 2],
}

/// Two triangles covering clip space, V flipped to texture space.
const QUAD_VERTICES: [Vertex; 6] = [
    Vertex { position: [-1.0, -1.0, 0.0], texcoord: [0.0, 1.0] },
    Vertex { position: [-1.0, 1.0, 0.0], texcoord: [0.0, 0.0] },
    Vertex { position: [1.0, -1.0, 0.0], texcoord: [1.0, 1.0] },
    Vertex { position: [1.0, -1.0, 0.0], texcoord: [1.0, 1.0] },
    Vertex { position: [-1.0, 1.0, 0.0], texcoord: [0.0, 0.0] },
    Vertex { position: [1.0, 1.0, 0.0], texcoord: [1.0, 0.0] },
];

/// Swapchain plus the fixed draw state for the textured quad.
pub struct RenderPipeline {
    swap_chain: IDXGISwapChain1,
    backbuffer_rtv: Option<ID3D11RenderTargetView>,
    sampler: ID3D11SamplerState,
    blend: ID3D11BlendState,
    vertex_shader: ID3D11VertexShader,
    pixel_shader: ID3D11PixelShader,
    input_layout: ID3D11InputLayout,
    vertex_buffer: ID3D11Buffer,
}

impl RenderPipeline {
    pub fn new(
        device: &GraphicsDevice,
        hwnd: HWND,
        width: u32,
        height: u32,
    ) -> OutputResult<Self> {
        let swap_chain = create_swap_chain(device, hwnd, width, height)?;
        let backbuffer_rtv = Some(create_backbuffer_rtv(device, &swap_chain)?);

        let vs_bytecode = compile_shader(s!("VSMain"), s!("vs_5_0"))?;
        let ps_bytecode = compile_shader(s!("PSMain"), s!("ps_5_0"))?;

        unsafe {
            let d3d = device.device();

            let mut vertex_shader: Option<ID3D11VertexShader> = None;
            d3d.CreateVertexShader(&vs_bytecode, None, Some(&mut vertex_shader))?;
            let vertex_shader =
                vertex_shader.ok_or_else(|| OutputError::Shader("vertex stage".into()))?;

            let mut pixel_shader: Option<ID3D11PixelShader> = None;
            d3d.CreatePixelShader(&ps_bytecode, None, Some(&mut pixel_shader))?;
            let pixel_shader =
                pixel_shader.ok_or_else(|| OutputError::Shader("pixel stage".into()))?;

            let layout_desc = [
                D3D11_INPUT_ELEMENT_DESC {
                    SemanticName: s!("POSITION"),
                    SemanticIndex: 0,
                    Format: DXGI_FORMAT_R32G32B32_FLOAT,
                    InputSlot: 0,
                    AlignedByteOffset: 0,
                    InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                    InstanceDataStepRate: 0,
                },
                D3D11_INPUT_ELEMENT_DESC {
                    SemanticName: s!("TEXCOORD"),
                    SemanticIndex: 0,
                    Format: DXGI_FORMAT_R32G32_FLOAT,
                    InputSlot: 0,
                    AlignedByteOffset: 12,
                    InputSlotClass: D3D11_INPUT_PER_VERTEX_DATA,
                    InstanceDataStepRate: 0,
                },
            ];

            let mut input_layout: Option<ID3D11InputLayout> = None;
            d3d.CreateInputLayout(&layout_desc, &vs_bytecode, Some(&mut input_layout))?;
            let input_layout =
                input_layout.ok_or_else(|| OutputError::Shader("input layout".into()))?;

            let sampler_desc = D3D11_SAMPLER_DESC {
                Filter: D3D11_FILTER_MIN_MAG_MIP_LINEAR,
                AddressU: D3D11_TEXTURE_ADDRESS_CLAMP,
                AddressV: D3D11_TEXTURE_ADDRESS_CLAMP,
                AddressW: D3D11_TEXTURE_ADDRESS_CLAMP,
                ComparisonFunc: D3D11_COMPARISON_NEVER,
                MinLOD: 0.0,
                MaxLOD: f32::MAX,
                ..Default::default()
            };
            let mut sampler: Option<ID3D11SamplerState> = None;
            d3d.CreateSamplerState(&sampler_desc, Some(&mut sampler))?;
            let sampler = sampler.ok_or_else(|| OutputError::Windows(windows::core::Error::empty()))?;

            let mut blend_desc = D3D11_BLEND_DESC::default();
            blend_desc.RenderTarget[0].BlendEnable = true.into();
            blend_desc.RenderTarget[0].SrcBlend = D3D11_BLEND_SRC_ALPHA;
            blend_desc.RenderTarget[0].DestBlend = D3D11_BLEND_INV_SRC_ALPHA;
            blend_desc.RenderTarget[0].BlendOp = D3D11_BLEND_OP_ADD;
            blend_desc.RenderTarget[0].SrcBlendAlpha = D3D11_BLEND_ONE;
            blend_desc.RenderTarget[0].DestBlendAlpha = D3D11_BLEND_ZERO;
            blend_desc.RenderTarget[0].BlendOpAlpha = D3D11_BLEND_OP_ADD;
            blend_desc.RenderTarget[0].RenderTargetWriteMask = D3D11_COLOR_WRITE_ENABLE_ALL.0 as u8;
            let mut blend: Option<ID3D11BlendState> = None;
            d3d.CreateBlendState(&blend_desc, Some(&mut blend))?;
            let blend = blend.ok_or_else(|| OutputError::Windows(windows::core::Error::empty()))?;

            let buffer_desc = D3D11_BUFFER_DESC {
                ByteWidth: std::mem::size_of_val(&QUAD_VERTICES) as u32,
                Usage: D3D11_USAGE_IMMUTABLE,
                BindFlags: D3D11_BIND_VERTEX_BUFFER.0 as u32,
                CPUAccessFlags: 0,
                MiscFlags: 0,
                StructureByteStride: 0,
            };
            let init_data = D3D11_SUBRESOURCE_DATA {
                pSysMem: QUAD_VERTICES.as_ptr() as *const _,
                SysMemPitch: 0,
                SysMemSlicePitch: 0,
            };
            let mut vertex_buffer: Option<ID3D11Buffer> = None;
            d3d.CreateBuffer(&buffer_desc, Some(&init_data), Some(&mut vertex_buffer))?;
            let vertex_buffer =
                vertex_buffer.ok_or_else(|| OutputError::Windows(windows::core::Error::empty()))?;

            Ok(Self {
                swap_chain,
                backbuffer_rtv,
                sampler,
                blend,
                vertex_shader,
                pixel_shader,
                input_layout,
                vertex_buffer,
            })
        }
    }

    /// Resize the backbuffers to the new target dimensions. The RTV must be
    /// dropped before the buffers can be resized.
    pub fn resize(&mut self, device: &GraphicsDevice, width: u32, height: u32) -> OutputResult<()> {
        self.backbuffer_rtv = None;

        unsafe {
            self.swap_chain.ResizeBuffers(
                BACK_BUFFER_COUNT,
                width,
                height,
                DXGI_FORMAT_B8G8R8A8_UNORM,
                DXGI_SWAP_CHAIN_FLAG(0),
            )?;
        }

        self.backbuffer_rtv = Some(create_backbuffer_rtv(device, &self.swap_chain)?);
        Ok(())
    }

    /// Draw the shared surface over the full viewport.
    pub fn draw(
        &self,
        device: &GraphicsDevice,
        srv: &ID3D11ShaderResourceView,
        width: u32,
        height: u32,
    ) -> OutputResult<()> {
        let rtv = self.backbuffer_rtv.as_ref().ok_or(OutputError::NoSurface)?;

        unsafe {
            let context = device.context();

            let viewport = D3D11_VIEWPORT {
                TopLeftX: 0.0,
                TopLeftY: 0.0,
                Width: width as f32,
                Height: height as f32,
                MinDepth: 0.0,
                MaxDepth: 1.0,
            };
            context.RSSetViewports(Some(&[viewport]));

            context.OMSetBlendState(&self.blend, None, 0xffffffff);
            context.OMSetRenderTargets(Some(&[Some(rtv.clone())]), None);
            context.VSSetShader(&self.vertex_shader, None);
            context.PSSetShader(&self.pixel_shader, None);
            context.PSSetShaderResources(0, Some(&[Some(srv.clone())]));
            context.PSSetSamplers(0, Some(&[Some(self.sampler.clone())]));
            context.IASetPrimitiveTopology(D3D11_PRIMITIVE_TOPOLOGY_TRIANGLELIST);
            context.IASetInputLayout(&self.input_layout);

            let stride = std::mem::size_of::<Vertex>() as u32;
            let offset = 0u32;
            context.IASetVertexBuffers(
                0,
                1,
                Some(&Some(self.vertex_buffer.clone())),
                Some(&stride),
                Some(&offset),
            );

            context.Draw(QUAD_VERTICES.len() as u32, 0);
        }

        Ok(())
    }

    /// Present with vsync.
    pub fn present(&self) -> OutputResult<()> {
        unsafe { self.swap_chain.Present(1, DXGI_PRESENT(0)).ok()? };
        Ok(())
    }
}

fn create_swap_chain(
    device: &GraphicsDevice,
    hwnd: HWND,
    width: u32,
    height: u32,
) -> OutputResult<IDXGISwapChain1> {
    let desc = DXGI_SWAP_CHAIN_DESC1 {
        Width: width,
        Height: height,
        Format: DXGI_FORMAT_B8G8R8A8_UNORM,
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: 1,
            Quality: 0,
        },
        BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
        BufferCount: BACK_BUFFER_COUNT,
        SwapEffect: DXGI_SWAP_EFFECT_FLIP_SEQUENTIAL,
        ..Default::default()
    };

    let swap_chain = unsafe {
        device
            .factory()
            .CreateSwapChainForHwnd(device.device(), hwnd, &desc, None, None)?
    };

    Ok(swap_chain)
}

fn create_backbuffer_rtv(
    device: &GraphicsDevice,
    swap_chain: &IDXGISwapChain1,
) -> OutputResult<ID3D11RenderTargetView> {
    unsafe {
        let backbuffer: ID3D11Texture2D = swap_chain.GetBuffer(0)?;

        let mut rtv: Option<ID3D11RenderTargetView> = None;
        device
            .device()
            .CreateRenderTargetView(&backbuffer, None, Some(&mut rtv))?;
        rtv.ok_or_else(|| OutputError::Windows(windows::core::Error::empty()))
    }
}

fn compile_shader(entry: PCSTR, target: PCSTR) -> OutputResult<Vec<u8>> {
    unsafe {
        let mut code: Option<ID3DBlob> = None;
        let mut errors: Option<ID3DBlob> = None;

        let compiled = D3DCompile(
            QUAD_SHADER_SOURCE.as_ptr() as *const _,
            QUAD_SHADER_SOURCE.len(),
            None,
            None,
            None,
            entry,
            target,
            0,
            0,
            &mut code,
            Some(&mut errors),
        );

        if let Err(e) = compiled {
            let message = errors
                .map(|blob| blob_to_string(&blob))
                .unwrap_or_else(|| e.message().to_string());
            return Err(OutputError::Shader(message));
        }

        let blob = code.ok_or_else(|| OutputError::Shader("empty shader blob".into()))?;
        Ok(blob_to_bytes(&blob))
    }
}

unsafe fn blob_to_bytes(blob: &ID3DBlob) -> Vec<u8> {
    std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()).to_vec()
}

unsafe fn blob_to_string(blob: &ID3DBlob) -> String {
    String::from_utf8_lossy(std::slice::from_raw_parts(
        blob.GetBufferPointer() as *const u8,
        blob.GetBufferSize(),
    ))
    .into_owned()
}
