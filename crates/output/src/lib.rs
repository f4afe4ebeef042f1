//! Frame Surface Manager for RegionCast
//!
//! Owns the D3D11 device, the off-desktop output window, the swapchain and
//! the keyed-mutex shared surface an external producer writes frames into.

pub mod device;
pub mod manager;
pub mod pipeline;
pub mod surface;
pub mod target;
pub mod window;

pub use manager::OutputManager;
pub use surface::SharedSurface;

use common::sync::LockError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("no compatible graphics device found")]
    NoDevice,

    #[error("shader compilation failed: {0}")]
    Shader(String),

    #[error("shared surface allocation failed at {width}x{height}; the selected area may be too big")]
    SurfaceTooLarge { width: u32, height: u32 },

    #[error("no shared surface to render")]
    NoSurface,

    #[error("shared surface lock timed out after {attempts} attempts")]
    SyncTimeout { attempts: u32 },
}

impl From<LockError<OutputError>> for OutputError {
    fn from(err: LockError<OutputError>) -> Self {
        match err {
            LockError::Timeout { attempts } => OutputError::SyncTimeout { attempts },
            LockError::Lock(e) => e,
        }
    }
}

pub type OutputResult<T> = Result<T, OutputError>;
