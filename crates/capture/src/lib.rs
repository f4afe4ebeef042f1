//! Capture producer boundary for RegionCast
//!
//! The producer is the other side of the shared-surface handshake: an
//! independent component that opens the surface by handle and writes frames
//! into it. `MonitorProducer` is the in-tree reference implementation built
//! on Windows.Graphics.Capture; an out-of-process producer would implement
//! the same contract.

pub mod d3d11;
pub mod producer;

pub use d3d11::CaptureDevice;
pub use producer::MonitorProducer;

use common::sync::LockError;
use common::Rect;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Windows API error: {0}")]
    Windows(#[from] windows::core::Error),

    #[error("producer not initialized")]
    NotInitialized,

    #[error("capture is not running")]
    NotRunning,

    #[error("target rectangle does not intersect its monitor")]
    OffScreen,

    #[error("shared surface lock timed out after {attempts} attempts")]
    SyncTimeout { attempts: u32 },
}

impl From<LockError<CaptureError>> for CaptureError {
    fn from(err: LockError<CaptureError>) -> Self {
        match err {
            LockError::Timeout { attempts } => CaptureError::SyncTimeout { attempts },
            LockError::Lock(e) => e,
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;

/// Cross-process handle of the consumer's shared surface. Must be
/// re-queried after every target-rect change; the underlying texture (and
/// therefore the handle) changes identity on each recreation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedFrameHandle(pub isize);

/// Operations every capture producer implements.
///
/// Each returns a status; a failure is user-visible and terminates the
/// session path that invoked it.
pub trait CaptureProducer {
    fn initialize(&mut self) -> CaptureResult<()>;

    fn start_capture(&mut self) -> CaptureResult<()>;

    /// Write one frame of `rect` into the surface behind `target`.
    fn write_frame(&mut self, target: SharedFrameHandle, rect: Rect) -> CaptureResult<()>;

    fn stop_capture(&mut self) -> CaptureResult<()>;

    fn shutdown(&mut self) -> CaptureResult<()>;
}
