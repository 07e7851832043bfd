//! Render error types.

use thiserror::Error;
use trigon_gpu::GpuError;

/// Errors surfaced by the render engine.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Startup failed; every object created so far has been released.
    #[error("Initialization failed: {0}")]
    Initialization(#[source] GpuError),

    /// Unrecoverable GPU error while rendering.
    #[error(transparent)]
    Gpu(#[from] GpuError),

    /// The engine was used after shutdown.
    #[error("Render engine has been shut down")]
    Released,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, RenderError>;
