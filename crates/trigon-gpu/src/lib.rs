//! Vulkan layer for the Trigon renderer.
//!
//! This crate provides:
//! - Instance creation and validation message routing
//! - Physical device selection and logical device creation
//! - The [`RenderWindow`] seam between the renderer and a windowing system
//! - Swapchain planning and per-image frame slots
//! - Render pass and graphics pipeline construction
//! - Command pools, synchronization primitives and buffer memory
//! - The shared triangle mesh and its arena

pub mod command;
pub mod context;
pub mod device;
pub mod error;
pub mod instance;
pub mod memory;
pub mod mesh;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use command::CommandPool;
pub use context::GpuContext;
pub use device::{
    DeviceCandidate, FamilyProbe, FamilySlot, PhysicalDeviceChoice, QueueFamilies,
    ResolvedFamilies,
};
pub use error::{GpuError, Result};
pub use memory::{GpuAllocator, GpuBuffer};
pub use mesh::{GpuMesh, MeshHandle, MeshStore, ObjectData, Vertex, TRIANGLE_VERTICES};
pub use pipeline::PipelineState;
pub use shader::{FileShaderLoader, ShaderLoader};
pub use surface::{RenderWindow, Surface};
pub use swapchain::{
    AcquireOutcome, FrameSlot, PresentOutcome, SwapchainPlan, SwapchainState, SwapchainSupport,
};
pub use sync::FrameSync;
