//! GPU error types.

use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be loaded.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Requested instance extensions or layers are not available.
    #[error("Missing instance support: {}", .0.join(", "))]
    MissingInstanceSupport(Vec<String>),

    /// No GPU exposes the required device extensions.
    #[error("No GPU exposes the required device extensions")]
    NoCompatibleDevice,

    /// Every compatible GPU scored zero.
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// The chosen GPU lacks a graphics or present queue family.
    #[error("Incomplete queue families (graphics: {graphics}, present: {present})")]
    IncompleteQueueFamilies { graphics: bool, present: bool },

    /// The driver rejected logical device creation.
    #[error("Device creation failed: {0}")]
    DeviceCreation(vk::Result),

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(vk::Result),

    /// Render pass creation failed.
    #[error("Render pass creation failed: {0}")]
    RenderPassCreation(vk::Result),

    /// Pipeline layout creation failed.
    #[error("Pipeline layout creation failed: {0}")]
    PipelineLayout(vk::Result),

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(vk::Result),

    /// Beginning or ending a command buffer failed.
    #[error("Command recording failed: {0}")]
    CommandRecording(vk::Result),

    /// A shader file does not exist.
    #[error("Shader not found: {}", .path.display())]
    ShaderNotFound { path: PathBuf },

    /// A shader file exists but could not be read.
    #[error("Failed to read shader {}: {source}", .path.display())]
    ShaderRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Shader bytecode is not valid SPIR-V.
    #[error("Invalid shader: {0}")]
    InvalidShader(String),

    /// Memory allocation failed.
    #[error("Memory allocation failed: {0}")]
    AllocationFailed(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl GpuError {
    /// The driver result behind this error, if any.
    pub const fn vk_result(&self) -> Option<vk::Result> {
        match self {
            Self::Vulkan(result)
            | Self::DeviceCreation(result)
            | Self::SwapchainCreation(result)
            | Self::RenderPassCreation(result)
            | Self::PipelineLayout(result)
            | Self::PipelineCreation(result)
            | Self::CommandRecording(result) => Some(*result),
            _ => None,
        }
    }

    /// True when the device is gone and nothing but teardown is possible.
    pub fn is_device_lost(&self) -> bool {
        self.vk_result() == Some(vk::Result::ERROR_DEVICE_LOST)
    }

    /// True when the surface changed and the swapchain must be rebuilt.
    pub fn is_out_of_date(&self) -> bool {
        self.vk_result() == Some(vk::Result::ERROR_OUT_OF_DATE_KHR)
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;
