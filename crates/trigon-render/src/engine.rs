//! The render engine facade.

use crate::error::{RenderError, Result};
use crate::frames::{FrameDriver, GpuFrames};
use crate::scheduler::{FrameScheduler, FrameStats, FrameStatus};
use ash::vk;
use trigon_core::{EngineConfig, Scene};
use trigon_gpu::{FileShaderLoader, RenderWindow, ShaderLoader};

/// Draws scenes into a window.
///
/// Owns the window and every GPU object created for it. After
/// [`RenderEngine::shutdown`] (or drop) all GPU objects are gone and
/// [`RenderEngine::render`] returns [`RenderError::Released`].
pub struct RenderEngine<W: RenderWindow> {
    gpu: Option<GpuFrames>,
    scheduler: FrameScheduler,
    window: W,
}

impl<W: RenderWindow> RenderEngine<W> {
    /// Bring up Vulkan for `window`, loading SPIR-V from the configured paths.
    pub fn initialize(width: u32, height: u32, window: W, config: EngineConfig) -> Result<Self> {
        Self::initialize_with_loader(width, height, window, config, Box::new(FileShaderLoader))
    }

    /// Like [`RenderEngine::initialize`] with a custom shader source.
    pub fn initialize_with_loader(
        width: u32,
        height: u32,
        window: W,
        config: EngineConfig,
        shaders: Box<dyn ShaderLoader>,
    ) -> Result<Self> {
        tracing::info!(
            "Initializing {} at {width}x{height} (validation: {})",
            config.app_name,
            config.validation
        );

        let gpu = GpuFrames::new(&window, width, height, config, shaders)
            .map_err(RenderError::Initialization)?;
        let scheduler = FrameScheduler::new(gpu.swapchain().image_count());

        let extent = gpu.swapchain().extent;
        tracing::info!(
            "Render engine ready on {}: {} frame slots, {}x{}",
            gpu.context().choice().name,
            scheduler.slot_count(),
            extent.width,
            extent.height
        );

        Ok(Self {
            gpu: Some(gpu),
            scheduler,
            window,
        })
    }

    /// Draw one frame of `scene`.
    ///
    /// A stale surface or a failed driver call inside the frame rebuilds the
    /// swapchain and reports it in the returned status instead of failing.
    pub fn render(&mut self, scene: &Scene) -> Result<FrameStatus> {
        let gpu = self.gpu.as_mut().ok_or(RenderError::Released)?;
        let mut driver = FrameDriver {
            window: &mut self.window,
            gpu,
        };
        self.scheduler.render_frame(&mut driver, scene)
    }

    /// Wait for the GPU and release everything. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if let Some(mut gpu) = self.gpu.take() {
            tracing::info!(
                "Shutting down after {} presented frames",
                self.scheduler.stats().presented
            );
            gpu.release();
        }
    }

    pub const fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }

    /// Slot the next frame will use.
    pub const fn frame_cursor(&self) -> usize {
        self.scheduler.cursor()
    }

    pub fn slot_count(&self) -> usize {
        self.scheduler.slot_count()
    }

    /// Current swapchain extent, or `None` after shutdown.
    pub fn extent(&self) -> Option<vk::Extent2D> {
        self.gpu.as_ref().map(|gpu| gpu.swapchain().extent)
    }

    pub const fn stats(&self) -> FrameStats {
        self.scheduler.stats()
    }
}

impl<W: RenderWindow> Drop for RenderEngine<W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
