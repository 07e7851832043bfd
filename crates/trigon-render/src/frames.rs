//! GPU objects behind the frame loop.
//!
//! [`GpuFrames`] owns everything created from the device. [`FrameDriver`]
//! pairs it with the window for one render call and implements
//! [`FrameBackend`] for the scheduler.

use crate::recorder::{plan_draws, record_frame, RecordTarget};
use crate::scheduler::FrameBackend;
use ash::vk;
use std::time::Duration;
use trigon_core::{EngineConfig, Scene};
use trigon_gpu::command::{reset_command_buffer, submit_command_buffers};
use trigon_gpu::{
    AcquireOutcome, CommandPool, GpuAllocator, GpuContext, GpuError, MeshHandle, MeshStore,
    PipelineState, PresentOutcome, RenderWindow, Result, ShaderLoader, SwapchainPlan,
    SwapchainState, SwapchainSupport, TRIANGLE_VERTICES,
};

/// Pump events until the window has a drawable area again.
///
/// Returns how many times the window was polled.
pub fn wait_while_minimized<W: RenderWindow + ?Sized>(window: &mut W, poll_interval: Duration) -> u32 {
    let mut polls = 0;
    while window.is_minimized() {
        if polls == 0 {
            tracing::info!("Window minimized, pausing rendering");
        }
        window.pump_events();
        std::thread::sleep(poll_interval);
        polls += 1;
    }
    polls
}

/// Every GPU object the engine creates.
///
/// Fields start out empty (null handles) and are filled during startup, so
/// [`GpuFrames::release`] works at any point of construction.
pub struct GpuFrames {
    context: GpuContext,
    allocator: GpuAllocator,
    meshes: MeshStore,
    triangle: MeshHandle,
    shaders: Box<dyn ShaderLoader>,
    pipeline: PipelineState,
    command_pool: CommandPool,
    swapchain: SwapchainState,
    config: EngineConfig,
    released: bool,
}

impl GpuFrames {
    /// Create every GPU object for the window.
    ///
    /// Anything created before a failure is released before returning.
    pub fn new<W: RenderWindow + ?Sized>(
        window: &W,
        width: u32,
        height: u32,
        config: EngineConfig,
        shaders: Box<dyn ShaderLoader>,
    ) -> Result<Self> {
        let context = GpuContext::new(window, &config)?;
        let allocator = unsafe {
            GpuAllocator::new(context.instance(), context.device(), context.physical_device())
        }?;

        let mut frames = Self {
            context,
            allocator,
            meshes: MeshStore::new(),
            triangle: MeshHandle::default(),
            shaders,
            pipeline: PipelineState::default(),
            command_pool: CommandPool::default(),
            swapchain: SwapchainState::default(),
            config,
            released: false,
        };

        // On error `frames` drops here and releases what exists.
        frames.triangle = frames
            .meshes
            .upload(&mut frames.allocator, "triangle", &TRIANGLE_VERTICES)?;

        let plan = frames.plan_swapchain(width, height)?;
        frames.pipeline = unsafe {
            PipelineState::build(
                frames.context.device(),
                frames.shaders.as_ref(),
                &frames.config.vertex_shader,
                &frames.config.fragment_shader,
                plan.format.format,
                plan.extent,
            )
        }?;

        frames.command_pool = unsafe {
            CommandPool::new(
                frames.context.device(),
                frames.context.choice().families.graphics,
            )
        }?;

        frames.swapchain = unsafe {
            SwapchainState::create(
                &frames.context,
                &plan,
                frames.pipeline.render_pass,
                &frames.command_pool,
            )
        }?;

        Ok(frames)
    }

    fn plan_swapchain(&self, width: u32, height: u32) -> Result<SwapchainPlan> {
        let surface = self.context.surface();
        let support = unsafe {
            SwapchainSupport::query(&surface.loader, self.context.physical_device(), surface.handle)
        }?;
        SwapchainPlan::new(&support, self.config.present, width, height)
    }

    pub const fn context(&self) -> &GpuContext {
        &self.context
    }

    pub const fn swapchain(&self) -> &SwapchainState {
        &self.swapchain
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rebuild the swapchain and every slot for the given size.
    ///
    /// The pipeline is rebuilt only when the surface format changed.
    pub fn rebuild_swapchain(&mut self, width: u32, height: u32) -> Result<()> {
        self.context.wait_idle()?;

        unsafe {
            self.swapchain.destroy(
                self.context.device(),
                self.context.swapchain_loader(),
                Some(&self.command_pool),
            );
        }

        let plan = self.plan_swapchain(width, height)?;
        if plan.format.format != self.pipeline.format {
            tracing::info!(
                "Surface format changed from {:?} to {:?}, rebuilding pipeline",
                self.pipeline.format,
                plan.format.format
            );
            unsafe { self.pipeline.destroy(self.context.device()) };
            self.pipeline = unsafe {
                PipelineState::build(
                    self.context.device(),
                    self.shaders.as_ref(),
                    &self.config.vertex_shader,
                    &self.config.fragment_shader,
                    plan.format.format,
                    plan.extent,
                )
            }?;
        }
        self.pipeline.extent = plan.extent;

        self.swapchain = unsafe {
            SwapchainState::create(
                &self.context,
                &plan,
                self.pipeline.render_pass,
                &self.command_pool,
            )
        }?;

        Ok(())
    }

    /// Release everything in dependency order. Safe to call repeatedly.
    ///
    /// Command pool, pipeline, swapchain and slots, mesh buffers, allocator,
    /// then the context (device, surface, debug messenger, instance).
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Err(err) = self.context.wait_idle() {
            tracing::warn!("Device wait failed during shutdown: {err}");
        }

        let device = self.context.device();
        unsafe {
            // Destroying the pool frees every slot's command buffer.
            self.command_pool.destroy(device);
            self.pipeline.destroy(device);
            self.swapchain
                .destroy(device, self.context.swapchain_loader(), None);
        }

        self.meshes.release(&mut self.allocator);
        self.allocator.shutdown();
        self.context.destroy();

        tracing::info!("GPU resources released");
    }

    fn slot(&self, slot: usize) -> Result<&trigon_gpu::FrameSlot> {
        self.swapchain
            .slots
            .get(slot)
            .ok_or_else(|| GpuError::InvalidState(format!("No frame slot {slot}")))
    }
}

impl Drop for GpuFrames {
    fn drop(&mut self) {
        self.release();
    }
}

/// One render call's view of the window and the GPU objects.
pub struct FrameDriver<'a, W: RenderWindow + ?Sized> {
    pub window: &'a mut W,
    pub gpu: &'a mut GpuFrames,
}

impl<W: RenderWindow + ?Sized> FrameBackend for FrameDriver<'_, W> {
    fn slot_count(&self) -> usize {
        self.gpu.swapchain.image_count()
    }

    fn wait_slot(&mut self, slot: usize) -> Result<()> {
        let sync = self.gpu.slot(slot)?.sync;
        unsafe { sync.wait(self.gpu.context.device()) }
    }

    fn acquire(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let semaphore = self.gpu.slot(slot)?.sync.image_available;
        unsafe {
            self.gpu
                .swapchain
                .acquire(self.gpu.context.swapchain_loader(), semaphore)
        }
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        let frame = *self.gpu.slot(slot)?;
        let device = self.gpu.context.device();
        unsafe {
            frame.sync.reset(device)?;
            reset_command_buffer(device, frame.command_buffer)
        }
    }

    fn record(&mut self, slot: usize, image_index: u32, scene: &Scene) -> Result<()> {
        let command_buffer = self.gpu.slot(slot)?.command_buffer;
        let framebuffer = self.gpu.slot(image_index as usize)?.framebuffer;
        let mesh = self
            .gpu
            .meshes
            .get(self.gpu.triangle)
            .ok_or_else(|| GpuError::InvalidState("Triangle mesh missing".to_string()))?;

        let target = RecordTarget {
            command_buffer,
            framebuffer,
            extent: self.gpu.swapchain.extent,
        };
        let draws = plan_draws(scene);

        unsafe {
            record_frame(
                self.gpu.context.device(),
                &target,
                &self.gpu.pipeline,
                mesh,
                &draws,
                self.gpu.config.clear_color,
            )
        }
    }

    fn submit(&mut self, slot: usize) -> Result<()> {
        let frame = *self.gpu.slot(slot)?;
        unsafe {
            submit_command_buffers(
                self.gpu.context.device(),
                self.gpu.context.graphics_queue(),
                &[frame.command_buffer],
                &[frame.sync.image_available],
                &[vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
                &[frame.sync.render_finished],
                frame.sync.in_flight,
            )
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> Result<PresentOutcome> {
        let render_finished = self.gpu.slot(slot)?.sync.render_finished;
        unsafe {
            self.gpu.swapchain.present(
                self.gpu.context.swapchain_loader(),
                self.gpu.context.present_queue(),
                image_index,
                &[render_finished],
            )
        }
    }

    fn recreate(&mut self) -> Result<()> {
        let polls = wait_while_minimized(self.window, self.gpu.config.minimized_poll_interval());
        if polls > 0 {
            tracing::info!("Window restored after {polls} polls");
        }
        let (width, height) = self.window.framebuffer_size();
        self.gpu.rebuild_swapchain(width, height)
    }
}
