//! Command buffer management.

use crate::error::{GpuError, Result};
use ash::vk;

/// Command pool for allocating command buffers.
///
/// The default value holds a null pool, which is safe to destroy.
#[derive(Debug, Default)]
pub struct CommandPool {
    pool: vk::CommandPool,
}

impl CommandPool {
    /// Create a pool whose buffers can be reset individually.
    ///
    /// # Safety
    /// The device must be valid and the queue family must exist.
    pub unsafe fn new(device: &ash::Device, queue_family: u32) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

        let pool = unsafe { device.create_command_pool(&create_info, None) }?;

        Ok(Self { pool })
    }

    /// Allocate a single primary command buffer.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn allocate_command_buffer(&self, device: &ash::Device) -> Result<vk::CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        let buffers = unsafe { device.allocate_command_buffers(&alloc_info) }?;
        buffers
            .first()
            .copied()
            .ok_or_else(|| GpuError::InvalidState("Driver returned no command buffer".to_string()))
    }

    /// Return a command buffer to the pool. Null handles are ignored.
    ///
    /// # Safety
    /// The buffer must come from this pool and must not be pending.
    pub unsafe fn free_command_buffer(&self, device: &ash::Device, buffer: vk::CommandBuffer) {
        if buffer != vk::CommandBuffer::null() {
            unsafe { device.free_command_buffers(self.pool, &[buffer]) };
        }
    }

    /// Destroy the command pool, implicitly freeing every buffer from it.
    ///
    /// # Safety
    /// The device must be valid and the pool must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        unsafe { device.destroy_command_pool(self.pool, None) };
        self.pool = vk::CommandPool::null();
    }
}

/// Begin recording a command buffer.
///
/// # Safety
/// The device and command buffer must be valid.
pub unsafe fn begin_command_buffer(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    flags: vk::CommandBufferUsageFlags,
) -> Result<()> {
    let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
    unsafe { device.begin_command_buffer(cmd, &begin_info) }.map_err(GpuError::CommandRecording)
}

/// End recording a command buffer.
///
/// # Safety
/// The device and command buffer must be valid.
pub unsafe fn end_command_buffer(device: &ash::Device, cmd: vk::CommandBuffer) -> Result<()> {
    unsafe { device.end_command_buffer(cmd) }.map_err(GpuError::CommandRecording)
}

/// Reset a command buffer back to the initial state.
///
/// # Safety
/// The buffer's pool must allow individual resets and the buffer must not be pending.
pub unsafe fn reset_command_buffer(device: &ash::Device, cmd: vk::CommandBuffer) -> Result<()> {
    unsafe { device.reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty()) }?;
    Ok(())
}

/// Submit command buffers to a queue.
///
/// # Safety
/// All handles must be valid.
pub unsafe fn submit_command_buffers(
    device: &ash::Device,
    queue: vk::Queue,
    command_buffers: &[vk::CommandBuffer],
    wait_semaphores: &[vk::Semaphore],
    wait_stages: &[vk::PipelineStageFlags],
    signal_semaphores: &[vk::Semaphore],
    fence: vk::Fence,
) -> Result<()> {
    let submit_info = vk::SubmitInfo::default()
        .command_buffers(command_buffers)
        .wait_semaphores(wait_semaphores)
        .wait_dst_stage_mask(wait_stages)
        .signal_semaphores(signal_semaphores);

    unsafe { device.queue_submit(queue, &[submit_info], fence) }?;
    Ok(())
}
