//! Synchronization primitives.

use crate::error::Result;
use ash::vk;

/// Create a semaphore.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_semaphore(device: &ash::Device) -> Result<vk::Semaphore> {
    let create_info = vk::SemaphoreCreateInfo::default();
    Ok(unsafe { device.create_semaphore(&create_info, None) }?)
}

/// Create a fence.
///
/// # Safety
/// The device must be valid.
pub unsafe fn create_fence(device: &ash::Device, signaled: bool) -> Result<vk::Fence> {
    let flags = if signaled {
        vk::FenceCreateFlags::SIGNALED
    } else {
        vk::FenceCreateFlags::empty()
    };

    let create_info = vk::FenceCreateInfo::default().flags(flags);
    Ok(unsafe { device.create_fence(&create_info, None) }?)
}

/// Semaphores and fence owned by one frame slot.
///
/// Null handles are valid and skipped by [`FrameSync::destroy`], so a
/// partially created set can always be released.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSync {
    /// Signaled when the acquired image may be rendered to.
    pub image_available: vk::Semaphore,
    /// Signaled when rendering finished; presentation waits on it.
    pub render_finished: vk::Semaphore,
    /// Signaled when the slot's submission completed on the GPU.
    pub in_flight: vk::Fence,
}

impl FrameSync {
    /// Create the slot's sync objects. The fence starts signaled so the
    /// first wait on a fresh slot returns immediately.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn new(device: &ash::Device) -> Result<Self> {
        let mut sync = Self::default();
        let created = unsafe { sync.fill(device) };
        if let Err(err) = created {
            unsafe { sync.destroy(device) };
            return Err(err);
        }
        Ok(sync)
    }

    unsafe fn fill(&mut self, device: &ash::Device) -> Result<()> {
        self.image_available = unsafe { create_semaphore(device) }?;
        self.render_finished = unsafe { create_semaphore(device) }?;
        self.in_flight = unsafe { create_fence(device, true) }?;
        Ok(())
    }

    /// Block until the slot's previous submission has completed.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn wait(&self, device: &ash::Device) -> Result<()> {
        unsafe { device.wait_for_fences(&[self.in_flight], true, u64::MAX) }?;
        Ok(())
    }

    /// Reset the fence to unsignaled ahead of a new submission.
    ///
    /// # Safety
    /// The device must be valid and the fence must not be pending.
    pub unsafe fn reset(&self, device: &ash::Device) -> Result<()> {
        unsafe { device.reset_fences(&[self.in_flight]) }?;
        Ok(())
    }

    /// Destroy the fence and both semaphores.
    ///
    /// # Safety
    /// The device must be valid and resources must not be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.in_flight, None);
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
        }
        *self = Self::default();
    }
}
