//! Swapchain management.
//!
//! A [`SwapchainState`] owns the swapchain and one [`FrameSlot`] per image.
//! Slots are created and destroyed as a unit, so the slot count always
//! equals the swapchain image count.

use crate::command::CommandPool;
use crate::context::GpuContext;
use crate::error::{GpuError, Result};
use crate::sync::FrameSync;
use ash::vk;
use trigon_core::PresentPreference;

/// Surface properties queried from the driver.
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupport {
    /// Query what the surface supports on the chosen device.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn query(
        surface_loader: &ash::khr::surface::Instance,
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> Result<Self> {
        let support = unsafe {
            Self {
                capabilities: surface_loader
                    .get_physical_device_surface_capabilities(physical_device, surface)?,
                formats: surface_loader.get_physical_device_surface_formats(physical_device, surface)?,
                present_modes: surface_loader
                    .get_physical_device_surface_present_modes(physical_device, surface)?,
            }
        };

        let caps = &support.capabilities;
        tracing::debug!(
            "Surface: images {}..{}, current extent {}x{}, max extent {}x{}",
            caps.min_image_count,
            caps.max_image_count,
            caps.current_extent.width,
            caps.current_extent.height,
            caps.max_image_extent.width,
            caps.max_image_extent.height,
        );
        tracing::debug!("Surface formats: {:?}", support.formats);
        tracing::debug!("Surface present modes: {:?}", support.present_modes);

        Ok(support)
    }
}

/// Preferred surface format, falling back to the first one offered.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|format| {
            format.format == vk::Format::B8G8R8A8_UNORM
                && format.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

/// Mailbox when available and allowed, FIFO otherwise.
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preference: PresentPreference,
) -> vk::PresentModeKHR {
    if preference == PresentPreference::LowLatency && modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        // FIFO is always supported
        vk::PresentModeKHR::FIFO
    }
}

/// Swapchain extent for a requested size.
///
/// A defined current extent always wins. Otherwise the request is capped to
/// the surface maximum.
pub fn choose_extent(
    width: u32,
    height: u32,
    capabilities: &vk::SurfaceCapabilitiesKHR,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }
    vk::Extent2D {
        width: width.min(capabilities.max_image_extent.width),
        height: height.min(capabilities.max_image_extent.height),
    }
}

/// One more than the minimum, capped by the maximum when there is one.
pub fn image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        wanted.min(capabilities.max_image_count)
    } else {
        wanted
    }
}

/// Parameters for the next swapchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainPlan {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub min_image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainPlan {
    /// Choose format, present mode, extent and image count.
    pub fn new(
        support: &SwapchainSupport,
        preference: PresentPreference,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let format = choose_surface_format(&support.formats)
            .ok_or_else(|| GpuError::InvalidState("Surface reports no formats".to_string()))?;

        Ok(Self {
            format,
            present_mode: choose_present_mode(&support.present_modes, preference),
            extent: choose_extent(width, height, &support.capabilities),
            min_image_count: image_count(&support.capabilities),
            pre_transform: support.capabilities.current_transform,
        })
    }
}

/// Resources tied to one swapchain image.
///
/// Null handles are valid and skipped on destroy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameSlot {
    /// Owned by the swapchain.
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub framebuffer: vk::Framebuffer,
    pub command_buffer: vk::CommandBuffer,
    pub sync: FrameSync,
}

impl FrameSlot {
    unsafe fn fill(
        &mut self,
        device: &ash::Device,
        format: vk::Format,
        extent: vk::Extent2D,
        render_pass: vk::RenderPass,
        pool: &CommandPool,
    ) -> Result<()> {
        let view_info = vk::ImageViewCreateInfo::default()
            .image(self.image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .base_mip_level(0)
                    .level_count(1)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        self.view = unsafe { device.create_image_view(&view_info, None) }?;

        let attachments = [self.view];
        let framebuffer_info = vk::FramebufferCreateInfo::default()
            .render_pass(render_pass)
            .attachments(&attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);
        self.framebuffer = unsafe { device.create_framebuffer(&framebuffer_info, None) }?;

        self.command_buffer = unsafe { pool.allocate_command_buffer(device) }?;
        self.sync = unsafe { FrameSync::new(device) }?;
        Ok(())
    }

    /// Destroy the slot's objects.
    ///
    /// The command buffer is returned to `pool`; pass `None` when the pool
    /// has already been destroyed, which freed it implicitly.
    ///
    /// # Safety
    /// Nothing in the slot may be in use by the GPU.
    pub unsafe fn destroy(&mut self, device: &ash::Device, pool: Option<&CommandPool>) {
        unsafe {
            self.sync.destroy(device);
            device.destroy_image_view(self.view, None);
            device.destroy_framebuffer(self.framebuffer, None);
            if let Some(pool) = pool {
                pool.free_command_buffer(device, self.command_buffer);
            }
        }
        *self = Self::default();
    }
}

/// Result of acquiring a swapchain image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Ready { image_index: u32, suboptimal: bool },
    /// No image was acquired; the swapchain must be rebuilt.
    OutOfDate,
}

/// Result of presenting an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    Presented,
    /// Out of date or suboptimal; the swapchain should be rebuilt.
    Stale,
}

/// A swapchain and its frame slots.
#[derive(Debug, Default)]
pub struct SwapchainState {
    pub handle: vk::SwapchainKHR,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub present_mode: vk::PresentModeKHR,
    pub slots: Vec<FrameSlot>,
}

impl SwapchainState {
    /// Create the swapchain and one slot per image.
    ///
    /// On failure everything created so far is destroyed before returning.
    ///
    /// # Safety
    /// The render pass must be compatible with `plan.format`.
    pub unsafe fn create(
        ctx: &GpuContext,
        plan: &SwapchainPlan,
        render_pass: vk::RenderPass,
        pool: &CommandPool,
    ) -> Result<Self> {
        let families = ctx.choice().families;
        let family_indices = [families.graphics, families.present];
        let (sharing_mode, shared_families): (vk::SharingMode, &[u32]) = if families.is_shared() {
            (vk::SharingMode::EXCLUSIVE, &[])
        } else {
            (vk::SharingMode::CONCURRENT, &family_indices)
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(ctx.surface().handle)
            .min_image_count(plan.min_image_count)
            .image_format(plan.format.format)
            .image_color_space(plan.format.color_space)
            .image_extent(plan.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(shared_families)
            .pre_transform(plan.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(plan.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let loader = ctx.swapchain_loader();
        let handle = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(GpuError::SwapchainCreation)?;

        let mut state = Self {
            handle,
            format: plan.format,
            extent: plan.extent,
            present_mode: plan.present_mode,
            slots: Vec::new(),
        };

        let built = unsafe { state.build_slots(ctx.device(), loader, render_pass, pool) };
        if let Err(err) = built {
            unsafe { state.destroy(ctx.device(), loader, Some(pool)) };
            return Err(err);
        }

        tracing::info!(
            "Swapchain created: {}x{}, {:?}, {:?}, {} images",
            state.extent.width,
            state.extent.height,
            state.format.format,
            state.present_mode,
            state.slots.len(),
        );

        Ok(state)
    }

    unsafe fn build_slots(
        &mut self,
        device: &ash::Device,
        loader: &ash::khr::swapchain::Device,
        render_pass: vk::RenderPass,
        pool: &CommandPool,
    ) -> Result<()> {
        let images = unsafe { loader.get_swapchain_images(self.handle) }?;
        self.slots.reserve(images.len());

        for image in images {
            // Pushed before filling so a partial slot is still destroyed.
            self.slots.push(FrameSlot {
                image,
                ..FrameSlot::default()
            });
            let slot = self
                .slots
                .last_mut()
                .ok_or_else(|| GpuError::InvalidState("Slot vanished".to_string()))?;
            unsafe { slot.fill(device, self.format.format, self.extent, render_pass, pool) }?;
        }

        Ok(())
    }

    /// Number of images, which is also the number of slots.
    pub fn image_count(&self) -> usize {
        self.slots.len()
    }

    /// Acquire the next image, signaling `semaphore` once it is available.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn acquire(
        &self,
        loader: &ash::khr::swapchain::Device,
        semaphore: vk::Semaphore,
    ) -> Result<AcquireOutcome> {
        let result = unsafe {
            loader.acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())
        };

        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready {
                image_index,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Present an image once the wait semaphores are signaled.
    ///
    /// # Safety
    /// All handles must be valid.
    pub unsafe fn present(
        &self,
        loader: &ash::khr::swapchain::Device,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphores: &[vk::Semaphore],
    ) -> Result<PresentOutcome> {
        let swapchains = [self.handle];
        let image_indices = [image_index];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        match unsafe { loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(e) => Err(GpuError::from(e)),
        }
    }

    /// Destroy every slot, then the swapchain. Safe to call repeatedly.
    ///
    /// # Safety
    /// The device must be idle with respect to this swapchain.
    pub unsafe fn destroy(
        &mut self,
        device: &ash::Device,
        loader: &ash::khr::swapchain::Device,
        pool: Option<&CommandPool>,
    ) {
        for mut slot in self.slots.drain(..) {
            unsafe { slot.destroy(device, pool) };
        }
        if self.handle != vk::SwapchainKHR::null() {
            unsafe { loader.destroy_swapchain(self.handle, None) };
            self.handle = vk::SwapchainKHR::null();
        }
    }
}
