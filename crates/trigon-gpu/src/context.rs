//! GPU context management.

use crate::device::{create_logical_device, select_device, PhysicalDeviceChoice};
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, DebugMessenger};
use crate::surface::{RenderWindow, Surface};
use ash::vk;
use trigon_core::EngineConfig;

/// Instance-level and device-level Vulkan objects for one window.
///
/// Released in reverse creation order: device, surface, debug messenger,
/// instance. [`GpuContext::destroy`] is idempotent and also runs on drop.
pub struct GpuContext {
    // Entry must be kept alive for the lifetime of the context
    #[allow(dead_code)]
    entry: ash::Entry,
    instance: ash::Instance,
    debug_messenger: Option<DebugMessenger>,
    surface: Surface,
    choice: PhysicalDeviceChoice,
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    swapchain_loader: ash::khr::swapchain::Device,
    destroyed: bool,
}

impl GpuContext {
    /// Create the instance, surface and logical device for a window.
    ///
    /// On failure everything created so far is released before returning.
    pub fn new<W: RenderWindow + ?Sized>(window: &W, config: &EngineConfig) -> Result<Self> {
        let entry = unsafe { ash::Entry::load() }.map_err(|e| GpuError::Loading(e.to_string()))?;
        let window_extensions = window.required_surface_extensions()?;

        let instance = unsafe {
            create_instance(
                &entry,
                &config.app_name,
                &window_extensions,
                config.validation,
                config.verbosity,
            )
        }?;
        let mut parts = PartialContext::default();
        parts.instance = Some(instance.clone());

        if config.validation {
            parts.debug_messenger =
                Some(unsafe { DebugMessenger::new(&entry, &instance, config.verbosity) }?);
        }

        let surface = unsafe { Surface::new(&entry, &instance, window) }?;
        let (loader, handle) = (surface.loader.clone(), surface.handle);
        parts.surface = Some(surface);

        let choice = unsafe { select_device(&instance, &loader, handle) }?;
        let logical = unsafe { create_logical_device(&instance, &choice, config.validation) }?;
        parts.device = Some(logical.device.clone());

        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &logical.device);

        let (debug_messenger, surface) = parts.finish()?;

        Ok(Self {
            entry,
            instance,
            debug_messenger,
            surface,
            choice,
            device: logical.device,
            graphics_queue: logical.graphics_queue,
            present_queue: logical.present_queue,
            swapchain_loader,
            destroyed: false,
        })
    }

    /// Get the Vulkan device handle.
    pub const fn device(&self) -> &ash::Device {
        &self.device
    }

    /// Get the Vulkan instance handle.
    pub const fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    /// Get the physical device handle.
    pub const fn physical_device(&self) -> vk::PhysicalDevice {
        self.choice.physical_device
    }

    /// The physical device chosen at startup.
    pub const fn choice(&self) -> &PhysicalDeviceChoice {
        &self.choice
    }

    pub const fn surface(&self) -> &Surface {
        &self.surface
    }

    pub const fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Get the graphics queue.
    pub const fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    pub const fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }

    /// Release the device, surface, debug messenger and instance.
    ///
    /// Every object created from the device must already be destroyed.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
            self.surface.destroy();
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            self.instance.destroy_instance(None);
        }
        tracing::debug!("GPU context destroyed");
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Objects created so far while building a [`GpuContext`].
///
/// Dropping it releases them in reverse order, which covers every early
/// return from [`GpuContext::new`].
#[derive(Default)]
struct PartialContext {
    instance: Option<ash::Instance>,
    debug_messenger: Option<DebugMessenger>,
    surface: Option<Surface>,
    device: Option<ash::Device>,
}

impl PartialContext {
    /// Hand ownership to the finished context.
    fn finish(mut self) -> Result<(Option<DebugMessenger>, Surface)> {
        let surface = self
            .surface
            .take()
            .ok_or_else(|| GpuError::InvalidState("Surface was not created".to_string()))?;
        let debug_messenger = self.debug_messenger.take();
        self.device = None;
        self.instance = None;
        Ok((debug_messenger, surface))
    }
}

impl Drop for PartialContext {
    fn drop(&mut self) {
        unsafe {
            if let Some(device) = self.device.take() {
                device.destroy_device(None);
            }
            if let Some(surface) = self.surface.take() {
                surface.destroy();
            }
            if let Some(messenger) = self.debug_messenger.take() {
                messenger.destroy();
            }
            if let Some(instance) = self.instance.take() {
                instance.destroy_instance(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_partial_context_drops_cleanly() {
        let parts = PartialContext::default();
        assert!(parts.instance.is_none());
        drop(parts);
    }

    #[test]
    fn finishing_without_surface_fails() {
        let parts = PartialContext::default();
        let err = parts.finish().unwrap_err();
        assert!(matches!(err, GpuError::InvalidState(_)));
    }
}
