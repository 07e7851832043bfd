//! Window surface seam.
//!
//! The renderer never talks to a windowing system directly. Everything it
//! needs from one goes through [`RenderWindow`]; the helpers at the bottom
//! implement the Vulkan half of it for any raw-window-handle window.

use crate::error::{GpuError, Result};
use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::CStr;

/// A window the engine can render into.
pub trait RenderWindow {
    /// Instance extensions required to create a surface for this window.
    fn required_surface_extensions(&self) -> Result<Vec<&'static CStr>>;

    /// Create a presentation surface.
    ///
    /// # Safety
    /// The instance must be valid and must outlive the surface.
    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR>;

    /// True while the window has no drawable area.
    fn is_minimized(&self) -> bool;

    /// Process pending window system events without blocking.
    fn pump_events(&mut self);

    /// Drawable size in pixels.
    fn framebuffer_size(&self) -> (u32, u32);
}

/// A presentation surface together with its extension loader.
pub struct Surface {
    pub loader: ash::khr::surface::Instance,
    pub handle: vk::SurfaceKHR,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface").field("handle", &self.handle).finish_non_exhaustive()
    }
}

impl Surface {
    /// Create a surface for a window.
    ///
    /// # Safety
    /// The instance must be valid and must outlive the surface.
    pub unsafe fn new<W: RenderWindow + ?Sized>(
        entry: &ash::Entry,
        instance: &ash::Instance,
        window: &W,
    ) -> Result<Self> {
        let handle = unsafe { window.create_surface(entry, instance) }?;
        let loader = ash::khr::surface::Instance::new(entry, instance);
        Ok(Self { loader, handle })
    }

    /// Destroy the surface.
    ///
    /// # Safety
    /// The surface must not be in use by a swapchain.
    pub unsafe fn destroy(&self) {
        unsafe { self.loader.destroy_surface(self.handle, None) };
    }
}

/// Surface extensions for a raw-window-handle display.
pub fn surface_extensions_for<W: HasDisplayHandle + ?Sized>(
    window: &W,
) -> Result<Vec<&'static CStr>> {
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;

    let names = ash_window::enumerate_required_extensions(display.as_raw())?;
    Ok(names
        .iter()
        .map(|&name| unsafe { CStr::from_ptr(name) })
        .collect())
}

/// Create a surface for a raw-window-handle window.
///
/// # Safety
/// The instance must be valid and must outlive the surface.
pub unsafe fn create_surface_for<W: HasDisplayHandle + HasWindowHandle + ?Sized>(
    entry: &ash::Entry,
    instance: &ash::Instance,
    window: &W,
) -> Result<vk::SurfaceKHR> {
    let display = window
        .display_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?;
    let window_handle = window
        .window_handle()
        .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get window handle: {e}")))?;

    unsafe {
        ash_window::create_surface(
            entry,
            instance,
            display.as_raw(),
            window_handle.as_raw(),
            None,
        )
    }
    .map_err(|e| GpuError::SurfaceCreation(e.to_string()))
}
