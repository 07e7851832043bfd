//! Platform window for the Trigon renderer.
//!
//! Wraps a winit window and its event loop behind
//! [`RenderWindow`](trigon_gpu::RenderWindow). Events are pumped on demand
//! instead of handing control to winit, so the caller owns the frame loop.

use ash::vk;
use serde::{Deserialize, Serialize};
use std::ffi::CStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use trigon_gpu::surface::{create_surface_for, surface_extensions_for};
use trigon_gpu::{GpuError, RenderWindow};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Window creation failed: {0}")]
    WindowCreation(String),
    #[error("Event loop error: {0}")]
    EventLoop(String),
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// How many pumps to wait for the window system to hand out the window.
const CREATION_ATTEMPTS: u32 = 200;
const CREATION_POLL: Duration = Duration::from_millis(10);

/// Window configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Trigon".to_string(),
            width: 1280,
            height: 720,
            resizable: true,
        }
    }
}

impl WindowConfig {
    pub fn new(title: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            title: title.into(),
            width,
            height,
            ..Self::default()
        }
    }
}

/// A zero-sized drawable area means the window is minimized.
pub const fn is_zero_size(size: PhysicalSize<u32>) -> bool {
    size.width == 0 || size.height == 0
}

/// Event handler state shared with winit during a pump.
struct WindowState {
    config: WindowConfig,
    window: Option<Window>,
    size: PhysicalSize<u32>,
    minimized: bool,
    close_requested: bool,
    creation_error: Option<String>,
}

impl WindowState {
    fn new(config: WindowConfig) -> Self {
        Self {
            size: PhysicalSize::new(config.width, config.height),
            config,
            window: None,
            minimized: false,
            close_requested: false,
            creation_error: None,
        }
    }
}

impl ApplicationHandler for WindowState {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attributes = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(PhysicalSize::new(self.config.width, self.config.height))
            .with_resizable(self.config.resizable);

        match event_loop.create_window(attributes) {
            Ok(window) => {
                self.size = window.inner_size();
                info!(
                    "Window created: {}x{}",
                    self.size.width, self.size.height
                );
                self.window = Some(window);
            }
            Err(e) => {
                self.creation_error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                self.close_requested = true;
            }
            WindowEvent::Resized(size) => {
                debug!("Window resized to {}x{}", size.width, size.height);
                self.size = size;
                self.minimized = is_zero_size(size);
            }
            _ => {}
        }
    }
}

/// A winit window with a pumped event loop.
pub struct PlatformWindow {
    // Holds the window, which must go before the event loop.
    state: WindowState,
    event_loop: EventLoop<()>,
}

impl PlatformWindow {
    /// Open a window and wait until the window system has created it.
    pub fn new(config: WindowConfig) -> Result<Self> {
        let mut event_loop = EventLoop::new().map_err(|e| PlatformError::EventLoop(e.to_string()))?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut state = WindowState::new(config);
        for _ in 0..CREATION_ATTEMPTS {
            let status = event_loop.pump_app_events(Some(CREATION_POLL), &mut state);
            if let Some(error) = state.creation_error.take() {
                return Err(PlatformError::WindowCreation(error));
            }
            if state.window.is_some() {
                return Ok(Self { state, event_loop });
            }
            if let PumpStatus::Exit(code) = status {
                return Err(PlatformError::EventLoop(format!(
                    "Event loop exited with code {code} before the window was created"
                )));
            }
        }

        Err(PlatformError::WindowCreation(
            "Window system never resumed the application".to_string(),
        ))
    }

    pub const fn close_requested(&self) -> bool {
        self.state.close_requested
    }

    pub fn set_title(&self, title: &str) {
        if let Some(window) = &self.state.window {
            window.set_title(title);
        }
    }

    fn window(&self) -> trigon_gpu::Result<&Window> {
        self.state
            .window
            .as_ref()
            .ok_or_else(|| GpuError::SurfaceCreation("Window has been closed".to_string()))
    }
}

impl RenderWindow for PlatformWindow {
    fn required_surface_extensions(&self) -> trigon_gpu::Result<Vec<&'static CStr>> {
        surface_extensions_for(self.window()?)
    }

    unsafe fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> trigon_gpu::Result<vk::SurfaceKHR> {
        unsafe { create_surface_for(entry, instance, self.window()?) }
    }

    fn is_minimized(&self) -> bool {
        // A closing window is never waited on.
        if self.state.close_requested {
            return false;
        }
        let reported = self
            .state
            .window
            .as_ref()
            .and_then(Window::is_minimized)
            .unwrap_or(false);
        self.state.minimized || reported
    }

    fn pump_events(&mut self) {
        let status = self
            .event_loop
            .pump_app_events(Some(Duration::ZERO), &mut self.state);
        if let PumpStatus::Exit(code) = status {
            debug!("Event loop exited with code {code}");
            self.state.close_requested = true;
        }
    }

    fn framebuffer_size(&self) -> (u32, u32) {
        self.state
            .window
            .as_ref()
            .map_or(self.state.size, Window::inner_size)
            .into()
    }
}
