//! Rendering for the Trigon engine.
//!
//! [`RenderEngine`] composes the Vulkan layer into a renderer that draws a
//! [`Scene`](trigon_core::Scene) of pushed-transform triangles:
//!
//! - [`FrameScheduler`] drives wait, acquire, record, submit and present for
//!   one frame slot at a time and rebuilds the swapchain when it goes stale
//! - [`recorder`] fills one frame's command buffer
//! - [`frames`] binds the scheduler to real GPU objects
//!
//! # Example
//!
//! ```no_run
//! use trigon_core::{EngineConfig, Scene};
//! use trigon_gpu::RenderWindow;
//! use trigon_render::RenderEngine;
//!
//! fn run<W: RenderWindow>(window: W) -> Result<(), trigon_render::RenderError> {
//!     let mut engine = RenderEngine::initialize(1280, 720, window, EngineConfig::default())?;
//!     let scene = Scene::demo();
//!     for _ in 0..100 {
//!         engine.window_mut().pump_events();
//!         engine.render(&scene)?;
//!     }
//!     engine.shutdown();
//!     Ok(())
//! }
//! ```

mod engine;
mod error;
pub mod frames;
pub mod recorder;
pub mod scheduler;

pub use engine::RenderEngine;
pub use error::{RenderError, Result};
pub use scheduler::{FrameBackend, FrameScheduler, FrameStage, FrameStats, FrameStatus, SlotPhase};
