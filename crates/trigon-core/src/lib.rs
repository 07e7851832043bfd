//! Core types for the Trigon renderer.
//!
//! This crate provides the pieces shared by every other crate:
//! - The drawable [`Scene`]
//! - Engine configuration and the runtime [`Verbosity`] level
//! - Logging initialisation
//! - Common error types

pub mod config;
pub mod error;
pub mod logging;
pub mod scene;

pub use config::{EngineConfig, PresentPreference, Verbosity};
pub use error::{Error, Result};
pub use scene::Scene;
