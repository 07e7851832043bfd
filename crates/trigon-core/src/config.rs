//! Engine configuration.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How much the engine reports about itself.
///
/// Drives both the default log filter and the severity mask of the
/// validation message callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Warnings and errors only.
    Quiet,
    /// Lifecycle events.
    #[default]
    Normal,
    /// Device, surface and swapchain details.
    Verbose,
    /// Everything, including per-frame events.
    Trace,
}

impl Verbosity {
    /// Level directive used when `RUST_LOG` is not set.
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "debug",
            Self::Trace => "trace",
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Quiet => "quiet",
            Self::Normal => "normal",
            Self::Verbose => "verbose",
            Self::Trace => "trace",
        };
        f.write_str(name)
    }
}

impl FromStr for Verbosity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "quiet" => Ok(Self::Quiet),
            "normal" => Ok(Self::Normal),
            "verbose" => Ok(Self::Verbose),
            "trace" => Ok(Self::Trace),
            other => Err(Error::InvalidValue(format!(
                "unknown verbosity '{other}' (expected quiet, normal, verbose or trace)"
            ))),
        }
    }
}

/// Present mode preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentPreference {
    /// Mailbox when the surface offers it, FIFO otherwise.
    #[default]
    LowLatency,
    /// Always FIFO.
    Vsync,
}

/// Configuration consumed by the render engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Application name reported to the Vulkan driver.
    pub app_name: String,
    /// Enable the Khronos validation layer and debug messenger.
    pub validation: bool,
    pub verbosity: Verbosity,
    /// Color the frame is cleared to before drawing.
    pub clear_color: [f32; 4],
    pub present: PresentPreference,
    /// Compiled SPIR-V vertex shader.
    pub vertex_shader: PathBuf,
    /// Compiled SPIR-V fragment shader.
    pub fragment_shader: PathBuf,
    /// Sleep between event pumps while the window is minimized, in milliseconds.
    pub minimized_poll_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_name: "Trigon".to_string(),
            validation: cfg!(debug_assertions),
            verbosity: Verbosity::default(),
            clear_color: [0.1, 0.1, 0.1, 1.0],
            present: PresentPreference::default(),
            vertex_shader: PathBuf::from("shaders/bin/triangle.vert.spv"),
            fragment_shader: PathBuf::from("shaders/bin/triangle.frag.spv"),
            minimized_poll_ms: 16,
        }
    }
}

impl EngineConfig {
    /// Create a new config with the given application name.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            ..Default::default()
        }
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub const fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the verbosity level.
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set the clear color.
    #[must_use]
    pub const fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }

    /// Set the present mode preference.
    #[must_use]
    pub const fn with_present(mut self, present: PresentPreference) -> Self {
        self.present = present;
        self
    }

    /// Set the compiled shader paths.
    #[must_use]
    pub fn with_shaders(mut self, vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        self.vertex_shader = vertex.into();
        self.fragment_shader = fragment.into();
        self
    }

    /// Poll interval used while waiting for a minimized window.
    pub const fn minimized_poll_interval(&self) -> Duration {
        Duration::from_millis(self.minimized_poll_ms)
    }
}

/// Parse a TOML document into a configuration type.
pub fn from_toml_str<T: DeserializeOwned>(source: &str) -> Result<T> {
    Ok(toml::from_str(source)?)
}

/// Load a TOML configuration file.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let source = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_toml_str(&source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_clear_color_is_dark_grey() {
        let config = EngineConfig::default();
        assert_eq!(config.clear_color, [0.1, 0.1, 0.1, 1.0]);
        assert_eq!(config.present, PresentPreference::LowLatency);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: EngineConfig = from_toml_str(
            r#"
            app_name = "demo"
            verbosity = "verbose"
            present = "vsync"
            "#,
        )
        .unwrap();

        assert_eq!(config.app_name, "demo");
        assert_eq!(config.verbosity, Verbosity::Verbose);
        assert_eq!(config.present, PresentPreference::Vsync);
        assert_eq!(config.minimized_poll_ms, 16);
        assert_eq!(
            config.vertex_shader,
            PathBuf::from("shaders/bin/triangle.vert.spv")
        );
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let result: Result<EngineConfig> = from_toml_str("verbosity = 3");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let path = Path::new("definitely/not/here.toml");
        let err = load_toml::<EngineConfig>(path).unwrap_err();
        assert!(err.to_string().contains("definitely/not/here.toml"));
    }

    #[test]
    fn verbosity_parses_case_insensitively() {
        assert_eq!("Quiet".parse::<Verbosity>().unwrap(), Verbosity::Quiet);
        assert_eq!("TRACE".parse::<Verbosity>().unwrap(), Verbosity::Trace);
        assert!("loud".parse::<Verbosity>().is_err());
    }

    #[test]
    fn verbosity_directives_widen_with_level() {
        assert_eq!(Verbosity::Quiet.filter_directive(), "warn");
        assert_eq!(Verbosity::Normal.filter_directive(), "info");
        assert_eq!(Verbosity::Verbose.filter_directive(), "debug");
        assert!(Verbosity::Trace > Verbosity::Verbose);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = EngineConfig::new("viewer")
            .with_validation(false)
            .with_clear_color([0.0, 0.0, 0.0, 1.0])
            .with_shaders("a.spv", "b.spv");

        assert_eq!(config.app_name, "viewer");
        assert!(!config.validation);
        assert_eq!(config.clear_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(config.fragment_shader, PathBuf::from("b.spv"));
        assert_eq!(config.minimized_poll_interval(), Duration::from_millis(16));
    }
}
