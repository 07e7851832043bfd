//! Viewer configuration: a TOML file with command-line overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use trigon_core::config::load_toml;
use trigon_core::{EngineConfig, PresentPreference, Verbosity};
use trigon_platform::WindowConfig;

/// Everything the viewer reads from its config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub engine: EngineConfig,
}

impl ViewerConfig {
    /// Load from `path`, or use defaults when the file does not exist.
    pub fn load(path: &Path) -> trigon_core::Result<Self> {
        if path.exists() {
            load_toml(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Apply command-line overrides on top of the file.
    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(verbosity) = overrides.verbosity {
            self.engine.verbosity = verbosity;
        }
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
        if let Some(validation) = overrides.validation {
            self.engine.validation = validation;
        }
        if overrides.vsync {
            self.engine.present = PresentPreference::Vsync;
        }
        if self.engine.app_name == EngineConfig::default().app_name {
            self.engine.app_name.clone_from(&self.window.title);
        }
    }
}

/// Settings given on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub verbosity: Option<Verbosity>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub validation: Option<bool>,
    pub vsync: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use trigon_core::config::from_toml_str;

    #[test]
    fn missing_file_uses_defaults() {
        let config = ViewerConfig::load(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.window, WindowConfig::default());
        assert_eq!(config.engine.verbosity, Verbosity::Normal);
    }

    #[test]
    fn sections_are_optional() {
        let config: ViewerConfig = from_toml_str(
            r#"
            [window]
            title = "Grid"

            [engine]
            verbosity = "trace"
            present = "vsync"
            "#,
        )
        .unwrap();
        assert_eq!(config.window.title, "Grid");
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.engine.verbosity, Verbosity::Trace);
        assert_eq!(config.engine.present, PresentPreference::Vsync);
    }

    #[test]
    fn overrides_win_over_file() {
        let mut config = ViewerConfig::default();
        config.apply(&Overrides {
            verbosity: Some(Verbosity::Quiet),
            width: Some(640),
            height: Some(480),
            validation: Some(false),
            vsync: true,
        });
        assert_eq!(config.engine.verbosity, Verbosity::Quiet);
        assert_eq!((config.window.width, config.window.height), (640, 480));
        assert!(!config.engine.validation);
        assert_eq!(config.engine.present, PresentPreference::Vsync);
    }

    #[test]
    fn app_name_follows_window_title() {
        let mut config = ViewerConfig::default();
        config.window.title = "Grid".to_string();
        config.apply(&Overrides::default());
        assert_eq!(config.engine.app_name, "Grid");
    }
}
