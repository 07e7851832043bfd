//! Error types shared across the workspace.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Reading a configuration file failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration document could not be parsed.
    #[error("Invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    /// A value outside the accepted set.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
