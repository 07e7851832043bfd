//! Logging initialisation.

use crate::config::Verbosity;
use tracing_subscriber::EnvFilter;

/// Build the log filter for a verbosity level.
///
/// `RUST_LOG` takes precedence when it is set and valid.
pub fn env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()))
}

/// Install the global `tracing` subscriber.
///
/// Returns `false` if a subscriber was already installed.
pub fn init(verbosity: Verbosity) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_rejected() {
        let _ = init(Verbosity::Quiet);
        assert!(!init(Verbosity::Trace));
    }
}
