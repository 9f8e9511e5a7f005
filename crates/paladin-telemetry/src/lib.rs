//! # Telemetry
//!
//! Structured logging for the node, built on `tracing`. Metrics emission
//! is explicitly out of scope (spec.md §1) and is not carried here — see
//! DESIGN.md for the trim note.

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("failed to initialize logging: {0}")]
    Init(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_from_env_has_defaults() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "paladin-node");
    }
}
