//! Logging configuration.
//!
//! Metrics/OTel export is explicitly out of scope (spec.md §1); only the
//! logging concern of the ambient stack is carried here.

use std::env;

/// Configuration for structured logging.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line.
    pub service_name: String,
    /// Component name (e.g. "state-store", "transport").
    pub component: String,
    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,
    /// Whether to enable JSON-formatted logs (production) vs pretty (dev).
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "paladin-node".to_string(),
            component: "node".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Build from environment variables, falling back to defaults.
    ///
    /// - `PALADIN_LOG_LEVEL` or `RUST_LOG`
    /// - `PALADIN_JSON_LOGS` (`"1"`/`"true"` enables JSON output)
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(level) = env::var("PALADIN_LOG_LEVEL").or_else(|_| env::var("RUST_LOG")) {
            cfg.log_level = level;
        }
        if let Ok(json) = env::var("PALADIN_JSON_LOGS") {
            cfg.json_logs = json == "1" || json.eq_ignore_ascii_case("true");
        }
        cfg
    }

    /// Configuration for a specific component, inheriting env overrides.
    pub fn for_component(component: &str) -> Self {
        let mut cfg = Self::from_env();
        cfg.component = component.to_string();
        cfg
    }

    pub fn full_service_name(&self) -> String {
        format!("{}.{}", self.service_name, self.component)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_info_level() {
        let config = TelemetryConfig::default();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn for_component_sets_name() {
        let config = TelemetryConfig::for_component("state-store");
        assert_eq!(config.full_service_name(), "paladin-node.state-store");
    }
}
