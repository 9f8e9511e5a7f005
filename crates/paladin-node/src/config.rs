//! Configuration surface (§4.0): one sub-struct per wired component,
//! each with a `Default` matching the teacher's documented-defaults
//! pattern. There is no CLI/env loader here — loading configuration
//! from the outside world is an explicit Non-goal — but the struct
//! tree itself is the ambient in-process configuration surface every
//! other component crate in this workspace carries.

use std::time::Duration;

/// Persistence gateway (C1) configuration.
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    /// Postgres connection string.
    pub dsn: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self { dsn: "postgres://localhost/paladin".to_string() }
    }
}

/// Private transaction coordinator (C6) configuration.
#[derive(Debug, Clone)]
pub struct PrivTxConfig {
    /// How long to wait for a remote endorsement or verifier resolution
    /// before giving up on an assembly attempt (§4.6).
    pub endorsement_timeout: Duration,
}

impl Default for PrivTxConfig {
    fn default() -> Self {
        Self { endorsement_timeout: Duration::from_secs(30) }
    }
}

/// Top-level node identity: this node's own id, used for domain-of-self
/// checks in attestation gathering and as the registry/transport key.
#[derive(Debug, Clone)]
pub struct NodeIdentityConfig {
    pub node_id: String,
}

impl Default for NodeIdentityConfig {
    fn default() -> Self {
        Self { node_id: "node-1".to_string() }
    }
}

/// The full node configuration tree.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    pub identity: NodeIdentityConfig,
    pub persistence: PersistenceConfig,
    pub privtx: PrivTxConfig,
    pub telemetry: paladin_telemetry::TelemetryConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sensible_node_id() {
        let config = NodeConfig::default();
        assert_eq!(config.identity.node_id, "node-1");
        assert_eq!(config.privtx.endorsement_timeout, Duration::from_secs(30));
    }
}
