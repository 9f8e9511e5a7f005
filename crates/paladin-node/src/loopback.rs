//! In-process default adapter for the transport-plugin and
//! registry-plugin protocols (§6): every node sharing a [`LoopbackHub`]
//! is reachable by node id with no network hop. This is the "in-process
//! default adapter" the external-interfaces section calls for; an
//! out-of-process framed-codec adapter is the documented seam this
//! module stands in for, not something this crate implements.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use paladin_types::{NodeTransportDetails, PeerInfo, RegistryEntry, RegistryProperty, RegistryPlugin, TransportMessage, TransportPlugin};
use tracing::debug;

const LOOPBACK_TRANSPORT: &str = "loopback";

/// Shared in-process "network": a registry of every node's transport
/// manager, keyed by node id. `TransportManager::receive` is invoked
/// directly (on a spawned task, so `send` stays non-blocking) instead
/// of going over a socket.
#[derive(Default)]
pub struct LoopbackHub {
    nodes: RwLock<HashMap<String, Arc<paladin_transport::TransportManager>>>,
}

impl LoopbackHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, node_id: &str, transport: Arc<paladin_transport::TransportManager>) {
        self.nodes.write().unwrap().insert(node_id.to_string(), transport);
    }

    fn deliver(&self, target: &str, from: String, message: TransportMessage) -> Result<(), String> {
        let Some(transport) = self.nodes.read().unwrap().get(target).cloned() else {
            return Err(format!("loopback: no such node registered: {target}"));
        };
        tokio::spawn(async move {
            transport.receive(&from, message).await;
        });
        Ok(())
    }
}

/// The transport side of the loopback adapter: `activate` is a no-op
/// (there is nothing to dial), `send` hands the message straight to the
/// hub.
pub struct LoopbackTransportPlugin {
    local_node_id: String,
    hub: Arc<LoopbackHub>,
}

impl LoopbackTransportPlugin {
    pub fn new(local_node_id: String, hub: Arc<LoopbackHub>) -> Self {
        Self { local_node_id, hub }
    }
}

impl TransportPlugin for LoopbackTransportPlugin {
    fn name(&self) -> &str {
        LOOPBACK_TRANSPORT
    }

    fn configure(&mut self, _config: &serde_json::Value) -> Result<(), String> {
        Ok(())
    }

    fn activate(&self, node: &str, _transport_details: &serde_json::Value) -> Result<PeerInfo, String> {
        debug!(node, "loopback: activating (no-op)");
        Ok(PeerInfo { details: serde_json::json!({ "transport": LOOPBACK_TRANSPORT }) })
    }

    fn deactivate(&self, _node: &str) -> Result<(), String> {
        Ok(())
    }

    fn send(&self, node: &str, message: &TransportMessage) -> Result<(), String> {
        self.hub.deliver(node, self.local_node_id.clone(), message.clone())
    }

    fn get_local_details(&self) -> serde_json::Value {
        serde_json::json!({ "transport": LOOPBACK_TRANSPORT })
    }
}

/// The registry side of the loopback adapter: every node is reachable
/// over the one loopback transport, so resolution never fails and
/// carries no real address details.
#[derive(Default)]
pub struct LoopbackRegistryPlugin;

impl LoopbackRegistryPlugin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistryPlugin for LoopbackRegistryPlugin {
    fn upsert_records(&self, _entries: &[RegistryEntry], _properties: &[RegistryProperty]) -> Result<(), String> {
        Ok(())
    }

    fn lookup_node_transports(&self, _node: &str) -> Result<Vec<NodeTransportDetails>, String> {
        Ok(vec![NodeTransportDetails {
            transport_name: LOOPBACK_TRANSPORT.to_string(),
            details: serde_json::Value::Null,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_always_resolves_the_loopback_transport() {
        let registry = LoopbackRegistryPlugin::new();
        let details = registry.lookup_node_transports("node-2").unwrap();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].transport_name, LOOPBACK_TRANSPORT);
    }
}
