//! Transport-level scenario exercising resend-until-ack over an
//! unreachable peer (§4.4): no real-time/paused-clock dependence, since
//! the loopback adapter reports delivery failure synchronously for any
//! node not yet registered on the shared hub.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use paladin_node::loopback::{LoopbackRegistryPlugin, LoopbackTransportPlugin};
use paladin_node::LoopbackHub;
use paladin_persistence::Gateway;
use paladin_transport::{ReceiveDispatch, ReliableStore, TransportManager};
use paladin_types::{Component, RegistryPlugin, TransportMessage};
use sqlx::PgPool;

#[derive(Default)]
struct RecordingDispatch {
    reliable: Mutex<Vec<TransportMessage>>,
}

impl ReceiveDispatch for RecordingDispatch {
    fn on_transaction_engine(&self, _message: TransportMessage) {}

    fn on_reliable_message(&self, message: TransportMessage) {
        self.reliable.lock().unwrap().push(message);
    }

    fn on_identity_resolver(&self, _message: TransportMessage) {}
}

#[sqlx::test(migrations = "../crates/paladin-persistence/migrations")]
async fn resend_delivers_exactly_once_once_the_peer_becomes_reachable(pool: PgPool) {
    let gateway = Gateway::new(pool);
    let reliable = ReliableStore::new(gateway.clone());
    let hub = LoopbackHub::new();
    let registry: Arc<dyn RegistryPlugin> = Arc::new(LoopbackRegistryPlugin::new());

    let dispatch_a: Arc<dyn ReceiveDispatch> = Arc::new(RecordingDispatch::default());
    let transport_plugin_a: Arc<dyn paladin_types::TransportPlugin> =
        Arc::new(LoopbackTransportPlugin::new("node-a".to_string(), hub.clone()));
    let transport_a = Arc::new(TransportManager::new(registry.clone(), vec![transport_plugin_a], reliable.clone(), dispatch_a));
    hub.register("node-a", transport_a.clone());

    // node-b is not registered yet: the first reliable send must stay
    // queued and unacked rather than silently succeed.
    let mut metadata = HashMap::new();
    metadata.insert("n".to_string(), "1".to_string());
    transport_a.send_reliable("node-b", "greeting", metadata).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    let still_pending = reliable.full_scan("node-b").await.unwrap();
    assert_eq!(still_pending.len(), 1, "send to an unregistered peer must not be acked");

    let dispatch_b = Arc::new(RecordingDispatch::default());
    let dispatch_b_dyn: Arc<dyn ReceiveDispatch> = dispatch_b.clone();
    let transport_plugin_b: Arc<dyn paladin_types::TransportPlugin> =
        Arc::new(LoopbackTransportPlugin::new("node-b".to_string(), hub.clone()));
    let transport_b = Arc::new(TransportManager::new(registry.clone(), vec![transport_plugin_b], reliable.clone(), dispatch_b_dyn));
    hub.register("node-b", transport_b.clone());

    let mut metadata2 = HashMap::new();
    metadata2.insert("n".to_string(), "2".to_string());
    transport_a.send_reliable("node-b", "greeting", metadata2).await.unwrap();

    let mut delivered = Vec::new();
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        delivered = dispatch_b.reliable.lock().unwrap().clone();
        if delivered.len() >= 2 {
            break;
        }
    }

    assert_eq!(delivered.len(), 2, "both the stuck and the new message must be delivered");
    for message in &delivered {
        assert_eq!(message.component, Component::ReliableMessageHandler);
    }

    let remaining = reliable.full_scan("node-b").await.unwrap();
    assert!(remaining.is_empty(), "every sent message should end up acked");
}
