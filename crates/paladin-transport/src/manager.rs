use std::collections::HashMap;
use std::sync::Arc;

use paladin_types::{Component, RegistryPlugin, ReliableMessage, TransportMessage, TransportPlugin};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use uuid::Uuid;

use crate::errors::TransportError;
use crate::peer::Peer;
use crate::reliable::{ReliableStore, RELIABLE_ACK_KIND};

/// Handlers the receive path dispatches to, keyed by `Component` (§4.4).
pub trait ReceiveDispatch: Send + Sync {
    fn on_transaction_engine(&self, message: TransportMessage);
    fn on_reliable_message(&self, message: TransportMessage);
    fn on_identity_resolver(&self, message: TransportMessage);
}

pub struct TransportManager {
    registry: Arc<dyn RegistryPlugin>,
    transports: Vec<Arc<dyn TransportPlugin>>,
    reliable: ReliableStore,
    peers: RwLock<HashMap<String, (Arc<Peer>, CancellationToken, tokio::task::JoinHandle<()>)>>,
    dispatch: Arc<dyn ReceiveDispatch>,
}

impl TransportManager {
    pub fn new(
        registry: Arc<dyn RegistryPlugin>,
        transports: Vec<Arc<dyn TransportPlugin>>,
        reliable: ReliableStore,
        dispatch: Arc<dyn ReceiveDispatch>,
    ) -> Self {
        Self { registry, transports, reliable, peers: RwLock::new(HashMap::new()), dispatch }
    }

    /// Returns the peer's sender-loop handle, respawning it if the
    /// previous one has quiesced and exited (§4.4): the peer's task
    /// ends after `QUIESCE_WINDOW` of inactivity following deactivation,
    /// but the peer itself (and its durable reliable queue) is still
    /// addressable, so the next send must bring it back transparently.
    async fn peer(&self, node_id: &str) -> Arc<Peer> {
        {
            let peers = self.peers.read().await;
            if let Some((peer, _, handle)) = peers.get(node_id) {
                if !handle.is_finished() {
                    return peer.clone();
                }
            }
        }
        let mut peers = self.peers.write().await;
        if let Some((peer, _, handle)) = peers.get(node_id) {
            if !handle.is_finished() {
                return peer.clone();
            }
        }
        let cancel = CancellationToken::new();
        let peer = Arc::new(Peer::new(
            node_id.to_string(),
            self.registry.clone(),
            self.transports.clone(),
            self.reliable.clone(),
            cancel.clone(),
        ));
        let handle = tokio::spawn(peer.clone().run());
        peers.insert(node_id.to_string(), (peer.clone(), cancel, handle));
        peer
    }

    pub async fn send_fire_and_forget(
        &self,
        node_id: &str,
        message: TransportMessage,
    ) -> Result<(), TransportError> {
        self.peer(node_id).await.send_fire_and_forget(message).await
    }

    /// Enqueues a durable reliable message and wakes the peer's sender
    /// loop so it drains without waiting for the resend timer.
    pub async fn send_reliable(
        &self,
        node_id: &str,
        kind: &str,
        metadata: HashMap<String, String>,
    ) -> Result<(), TransportError> {
        let message = ReliableMessage {
            sequence: 0,
            id: Uuid::new_v4(),
            target_node: node_id.to_string(),
            kind: kind.to_string(),
            metadata,
        };
        self.reliable.enqueue(message).await?;
        self.peer(node_id).await.signal_new_persistent();
        Ok(())
    }

    /// Receive path: updates activity tracking, then dispatches by
    /// `Component`.
    ///
    /// A reliable message is acked only once its remote processing is
    /// confirmed, not on local send success (§4.4, P3): the first pass
    /// over an incoming `ReliableMessageHandler` message here checks
    /// whether it's itself an ack reply for a message this node
    /// previously sent (`RELIABLE_ACK_KIND`), in which case it resolves
    /// the durable ack row directly and never reaches `dispatch`.
    /// Otherwise this is a fresh reliable message arriving from
    /// `node_id`; once it's handed to `dispatch`, an ack reply is sent
    /// back to `node_id` so its sender can retire the row. A reply lost
    /// in transit simply means the original message gets resent by the
    /// sender's next full scan and re-acked, so the reply itself rides
    /// fire-and-forget rather than needing its own durability.
    pub async fn receive(&self, node_id: &str, message: TransportMessage) {
        self.peer(node_id).await.note_receive_activity().await;

        if message.component == Component::ReliableMessageHandler && message.message_type == RELIABLE_ACK_KIND {
            if let Some(original_id) = message.correlation_id {
                if let Err(e) = self.reliable.ack(original_id, None).await {
                    warn!(%node_id, %original_id, error = %e, "failed to record reliable-message ack");
                }
            }
            return;
        }

        match message.component {
            Component::TransactionEngine => self.dispatch.on_transaction_engine(message),
            Component::ReliableMessageHandler => {
                let reply = TransportMessage {
                    message_id: Uuid::new_v4(),
                    correlation_id: Some(message.message_id),
                    component: Component::ReliableMessageHandler,
                    message_type: RELIABLE_ACK_KIND.to_string(),
                    payload: Vec::new(),
                };
                if let Err(e) = self.send_fire_and_forget(node_id, reply).await {
                    warn!(%node_id, error = %e, "failed to send reliable-message ack reply");
                }
                self.dispatch.on_reliable_message(message);
            }
            Component::IdentityResolver => self.dispatch.on_identity_resolver(message),
        }
    }

    pub async fn shutdown(&self) {
        let peers = self.peers.read().await;
        for (_, cancel, _) in peers.values() {
            cancel.cancel();
        }
    }
}
