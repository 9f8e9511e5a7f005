//! Receive-path dispatch (§4.4): routes inbound `TransportMessage`s by
//! `Component` to the identity resolver (C7) and the endorsement
//! exchange (C6). `Component::TransactionEngine` has no built handler
//! in this workspace yet and is logged, not routed.
//!
//! The transport manager and the private-tx coordinator each depend on
//! this dispatcher (directly, or to answer endorsement traffic), so
//! neither can exist yet when the dispatcher is constructed; both are
//! bound in once they're built (`bind_transport`, and the shared
//! `coordinator` cell `node.rs` fills after wiring the coordinator).

use std::sync::Arc;

use paladin_keys::NodeSigner;
use paladin_privtx::PrivateTxCoordinator;
use paladin_transport::{ReceiveDispatch, TransportManager};
use paladin_types::TransportMessage;
use tokio::sync::OnceCell;
use tracing::warn;

pub struct NodeDispatcher {
    local_node_id: String,
    coordinator: Arc<OnceCell<Arc<PrivateTxCoordinator>>>,
    domains: Arc<paladin_domain_manager::DomainManager>,
    signer: Arc<NodeSigner>,
    transport: OnceCell<Arc<TransportManager>>,
}

impl NodeDispatcher {
    pub fn new_deferred(
        local_node_id: String,
        coordinator: Arc<OnceCell<Arc<PrivateTxCoordinator>>>,
        domains: Arc<paladin_domain_manager::DomainManager>,
        signer: Arc<NodeSigner>,
    ) -> Arc<Self> {
        Arc::new(Self { local_node_id, coordinator, domains, signer, transport: OnceCell::new() })
    }

    pub fn bind_transport(&self, transport: Arc<TransportManager>) {
        let _ = self.transport.set(transport);
    }
}

async fn handle_endorsement(
    local_node_id: String,
    coordinator: Arc<PrivateTxCoordinator>,
    domains: Arc<paladin_domain_manager::DomainManager>,
    signer: Arc<NodeSigner>,
    transport: Arc<TransportManager>,
    message_type: String,
    payload: Vec<u8>,
) {
    let Some(tx_id) = paladin_privtx::peek_tx_id(&message_type, &payload) else {
        warn!(message_type, "could not peek tx_id from endorsement message");
        return;
    };
    let Some((domain, contract_address)) = coordinator.pending_domain_contract(tx_id).await else {
        warn!(%tx_id, "no local assembly for this transaction; cannot answer endorsement traffic for it");
        return;
    };
    let handle = match domains.smart_contract(&domain, &contract_address, &[]).await {
        Ok(handle) => handle,
        Err(err) => {
            warn!(%tx_id, %err, "failed to resolve domain handle for endorsement dispatch");
            return;
        }
    };
    let pending_attestations = coordinator.pending_attestations();
    let lookup_coordinator = coordinator.clone();
    paladin_privtx::handle_endorsement_message(
        &message_type,
        &payload,
        &local_node_id,
        &handle,
        move |id| {
            let coordinator = lookup_coordinator.clone();
            tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(coordinator.assembled_for(id)))
        },
        &signer,
        &transport,
        &pending_attestations,
    )
    .await;
}

impl ReceiveDispatch for NodeDispatcher {
    fn on_transaction_engine(&self, message: TransportMessage) {
        warn!(message_type = %message.message_type, "no handler wired for the transaction-engine component");
    }

    fn on_reliable_message(&self, message: TransportMessage) {
        let Some(transport) = self.transport.get().cloned() else {
            warn!("dispatcher received a reliable message before transport was bound");
            return;
        };
        let Some(coordinator) = self.coordinator.get().cloned() else {
            warn!("dispatcher received a reliable message before the coordinator was bound");
            return;
        };
        let local_node_id = self.local_node_id.clone();
        let domains = self.domains.clone();
        let signer = self.signer.clone();
        tokio::spawn(handle_endorsement(
            local_node_id,
            coordinator,
            domains,
            signer,
            transport,
            message.message_type,
            message.payload,
        ));
    }

    fn on_identity_resolver(&self, message: TransportMessage) {
        let Some(transport) = self.transport.get().cloned() else {
            warn!("dispatcher received an identity message before transport was bound");
            return;
        };
        let local_node_id = self.local_node_id.clone();
        let signer = self.signer.clone();
        let remote = signer.remote().clone();
        tokio::spawn(async move {
            paladin_keys::handle_identity_message(message, &transport, &local_node_id, signer.local(), &remote).await;
        });
    }
}
