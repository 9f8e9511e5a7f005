//! Assembles every component crate into one running node.

use std::sync::Arc;

use paladin_domain_manager::DomainManager;
use paladin_keys::{LocalKeystore, NodeSigner, RemoteVerifierCache};
use paladin_persistence::Gateway;
use paladin_privtx::{PrivateTxCoordinator, ReceiptView, SubmitOutcome, SubmitTx, TransactionView, UpdateTx};
use paladin_state::StateStore;
use paladin_transport::TransportManager;
use paladin_types::{BaseLedgerClient, DomainPlugin};
use uuid::Uuid;

use crate::config::NodeConfig;
use crate::dispatcher::NodeDispatcher;
use crate::ledger::InMemoryLedger;
use crate::loopback::{LoopbackHub, LoopbackRegistryPlugin, LoopbackTransportPlugin};
use crate::pubtx_registry::PublicTxRegistry;

/// A fully wired node: owns every component handle a deployment needs,
/// and exposes the submission/read surface a caller (CLI, RPC layer,
/// test harness) drives.
pub struct PaladinNode {
    pub store: Arc<StateStore>,
    pub domains: Arc<DomainManager>,
    pub transport: Arc<TransportManager>,
    pub signer: Arc<NodeSigner>,
    pub coordinator: Arc<PrivateTxCoordinator>,
    gateway: Gateway,
}

impl PaladinNode {
    /// Connects to Postgres, runs migrations, and wires every component
    /// behind a shared [`LoopbackHub`]. `domain_plugins` are registered
    /// with the domain manager up front; a real deployment loads these
    /// from its own plugin configuration, which is out of scope here.
    pub async fn connect(
        config: NodeConfig,
        hub: Arc<LoopbackHub>,
        domain_plugins: Vec<Arc<dyn DomainPlugin>>,
    ) -> Result<Arc<Self>, anyhow::Error> {
        let gateway = Gateway::connect(&config.persistence.dsn).await?;
        gateway.migrate().await?;
        Ok(Self::wire(config, gateway, hub, domain_plugins, Arc::new(InMemoryLedger::default())).await)
    }

    /// Wires a node around an already-connected gateway and a supplied
    /// base-ledger client; the path the end-to-end test harness uses
    /// against fakes for both.
    pub async fn wire(
        config: NodeConfig,
        gateway: Gateway,
        hub: Arc<LoopbackHub>,
        domain_plugins: Vec<Arc<dyn DomainPlugin>>,
        ledger: Arc<dyn BaseLedgerClient>,
    ) -> Arc<Self> {
        let node_id = config.identity.node_id.clone();

        let store = Arc::new(StateStore::new(gateway.clone()));
        let domains = Arc::new(DomainManager::new());

        let signer = Arc::new(NodeSigner::new(LocalKeystore::new(), RemoteVerifierCache::new()));

        let reliable = paladin_transport::ReliableStore::new(gateway.clone());
        let registry_plugin: Arc<dyn paladin_types::RegistryPlugin> = Arc::new(LoopbackRegistryPlugin::new());
        let transport_plugin: Arc<dyn paladin_types::TransportPlugin> =
            Arc::new(LoopbackTransportPlugin::new(node_id.clone(), hub.clone()));

        let pubtx_registry = PublicTxRegistry::new(ledger, gateway.clone());

        // `TransportManager` and the dispatcher it calls into are
        // mutually referential (the dispatcher needs the transport to
        // answer requests, the manager needs the dispatcher to route
        // receives); the coordinator closes the same cycle with the
        // dispatcher. Build the dispatcher first with a deferred
        // transport/coordinator binding, then fill both in once they
        // exist.
        let coordinator_cell: Arc<tokio::sync::OnceCell<Arc<PrivateTxCoordinator>>> = Arc::new(tokio::sync::OnceCell::new());
        let dispatcher = NodeDispatcher::new_deferred(node_id.clone(), coordinator_cell.clone(), domains.clone(), signer.clone());

        let transport = Arc::new(TransportManager::new(registry_plugin, vec![transport_plugin], reliable, dispatcher.clone()));
        hub.register(&node_id, transport.clone());
        dispatcher.bind_transport(transport.clone());

        let coordinator = Arc::new(PrivateTxCoordinator::new(
            node_id.clone(),
            gateway.clone(),
            store.clone(),
            domains.clone(),
            signer.clone(),
            transport.clone(),
            pubtx_registry.clone(),
            config.privtx.endorsement_timeout,
        ));
        pubtx_registry.bind_coordinator(&coordinator);
        let _ = coordinator_cell.set(coordinator.clone());

        for plugin in domain_plugins {
            domains.register_domain(plugin).await;
        }

        Arc::new(Self { store, domains, transport, signer, coordinator, gateway })
    }

    pub async fn submit(&self, req: SubmitTx) -> Result<SubmitOutcome, paladin_privtx::PrivTxError> {
        self.coordinator.submit(req).await
    }

    pub async fn update_public(&self, tx_id: Uuid, update: UpdateTx) -> Result<(), paladin_privtx::PrivTxError> {
        self.coordinator.update_public(tx_id, update).await
    }

    pub async fn get_transaction(&self, tx_id: Uuid) -> Result<TransactionView, paladin_privtx::PrivTxError> {
        paladin_privtx::get_transaction(&self.gateway, tx_id).await
    }

    pub async fn get_receipt(&self, tx_id: Uuid) -> Result<Option<ReceiptView>, paladin_privtx::PrivTxError> {
        paladin_privtx::get_receipt(&self.gateway, tx_id).await
    }
}
