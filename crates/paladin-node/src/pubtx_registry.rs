//! Wires C6 to C5 (§4.6 step 6): a `PublicTxGateway` backed by one
//! `Orchestrator` per signing address, and the loop-back that reports
//! the base ledger's outcome to the private-tx coordinator once the
//! fake ledger "confirms" a submission.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use paladin_persistence::Gateway;
use paladin_privtx::{PrivateTxCoordinator, PublicTxGateway};
use paladin_pubtx::Orchestrator;
use paladin_types::{BaseLedgerClient, PreparedPublicCall};
use tokio::sync::{Mutex, OnceCell};
use tracing::warn;
use uuid::Uuid;

pub struct PublicTxRegistry {
    ledger: Arc<dyn BaseLedgerClient>,
    gateway: Gateway,
    orchestrators: Mutex<HashMap<String, Arc<Orchestrator>>>,
    coordinator: OnceCell<Weak<PrivateTxCoordinator>>,
}

impl PublicTxRegistry {
    pub fn new(ledger: Arc<dyn BaseLedgerClient>, gateway: Gateway) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            gateway,
            orchestrators: Mutex::new(HashMap::new()),
            coordinator: OnceCell::new(),
        })
    }

    /// Binds the coordinator this registry reports confirmations back
    /// to. Called once, right after both are constructed (they form a
    /// cycle C6 -> C5 -> C6, so neither can be built holding a strong
    /// reference to the other up front).
    pub fn bind_coordinator(&self, coordinator: &Arc<PrivateTxCoordinator>) {
        let _ = self.coordinator.set(Arc::downgrade(coordinator));
    }

    async fn orchestrator_for(&self, signer: &str) -> Result<Arc<Orchestrator>, String> {
        let mut orchestrators = self.orchestrators.lock().await;
        if let Some(existing) = orchestrators.get(signer) {
            return Ok(existing.clone());
        }
        let orchestrator =
            Arc::new(Orchestrator::new(signer.to_string(), self.ledger.clone(), self.gateway.clone()).map_err(|e| e.to_string())?);
        orchestrators.insert(signer.to_string(), orchestrator.clone());
        Ok(orchestrator)
    }
}

#[async_trait]
impl PublicTxGateway for PublicTxRegistry {
    async fn submit_public(
        &self,
        public_tx_id: Uuid,
        call: &PreparedPublicCall,
        expected_cost: u128,
        initial_gas_price: u128,
    ) -> Result<(), String> {
        let orchestrator = self.orchestrator_for(&call.required_signer).await?;
        orchestrator.admit_or_update(public_tx_id, expected_cost, initial_gas_price).await.map_err(|e| e.to_string())?;

        match orchestrator.drive_to_submission(public_tx_id, call).await {
            Ok(()) => {
                let onchain_location = format!("0x{}:{}", public_tx_id.simple(), call.function);
                orchestrator.confirm(public_tx_id, expected_cost).await.map_err(|e| e.to_string())?;
                if let Some(coordinator) = self.coordinator.get().and_then(Weak::upgrade) {
                    // `NotFound` just means this was a standalone public
                    // submission with no private dispatch behind it.
                    match coordinator.on_public_confirmed(public_tx_id, &onchain_location).await {
                        Ok(()) | Err(paladin_privtx::PrivTxError::NotFound(_)) => {}
                        Err(err) => {
                            warn!(%public_tx_id, %err, "failed to record public confirmation against private receipt");
                        }
                    }
                }
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                let _ = orchestrator.fail(public_tx_id, expected_cost, &reason).await;
                if let Some(coordinator) = self.coordinator.get().and_then(Weak::upgrade) {
                    match coordinator.on_public_failed(public_tx_id, &reason).await {
                        Ok(()) | Err(paladin_privtx::PrivTxError::NotFound(_)) => {}
                        Err(err) => {
                            warn!(%public_tx_id, %err, "failed to record public failure against private receipt");
                        }
                    }
                }
                Err(reason)
            }
        }
    }
}
