//! The coordinator's port onto C5: notifying the public-transaction
//! orchestrator of a newly staged submission. `paladin-node` wires this
//! to a registry of per-signer `Orchestrator`s.

use async_trait::async_trait;
use paladin_types::PreparedPublicCall;
use uuid::Uuid;

#[async_trait]
pub trait PublicTxGateway: Send + Sync {
    async fn submit_public(
        &self,
        public_tx_id: Uuid,
        call: &PreparedPublicCall,
        expected_cost: u128,
        initial_gas_price: u128,
    ) -> Result<(), String>;
}
