//! One orchestrator per signing address (§4.5): admits transactions
//! against the balance manager, allocates nonces in admission order,
//! and drives each in-flight transaction's stage machine.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use paladin_persistence::Gateway;
use paladin_types::{BaseLedgerClient, PreparedPublicCall};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::balance::BalanceManager;
use crate::errors::PubTxError;
use crate::fsm::{InFlightTx, Stage};
use crate::gas::EscalationPolicy;
use crate::nonce::NonceAllocator;

pub struct Orchestrator {
    signer: String,
    ledger: Arc<dyn BaseLedgerClient>,
    gateway: Gateway,
    balance: BalanceManager,
    nonces: NonceAllocator,
    escalation: EscalationPolicy,
    in_flight: Mutex<HashMap<Uuid, InFlightTx>>,
}

impl Orchestrator {
    pub fn new(signer: String, ledger: Arc<dyn BaseLedgerClient>, gateway: Gateway) -> Result<Self, PubTxError> {
        let balance = ledger.get_balance(&signer).map_err(|e| PubTxError::PersistenceRetry(e))?;
        let confirmed_nonce = ledger.get_confirmed_nonce(&signer).map_err(|e| PubTxError::PersistenceRetry(e))?;
        Ok(Self {
            signer,
            ledger,
            gateway,
            balance: BalanceManager::new(balance),
            nonces: NonceAllocator::starting_at(confirmed_nonce),
            escalation: EscalationPolicy::default(),
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    async fn persist_stage(&self, tx_id: Uuid, stage: Stage) -> Result<(), PubTxError> {
        self.gateway
            .transaction(|tx| async move {
                sqlx::query("UPDATE public_txns SET stage = $1 WHERE id = $2")
                    .bind(format!("{stage:?}"))
                    .bind(tx_id)
                    .execute(tx.conn().as_mut())
                    .await?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Admits a new transaction: reserves its expected cost against the
    /// balance manager, allocates its nonce, and registers it in-flight
    /// at `Received`.
    pub async fn admit(&self, tx_id: Uuid, expected_cost: u128, initial_gas_price: u128) -> Result<u64, PubTxError> {
        self.balance.reserve(expected_cost).await?;
        let nonce = self.nonces.allocate().await;
        let in_flight = InFlightTx::new(tx_id, self.signer.clone(), nonce, initial_gas_price);
        self.in_flight.lock().await.insert(tx_id, in_flight);
        self.persist_stage(tx_id, Stage::Received).await?;
        Ok(nonce)
    }

    /// Admits `tx_id` if it's not yet in flight, or opens a new version
    /// against it if it is (§4.5's update path): an update reuses the
    /// nonce and balance reservation already held rather than
    /// re-reserving and re-allocating, since those were already
    /// committed against the first version's submission.
    pub async fn admit_or_update(&self, tx_id: Uuid, expected_cost: u128, initial_gas_price: u128) -> Result<u64, PubTxError> {
        {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(entry) = in_flight.get_mut(&tx_id) {
                entry.open_new_version();
                entry.last_gas_price = initial_gas_price;
                let nonce = entry.nonce;
                drop(in_flight);
                self.persist_stage(tx_id, Stage::Received).await?;
                return Ok(nonce);
            }
        }
        self.admit(tx_id, expected_cost, initial_gas_price).await
    }

    /// Drives Signing -> Submitting -> Tracking for a newly-admitted
    /// transaction, persisting each `StageOutput` before advancing.
    pub async fn drive_to_submission(
        &self,
        tx_id: Uuid,
        call: &PreparedPublicCall,
    ) -> Result<(), PubTxError> {
        let (nonce, gas_price) = {
            let mut in_flight = self.in_flight.lock().await;
            let entry = in_flight.get_mut(&tx_id).ok_or(PubTxError::NotFound(tx_id))?;
            entry
                .record_output(Stage::Signing, serde_json::json!({"call": call.function}), Utc::now())
                .map_err(PubTxError::PersistenceRetry)?;
            (entry.nonce, entry.last_gas_price)
        };
        self.persist_stage(tx_id, Stage::Signing).await?;

        let location = self
            .ledger
            .submit(&self.signer, nonce, gas_price, call)
            .map_err(|e| {
                if e.contains("replacement transaction underpriced") {
                    PubTxError::ReplacementUnderpriced
                } else {
                    PubTxError::PersistenceRetry(e)
                }
            })?;

        let mut in_flight = self.in_flight.lock().await;
        let entry = in_flight.get_mut(&tx_id).ok_or(PubTxError::NotFound(tx_id))?;
        entry
            .record_output(Stage::Submitting, serde_json::json!({"location": location}), Utc::now())
            .map_err(PubTxError::PersistenceRetry)?;
        entry
            .record_output(Stage::Tracking, serde_json::json!({}), Utc::now())
            .map_err(PubTxError::PersistenceRetry)?;
        drop(in_flight);
        self.persist_stage(tx_id, Stage::Tracking).await?;
        info!(tx_id = %tx_id, nonce, "submitted to base ledger");
        Ok(())
    }

    /// Re-submit trigger: escalates gas price per the configured policy
    /// and re-enters `Submitting`.
    pub async fn escalate(&self, tx_id: Uuid, call: &PreparedPublicCall) -> Result<(), PubTxError> {
        {
            let mut in_flight = self.in_flight.lock().await;
            let entry = in_flight.get_mut(&tx_id).ok_or(PubTxError::NotFound(tx_id))?;
            entry.last_gas_price = self.escalation.escalate(entry.last_gas_price);
            entry
                .record_output(Stage::Escalating, serde_json::json!({}), Utc::now())
                .map_err(PubTxError::PersistenceRetry)?;
        }
        self.persist_stage(tx_id, Stage::Escalating).await?;
        self.drive_to_submission(tx_id, call).await
    }

    pub async fn confirm(&self, tx_id: Uuid, expected_cost: u128) -> Result<(), PubTxError> {
        {
            let mut in_flight = self.in_flight.lock().await;
            let entry = in_flight.get_mut(&tx_id).ok_or(PubTxError::NotFound(tx_id))?;
            entry
                .record_output(Stage::Confirmed, serde_json::json!({}), Utc::now())
                .map_err(PubTxError::PersistenceRetry)?;
        }
        self.balance.release(expected_cost).await;
        self.persist_stage(tx_id, Stage::Confirmed).await?;
        self.reap().await;
        Ok(())
    }

    pub async fn fail(&self, tx_id: Uuid, expected_cost: u128, reason: &str) -> Result<(), PubTxError> {
        {
            let mut in_flight = self.in_flight.lock().await;
            let entry = in_flight.get_mut(&tx_id).ok_or(PubTxError::NotFound(tx_id))?;
            entry
                .record_output(Stage::Failed, serde_json::json!({"reason": reason}), Utc::now())
                .map_err(PubTxError::PersistenceRetry)?;
        }
        self.balance.release(expected_cost).await;
        self.persist_stage(tx_id, Stage::Failed).await?;
        warn!(tx_id = %tx_id, reason, "in-flight transaction failed");
        self.reap().await;
        Ok(())
    }

    /// Drops in-flight transactions that are confirmed-or-failed and
    /// have drained every version's stage outputs.
    async fn reap(&self) {
        self.in_flight.lock().await.retain(|_, tx| !tx.is_removable());
    }

    pub async fn available_to_spend(&self) -> u128 {
        self.balance.available_to_spend().await
    }
}
