//! In-flight transaction state machine (§4.5): `Received -> Signing ->
//! Submitting -> Tracking -> (Escalating | Confirmed | Failed)`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Signing,
    Submitting,
    Tracking,
    Escalating,
    Confirmed,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Confirmed | Stage::Failed)
    }

    /// Legal forward transitions per §4.5's ordered stage list.
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Received, Signing)
                | (Signing, Submitting)
                | (Submitting, Tracking)
                | (Tracking, Escalating)
                | (Tracking, Confirmed)
                | (Tracking, Failed)
                | (Escalating, Tracking)
                | (Escalating, Confirmed)
                | (Escalating, Failed)
        )
    }
}

/// Output of one stage, written durably before the FSM advances (§4.5).
#[derive(Debug, Clone)]
pub struct StageOutput {
    pub tx_id: Uuid,
    pub version: u64,
    pub stage: Stage,
    pub produced_at: DateTime<Utc>,
    pub detail: serde_json::Value,
}

/// One logical public transaction, tracked across versions. An update
/// mid-flight opens a new version; actions already committed by a
/// previous version (e.g. a persisted signature) are not redone, but
/// later outputs of an updated version are discarded.
pub struct InFlightTx {
    pub id: Uuid,
    pub signer: String,
    pub nonce: u64,
    pub stage: Stage,
    pub version: u64,
    pub last_gas_price: u128,
    pub outputs: Vec<StageOutput>,
}

impl InFlightTx {
    pub fn new(id: Uuid, signer: String, nonce: u64, initial_gas_price: u128) -> Self {
        Self {
            id,
            signer,
            nonce,
            stage: Stage::Received,
            version: 0,
            last_gas_price: initial_gas_price,
            outputs: Vec::new(),
        }
    }

    /// Opens a new version (an update arrived mid-flight): the nonce
    /// and balance reservation already held for this transaction carry
    /// over unchanged, but the stage resets to `Received` so the
    /// updated call re-enters Signing -> Submitting -> Tracking under
    /// the bumped version. Only outputs produced under the new version
    /// are retained going forward (see `is_removable`).
    pub fn open_new_version(&mut self) {
        self.version += 1;
        self.stage = Stage::Received;
    }

    pub fn record_output(&mut self, stage: Stage, detail: serde_json::Value, now: DateTime<Utc>) -> Result<(), String> {
        if !self.stage.can_advance_to(stage) {
            return Err(format!("illegal transition {:?} -> {:?}", self.stage, stage));
        }
        self.outputs.push(StageOutput {
            tx_id: self.id,
            version: self.version,
            stage,
            produced_at: now,
            detail,
        });
        self.stage = stage;
        Ok(())
    }

    /// A transaction is removable once confirmed-or-failed AND every
    /// version has drained its stage outputs (here: no outputs from a
    /// version older than the current one remain pending persistence,
    /// modeled as all outputs belonging to the current version).
    pub fn is_removable(&self) -> bool {
        self.stage.is_terminal() && self.outputs.iter().all(|o| o.version == self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(0, 0).unwrap()
    }

    #[test]
    fn stage_transitions_follow_order() {
        let mut tx = InFlightTx::new(Uuid::new_v4(), "0xabc".into(), 1, 1_000_000_000);
        tx.record_output(Stage::Signing, serde_json::json!({}), now()).unwrap();
        tx.record_output(Stage::Submitting, serde_json::json!({}), now()).unwrap();
        assert_eq!(tx.stage, Stage::Submitting);
    }

    #[test]
    fn illegal_transition_is_rejected() {
        let mut tx = InFlightTx::new(Uuid::new_v4(), "0xabc".into(), 1, 1_000_000_000);
        assert!(tx.record_output(Stage::Tracking, serde_json::json!({}), now()).is_err());
    }

    #[test]
    fn removable_only_once_terminal_and_drained() {
        let mut tx = InFlightTx::new(Uuid::new_v4(), "0xabc".into(), 1, 1_000_000_000);
        assert!(!tx.is_removable());
        tx.record_output(Stage::Signing, serde_json::json!({}), now()).unwrap();
        tx.record_output(Stage::Submitting, serde_json::json!({}), now()).unwrap();
        tx.record_output(Stage::Tracking, serde_json::json!({}), now()).unwrap();
        tx.record_output(Stage::Confirmed, serde_json::json!({}), now()).unwrap();
        assert!(tx.is_removable());
    }

    #[test]
    fn opening_a_new_version_resets_stage_but_keeps_nonce() {
        let mut tx = InFlightTx::new(Uuid::new_v4(), "0xabc".into(), 7, 1_000_000_000);
        tx.record_output(Stage::Signing, serde_json::json!({}), now()).unwrap();
        tx.record_output(Stage::Submitting, serde_json::json!({}), now()).unwrap();

        tx.open_new_version();

        assert_eq!(tx.version, 1);
        assert_eq!(tx.stage, Stage::Received);
        assert_eq!(tx.nonce, 7, "the nonce already allocated must not change on an update");

        // the reset stage must accept the normal forward sequence again
        tx.record_output(Stage::Signing, serde_json::json!({}), now()).unwrap();
        assert_eq!(tx.stage, Stage::Signing);
    }
}
