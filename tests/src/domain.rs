//! A minimal notes-style domain plugin: states are notes of the form
//! `{owner, amount}`, transfers spend input notes and mint new ones for
//! the recipient plus change for the sender. Used as test fixture for
//! the end-to-end scenarios in this crate, not shipped in any binary.

use paladin_types::{
    AssembledTransaction, AttestationRequest, AttestationResult, ContextQuery, DomainPlugin,
    EndorsementVerdict, Hash, PrepareOutcome, PreparedPublicCall, ResolvedVerifier, Schema,
    State, StateQuery, VerifierRequirement,
};
use paladin_keys::ED25519;
use serde_json::{json, Value};
use uuid::Uuid;

fn schema_declaration() -> Value {
    json!({"fields": ["owner", "amount"]})
}

/// One node's copy of the "notes" domain, scoped to that node's own
/// identity for self-endorsement (the wire format for a remote
/// endorsement request only carries a `tx_id` and opaque payload, so a
/// node can only answer for assemblies it holds itself; see
/// `paladin-node`'s dispatcher). Real multi-node endorsement is
/// exercised at the attestation-gathering layer, not reproduced here.
pub struct NotesDomain {
    local_node_id: String,
    schema_id: Hash,
}

impl NotesDomain {
    pub fn new(local_node_id: impl Into<String>) -> Self {
        Self { local_node_id: local_node_id.into(), schema_id: Schema::compute_id("notes", &schema_declaration()) }
    }

    pub fn schema_id(&self) -> Hash {
        self.schema_id
    }

    /// The schema this domain expects registered in the state store
    /// before any transfer can be assembled.
    pub fn schema(&self) -> Schema {
        Schema::new("notes".to_string(), schema_declaration(), Vec::new())
    }

    fn note(&self, contract_address: &str, owner: &str, amount: u64) -> State {
        State {
            id: Hash::from_bytes(format!("{contract_address}:{owner}:{amount}:{}", Uuid::new_v4()).as_bytes()),
            schema_id: self.schema_id,
            domain: self.name().to_string(),
            contract_address: contract_address.to_string(),
            data: json!({"owner": owner, "amount": amount.to_string()}),
            created_at: chrono::Utc::now(),
        }
    }

    fn owner_amount(state: &State) -> Option<(String, u64)> {
        let owner = state.data.get("owner")?.as_str()?.to_string();
        let amount: u64 = state.data.get("amount")?.as_str()?.parse().ok()?;
        Some((owner, amount))
    }
}

impl DomainPlugin for NotesDomain {
    fn name(&self) -> &str {
        "notes"
    }

    fn init_contract(&self, _contract_address: &str, _config: &[u8]) -> Result<Value, String> {
        Ok(json!({}))
    }

    fn init_deploy(&self, _inputs: &Value) -> Result<Vec<VerifierRequirement>, String> {
        Ok(Vec::new())
    }

    fn prepare_deploy(&self, inputs: &Value, _verifiers: &[ResolvedVerifier]) -> Result<PrepareOutcome, String> {
        let symbol = inputs.get("symbol").and_then(Value::as_str).unwrap_or("NOTE").to_string();
        Ok(PrepareOutcome::PublicCall(PreparedPublicCall {
            function: "deploy".to_string(),
            abi_reference: Hash::zero(),
            params: json!({"symbol": symbol}),
            required_signer: "deployer".to_string(),
        }))
    }

    fn init_transaction(
        &self,
        _contract_address: &str,
        function: &str,
        inputs: &Value,
    ) -> Result<Vec<VerifierRequirement>, String> {
        match function {
            "mint" => Ok(Vec::new()),
            "transfer" => {
                let from = inputs.get("from").and_then(Value::as_str).ok_or("transfer requires from")?;
                Ok(vec![VerifierRequirement {
                    lookup: from.to_string(),
                    algorithm: ED25519.to_string(),
                    verifier_type: "signature".to_string(),
                }])
            }
            other => Err(format!("notes: unknown function {other}")),
        }
    }

    fn assemble_transaction(
        &self,
        contract_address: &str,
        function: &str,
        inputs: &Value,
        _verifiers: &[ResolvedVerifier],
        ctx: &dyn ContextQuery,
    ) -> Result<AssembledTransaction, String> {
        match function {
            "mint" => {
                let owner = inputs.get("owner").and_then(Value::as_str).ok_or("mint requires owner")?;
                let amount: u64 =
                    inputs.get("amount").and_then(Value::as_u64).ok_or("mint requires a numeric amount")?;
                Ok(AssembledTransaction {
                    input_states: Vec::new(),
                    new_states: vec![self.note(contract_address, owner, amount)],
                    attestation_plan: Vec::new(),
                })
            }
            "transfer" => {
                let from = inputs.get("from").and_then(Value::as_str).ok_or("transfer requires from")?;
                let to = inputs.get("to").and_then(Value::as_str).ok_or("transfer requires to")?;
                let amount: u64 =
                    inputs.get("amount").and_then(Value::as_u64).ok_or("transfer requires a numeric amount")?;

                let query = StateQuery { schema_id: self.schema_id, filters: Value::Null, sort: Vec::new(), limit: None };
                let available = ctx.find_available_states(&query)?;

                let mut spend = Vec::new();
                let mut total = 0u64;
                for (state, _locks) in available {
                    let Some((owner, note_amount)) = Self::owner_amount(&state) else { continue };
                    if owner != from {
                        continue;
                    }
                    total += note_amount;
                    spend.push(state.id);
                    if total >= amount {
                        break;
                    }
                }
                if total < amount {
                    return Err(format!("insufficient funds (available={total})"));
                }

                let mut new_states = vec![self.note(contract_address, to, amount)];
                if total > amount {
                    new_states.push(self.note(contract_address, from, total - amount));
                }

                Ok(AssembledTransaction {
                    input_states: spend,
                    new_states,
                    attestation_plan: vec![
                        AttestationRequest::Signature { party: from.to_string(), payload: amount.to_string().into_bytes() },
                        AttestationRequest::Endorsement {
                            party: self.local_node_id.clone(),
                            payload: amount.to_string().into_bytes(),
                        },
                    ],
                })
            }
            other => Err(format!("notes: unknown function {other}")),
        }
    }

    fn endorse_transaction(
        &self,
        _contract_address: &str,
        _assembled: &AssembledTransaction,
        _endorser: &str,
    ) -> Result<EndorsementVerdict, String> {
        Ok(EndorsementVerdict::Approve)
    }

    fn prepare_transaction(
        &self,
        _contract_address: &str,
        assembled: &AssembledTransaction,
        attestations: &[AttestationResult],
    ) -> Result<PrepareOutcome, String> {
        if attestations.is_empty() && !assembled.attestation_plan.is_empty() {
            return Err("transfer requires its attestation plan to be satisfied".to_string());
        }
        let signer = attestations.first().map(|a| a.party.clone()).unwrap_or_default();
        Ok(PrepareOutcome::PublicCall(PreparedPublicCall {
            function: "transfer".to_string(),
            abi_reference: Hash::zero(),
            params: json!({"note_count": assembled.new_states.len()}),
            required_signer: signer,
        }))
    }

    fn init_call(&self, _contract_address: &str, _function: &str, _inputs: &Value) -> Result<Vec<VerifierRequirement>, String> {
        Ok(Vec::new())
    }

    fn exec_call(&self, _contract_address: &str, _function: &str, _inputs: &Value) -> Result<Value, String> {
        Ok(Value::Null)
    }

    fn build_receipt(&self, assembled: &AssembledTransaction, onchain_location: &str) -> Result<Value, String> {
        Ok(json!({"onchain_location": onchain_location, "notes_created": assembled.new_states.len()}))
    }

    fn validate_state_hashes(&self, states: &mut [State]) -> Result<(), String> {
        for state in states.iter_mut() {
            if state.id == Hash::zero() {
                let canonical = serde_json::to_vec(&state.data).map_err(|e| e.to_string())?;
                state.id = Hash::from_bytes(&canonical);
            }
        }
        Ok(())
    }

    fn handle_event_batch(&self, _contract_address: &str, _events: &[Value]) -> Result<(), String> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_state_hashes_fills_zero_ids_deterministically_from_data() {
        let domain = NotesDomain::new("node-1");
        let mut a = domain.note("contract-1", "alice", 10);
        let mut b = domain.note("contract-1", "alice", 10);
        a.id = Hash::zero();
        b.id = Hash::zero();
        a.data = json!({"owner": "alice", "amount": "10"});
        b.data = json!({"owner": "alice", "amount": "10"});

        domain.validate_state_hashes(std::slice::from_mut(&mut a)).unwrap();
        domain.validate_state_hashes(std::slice::from_mut(&mut b)).unwrap();

        assert_ne!(a.id, Hash::zero());
        assert_eq!(a.id, b.id, "identical data must hash to the same custom id");
    }

    #[test]
    fn validate_state_hashes_leaves_a_nonzero_id_untouched() {
        let domain = NotesDomain::new("node-1");
        let mut state = domain.note("contract-1", "alice", 10);
        let original = state.id;
        domain.validate_state_hashes(std::slice::from_mut(&mut state)).unwrap();
        assert_eq!(state.id, original);
    }
}
