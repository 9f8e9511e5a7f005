//! External collaborator contracts (§6): the domain-plugin protocol, the
//! transport-plugin protocol and the registry-plugin protocol.
//!
//! These are `async_trait`-free plain-`Result` traits: the concrete
//! drivers (in-process or out-of-process-framed) live in the owning
//! component crates (`paladin-domain-manager`, `paladin-transport`).
//! Keeping the trait definitions here lets every component crate depend
//! on the contract without depending on each other.

use crate::data::{Hash, Schema, State, StateLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A verifier requirement declared by `InitTransaction`/`InitDeploy`:
/// an identity lookup keyed by algorithm and verifier type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierRequirement {
    pub lookup: String,
    pub algorithm: String,
    pub verifier_type: String,
}

/// A resolved verifier: the requirement plus the concrete verifier
/// string (e.g. a public key or node-qualified identity) C7 produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedVerifier {
    pub requirement: VerifierRequirement,
    pub verifier: String,
}

/// One requested attestation in an attestation plan: a signature from a
/// named party, or an endorsement from a named party.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AttestationRequest {
    Signature { party: String, payload: Vec<u8> },
    Endorsement { party: String, payload: Vec<u8> },
}

/// A collected attestation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationResult {
    pub party: String,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

/// Endorsement verdict returned by `EndorseTransaction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EndorsementVerdict {
    Approve,
    Reject { reason: String },
    /// The endorser will itself submit the public transaction.
    EndorserSubmit,
}

/// A prepared public call: the output of a successful `Prepare` phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreparedPublicCall {
    pub function: String,
    pub abi_reference: Hash,
    pub params: serde_json::Value,
    pub required_signer: String,
}

/// `Prepare` may instead chain a new private transaction rather than
/// producing a public call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PrepareOutcome {
    PublicCall(PreparedPublicCall),
    ChainedPrivateTx { to: Option<String>, function: String, inputs: serde_json::Value },
}

/// Candidate states produced by `Assemble`: inputs consumed, new states
/// proposed, and the attestation plan that must be satisfied before
/// `Prepare` may run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledTransaction {
    pub input_states: Vec<Hash>,
    pub new_states: Vec<State>,
    pub attestation_plan: Vec<AttestationRequest>,
}

/// A query against the state store, issued by a domain plugin during
/// `Assemble`/`Endorse` as a callback request (§4.1, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateQuery {
    pub schema_id: Hash,
    pub filters: serde_json::Value,
    pub sort: Vec<String>,
    pub limit: Option<usize>,
}

/// A query handle into C2 passed to `Assemble`, scoped to one domain
/// context. `paladin-state` provides the concrete implementation; this
/// trait is the seam the domain plugin sees.
pub trait ContextQuery: Send + Sync {
    fn find_available_states(&self, query: &StateQuery) -> Result<Vec<(State, Vec<StateLock>)>, String>;
    fn find_available_nullifiers(&self, query: &StateQuery) -> Result<Vec<(State, Vec<StateLock>)>, String>;
    fn encode_data(&self, schema: &Schema, data: &serde_json::Value) -> Result<Vec<u8>, String>;
    fn decode_data(&self, schema: &Schema, raw: &[u8]) -> Result<serde_json::Value, String>;
    fn recover_signer(&self, payload: &[u8], signature: &[u8]) -> Result<String, String>;
}

/// The four-phase-plus-deploy domain plugin contract of §4.1. Every
/// phase's errors are fatal to that attempt; `assemble` must be
/// idempotent over its inputs so the coordinator may re-run it from
/// scratch.
pub trait DomainPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Parse a smart-contract's on-chain config blob at first sight.
    fn init_contract(&self, contract_address: &str, config: &[u8]) -> Result<serde_json::Value, String>;

    fn init_deploy(&self, inputs: &serde_json::Value) -> Result<Vec<VerifierRequirement>, String>;
    fn prepare_deploy(
        &self,
        inputs: &serde_json::Value,
        verifiers: &[ResolvedVerifier],
    ) -> Result<PrepareOutcome, String>;

    fn init_transaction(
        &self,
        contract_address: &str,
        function: &str,
        inputs: &serde_json::Value,
    ) -> Result<Vec<VerifierRequirement>, String>;

    fn assemble_transaction(
        &self,
        contract_address: &str,
        function: &str,
        inputs: &serde_json::Value,
        verifiers: &[ResolvedVerifier],
        ctx: &dyn ContextQuery,
    ) -> Result<AssembledTransaction, String>;

    fn endorse_transaction(
        &self,
        contract_address: &str,
        assembled: &AssembledTransaction,
        endorser: &str,
    ) -> Result<EndorsementVerdict, String>;

    fn prepare_transaction(
        &self,
        contract_address: &str,
        assembled: &AssembledTransaction,
        attestations: &[AttestationResult],
    ) -> Result<PrepareOutcome, String>;

    fn init_call(&self, contract_address: &str, function: &str, inputs: &serde_json::Value) -> Result<Vec<VerifierRequirement>, String>;
    fn exec_call(&self, contract_address: &str, function: &str, inputs: &serde_json::Value) -> Result<serde_json::Value, String>;

    fn build_receipt(&self, assembled: &AssembledTransaction, onchain_location: &str) -> Result<serde_json::Value, String>;

    /// Validates state ids received from a peer; fills them in if the
    /// domain declares a custom hash function (§4.1, §4.2).
    fn validate_state_hashes(&self, states: &mut [State]) -> Result<(), String>;

    fn handle_event_batch(&self, contract_address: &str, events: &[serde_json::Value]) -> Result<(), String>;
}

/// `Component` tag for inbound transport messages, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Component {
    TransactionEngine,
    ReliableMessageHandler,
    IdentityResolver,
}

/// Wire envelope for every transport message (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportMessage {
    pub message_id: Uuid,
    pub correlation_id: Option<Uuid>,
    pub component: Component,
    pub message_type: String,
    pub payload: Vec<u8>,
}

/// Opaque peer-info returned by `ActivateNode`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerInfo {
    pub details: serde_json::Value,
}

/// One transport implementation's contract (§6).
pub trait TransportPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn configure(&mut self, config: &serde_json::Value) -> Result<(), String>;
    fn activate(&self, node: &str, transport_details: &serde_json::Value) -> Result<PeerInfo, String>;
    fn deactivate(&self, node: &str) -> Result<(), String>;
    fn send(&self, node: &str, message: &TransportMessage) -> Result<(), String>;
    fn get_local_details(&self) -> serde_json::Value;
}

/// A registry property attached to an entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryProperty {
    pub entry_id: String,
    pub name: String,
    pub value: String,
    pub active: bool,
    pub plugin_reserved: bool,
    pub provenance: String,
}

/// A registry entry (node, or a sub-entry in a hierarchical name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub active: bool,
    pub provenance_location: String,
}

/// A resolved (transport-name, opaque details) pair for a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTransportDetails {
    pub transport_name: String,
    pub details: serde_json::Value,
}

/// The registry plugin contract (§6).
pub trait RegistryPlugin: Send + Sync {
    fn upsert_records(&self, entries: &[RegistryEntry], properties: &[RegistryProperty]) -> Result<(), String>;
    /// Resolves node -> transport details, honouring an optional
    /// hierarchical splitter and property-regex configured on the
    /// registry instance.
    fn lookup_node_transports(&self, node: &str) -> Result<Vec<NodeTransportDetails>, String>;
}

/// A signing module / key resolver contract used by C6/C7: produces
/// signatures or SNARK proofs from opaque payloads.
pub trait Signer: Send + Sync {
    fn algorithms(&self) -> Vec<String>;
    fn sign(&self, algorithm: &str, key_handle: &str, payload: &[u8]) -> Result<Vec<u8>, String>;
    fn resolve_verifier(&self, algorithm: &str, verifier_type: &str, key_handle: &str) -> Result<String, String>;
}

/// A base-ledger client contract used by C5: submits and observes
/// confirmations of public transactions.
pub trait BaseLedgerClient: Send + Sync {
    fn submit(&self, from: &str, nonce: u64, gas_price: u128, call: &PreparedPublicCall) -> Result<String, String>;
    fn get_balance(&self, address: &str) -> Result<u128, String>;
    fn get_confirmed_nonce(&self, address: &str) -> Result<u64, String>;
}

#[allow(unused)]
fn _assert_object_safe(_: &dyn DomainPlugin, _: &dyn TransportPlugin, _: &dyn RegistryPlugin, _: &dyn Signer, _: &dyn BaseLedgerClient) {}
