//! Attestation gathering (§4.6 step 4): local signatures come from the
//! signing module directly; endorsements from remote parties are
//! requested over C4's reliable class and awaited with a timeout.

use std::collections::HashMap;
use std::time::Duration;

use paladin_domain_manager::DomainSmartContract;
use paladin_keys::{NodeSigner, ED25519};
use paladin_transport::TransportManager;
use paladin_types::{AssembledTransaction, AttestationRequest, AttestationResult, EndorsementVerdict};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

use crate::errors::PrivTxError;

const ENDORSEMENT_REQUEST: &str = "endorsement_request";
const ENDORSEMENT_RESPONSE: &str = "endorsement_response";

#[derive(Debug, Serialize, Deserialize)]
struct RequestWire {
    tx_id: Uuid,
    requester_node: String,
    party: String,
    payload: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize)]
enum VerdictWire {
    Approve { signature: Vec<u8> },
    Reject { reason: String },
    EndorserSubmit,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResponseWire {
    tx_id: Uuid,
    party: String,
    verdict: VerdictWire,
}

/// Tracks in-flight remote endorsement requests by `(tx_id, party)` so
/// the asynchronous response can be routed back to the waiting
/// gatherer.
#[derive(Default)]
pub struct PendingAttestations {
    waiters: Mutex<HashMap<(Uuid, String), oneshot::Sender<ResponseWire>>>,
}

impl PendingAttestations {
    pub fn new() -> Self {
        Self::default()
    }

    async fn register(&self, tx_id: Uuid, party: &str) -> oneshot::Receiver<ResponseWire> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert((tx_id, party.to_string()), tx);
        rx
    }

    async fn resolve(&self, response: ResponseWire) {
        if let Some(tx) = self.waiters.lock().await.remove(&(response.tx_id, response.party.clone())) {
            let _ = tx.send(response);
        }
    }
}

fn encode_metadata(wire: &impl Serialize) -> HashMap<String, String> {
    let mut metadata = HashMap::new();
    metadata.insert("payload".to_string(), hex::encode(serde_json::to_vec(wire).expect("wire payload always serializes")));
    metadata
}

fn decode_metadata<T: for<'de> Deserialize<'de>>(payload: &[u8]) -> Option<T> {
    let metadata: HashMap<String, String> = serde_json::from_slice(payload).ok()?;
    let raw = metadata.get("payload")?;
    let bytes = hex::decode(raw).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Gathers every attestation named by `assembled`'s plan, signing
/// locally where the signing module owns the key handle and round-
/// tripping through C4 for remote endorsers.
pub async fn gather_attestations(
    tx_id: Uuid,
    local_node: &str,
    domain: &DomainSmartContract,
    assembled: &AssembledTransaction,
    signer: &NodeSigner,
    transport: &TransportManager,
    pending: &PendingAttestations,
    endorsement_timeout: Duration,
) -> Result<Vec<AttestationResult>, PrivTxError> {
    let mut results = Vec::with_capacity(assembled.attestation_plan.len());
    for request in &assembled.attestation_plan {
        match request {
            AttestationRequest::Signature { party, payload } => {
                let signature = signer
                    .sign(ED25519, party, payload)
                    .map_err(PrivTxError::AttestationFailed)?;
                results.push(AttestationResult { party: party.clone(), payload: payload.clone(), signature });
            }
            AttestationRequest::Endorsement { party, payload } => {
                let result = if party == local_node {
                    endorse_locally(domain, assembled, party, payload, signer)?
                } else {
                    request_remote_endorsement(
                        tx_id,
                        local_node,
                        party,
                        payload,
                        transport,
                        pending,
                        endorsement_timeout,
                    )
                    .await?
                };
                results.push(result);
            }
        }
    }
    Ok(results)
}

fn endorse_locally(
    domain: &DomainSmartContract,
    assembled: &AssembledTransaction,
    party: &str,
    payload: &[u8],
    signer: &NodeSigner,
) -> Result<AttestationResult, PrivTxError> {
    match domain
        .endorse_transaction(assembled, party)
        .map_err(|e| PrivTxError::AttestationFailed(e.to_string()))?
    {
        EndorsementVerdict::Approve => {
            let signature = signer.sign(ED25519, party, payload).map_err(PrivTxError::AttestationFailed)?;
            Ok(AttestationResult { party: party.to_string(), payload: payload.to_vec(), signature })
        }
        EndorsementVerdict::Reject { reason } => Err(PrivTxError::EndorsementRejected(reason)),
        EndorsementVerdict::EndorserSubmit => {
            Ok(AttestationResult { party: party.to_string(), payload: payload.to_vec(), signature: Vec::new() })
        }
    }
}

async fn request_remote_endorsement(
    tx_id: Uuid,
    local_node: &str,
    party: &str,
    payload: &[u8],
    transport: &TransportManager,
    pending: &PendingAttestations,
    timeout: Duration,
) -> Result<AttestationResult, PrivTxError> {
    let rx = pending.register(tx_id, party).await;
    let wire = RequestWire {
        tx_id,
        requester_node: local_node.to_string(),
        party: party.to_string(),
        payload: payload.to_vec(),
    };
    transport.send_reliable(party, ENDORSEMENT_REQUEST, encode_metadata(&wire)).await?;

    let response = tokio::time::timeout(timeout, rx)
        .await
        .map_err(|_| PrivTxError::AttestationTimeout(party.to_string()))?
        .map_err(|_| PrivTxError::AttestationTimeout(party.to_string()))?;

    match response.verdict {
        VerdictWire::Approve { signature } => {
            Ok(AttestationResult { party: party.to_string(), payload: payload.to_vec(), signature })
        }
        VerdictWire::Reject { reason } => Err(PrivTxError::EndorsementRejected(reason)),
        VerdictWire::EndorserSubmit => {
            Ok(AttestationResult { party: party.to_string(), payload: payload.to_vec(), signature: Vec::new() })
        }
    }
}

/// Peeks the `tx_id` out of an endorsement-tagged reliable message
/// without resolving anything else, so a transport dispatcher can look
/// up which domain/contract handle to hand to
/// [`handle_endorsement_message`] before decoding the rest of it.
pub fn peek_tx_id(message_type: &str, payload: &[u8]) -> Option<Uuid> {
    match message_type {
        ENDORSEMENT_REQUEST => decode_metadata::<RequestWire>(payload).map(|w| w.tx_id),
        ENDORSEMENT_RESPONSE => decode_metadata::<ResponseWire>(payload).map(|w| w.tx_id),
        _ => None,
    }
}

/// Dispatches an inbound reliable message tagged with an endorsement
/// `message_type`: answers requests against the local domain/signer,
/// and resolves pending waiters on responses.
pub async fn handle_endorsement_message(
    message_type: &str,
    payload: &[u8],
    local_node: &str,
    domain: &DomainSmartContract,
    assembled_lookup: impl Fn(Uuid) -> Option<AssembledTransaction>,
    signer: &NodeSigner,
    transport: &TransportManager,
    pending: &PendingAttestations,
) {
    match message_type {
        ENDORSEMENT_REQUEST => {
            let Some(request) = decode_metadata::<RequestWire>(payload) else {
                tracing::warn!("malformed endorsement request payload");
                return;
            };
            let Some(assembled) = assembled_lookup(request.tx_id) else {
                tracing::warn!(tx_id = %request.tx_id, "endorsement request for unknown assembly");
                return;
            };
            let verdict = match endorse_locally(domain, &assembled, &request.party, &request.payload, signer) {
                Ok(result) => VerdictWire::Approve { signature: result.signature },
                Err(PrivTxError::EndorsementRejected(reason)) => VerdictWire::Reject { reason },
                Err(err) => VerdictWire::Reject { reason: err.to_string() },
            };
            let response = ResponseWire { tx_id: request.tx_id, party: request.party, verdict };
            if let Err(err) = transport
                .send_reliable(&request.requester_node, ENDORSEMENT_RESPONSE, encode_metadata(&response))
                .await
            {
                tracing::debug!(%err, "failed to send endorsement response");
            }
        }
        ENDORSEMENT_RESPONSE => {
            let Some(response) = decode_metadata::<ResponseWire>(payload) else {
                tracing::warn!("malformed endorsement response payload");
                return;
            };
            pending.resolve(response).await;
        }
        other => {
            tracing::warn!(message_type = other, "unrecognised endorsement message");
        }
    }
}
