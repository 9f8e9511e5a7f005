//! Wire-level identity resolution: requests a verifier for a remote
//! key handle over C4's fire-and-forget channel, and answers the same
//! requests for key handles this node holds locally.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use paladin_transport::{TransportError, TransportManager};
use paladin_types::{Component, TransportMessage};

use crate::keystore::LocalKeystore;
use crate::remote::RemoteVerifierCache;

const REQUEST: &str = "resolve_verifier_request";
const RESPONSE: &str = "resolve_verifier_response";

#[derive(Debug, Serialize, Deserialize)]
struct ResolveRequest {
    algorithm: String,
    verifier_type: String,
    key_handle: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ResolveResponse {
    algorithm: String,
    verifier_type: String,
    key_handle: String,
    verifier: String,
}

/// Asks `node` to resolve the verifier backing `key_handle`. The
/// answer arrives asynchronously through [`handle_identity_message`]
/// and lands in `cache`.
pub async fn request_resolution(
    transport: &TransportManager,
    node: &str,
    algorithm: &str,
    verifier_type: &str,
    key_handle: &str,
) -> Result<(), TransportError> {
    let request = ResolveRequest {
        algorithm: algorithm.to_string(),
        verifier_type: verifier_type.to_string(),
        key_handle: key_handle.to_string(),
    };
    let payload = serde_json::to_vec(&request).expect("ResolveRequest always serializes");
    let message = TransportMessage {
        message_id: Uuid::new_v4(),
        correlation_id: None,
        component: Component::IdentityResolver,
        message_type: REQUEST.to_string(),
        payload,
    };
    transport.send_fire_and_forget(node, message).await
}

/// Dispatches an inbound `IdentityResolver` message: answers requests
/// from the local keystore, and folds responses into the cache.
pub async fn handle_identity_message(
    message: TransportMessage,
    transport: &TransportManager,
    replying_node: &str,
    local: &LocalKeystore,
    cache: &Arc<RemoteVerifierCache>,
) {
    match message.message_type.as_str() {
        REQUEST => {
            let Ok(request) = serde_json::from_slice::<ResolveRequest>(&message.payload) else {
                tracing::warn!(message_id = %message.message_id, "malformed identity resolve request");
                return;
            };
            let Ok(public) = local.public_key(&request.key_handle) else {
                return;
            };
            let response = ResolveResponse {
                algorithm: request.algorithm,
                verifier_type: request.verifier_type,
                key_handle: request.key_handle,
                verifier: hex::encode(public),
            };
            let Ok(payload) = serde_json::to_vec(&response) else {
                return;
            };
            let reply = TransportMessage {
                message_id: Uuid::new_v4(),
                correlation_id: Some(message.message_id),
                component: Component::IdentityResolver,
                message_type: RESPONSE.to_string(),
                payload,
            };
            if let Err(err) = transport.send_fire_and_forget(replying_node, reply).await {
                tracing::debug!(%err, "failed to send identity resolve response");
            }
        }
        RESPONSE => {
            let Ok(response) = serde_json::from_slice::<ResolveResponse>(&message.payload) else {
                tracing::warn!(message_id = %message.message_id, "malformed identity resolve response");
                return;
            };
            cache.populate(&response.algorithm, &response.verifier_type, &response.key_handle, response.verifier);
        }
        other => {
            tracing::warn!(message_type = other, "unrecognised identity resolver message");
        }
    }
}
