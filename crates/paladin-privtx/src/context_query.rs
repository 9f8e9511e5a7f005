//! Bridges the synchronous `ContextQuery` callback surface domain
//! plugins see during `Assemble`/`Endorse` onto the async state store,
//! by running the async calls on the current Tokio runtime via
//! `block_in_place`. Requires a multi-threaded runtime, which every
//! per-contract sequencer task runs on.

use std::sync::Arc;

use paladin_crypto::ecdsa::recover_signer;
use paladin_state::{ScopedQuery, StateStore};
use paladin_types::{ContextQuery, Schema, State, StateLock, StateQuery};
use uuid::Uuid;

pub struct StoreContextQuery {
    store: Arc<StateStore>,
    ctx_id: Uuid,
    domain: String,
    contract_address: String,
}

impl StoreContextQuery {
    pub fn new(store: Arc<StateStore>, ctx_id: Uuid, domain: String, contract_address: String) -> Self {
        Self { store, ctx_id, domain, contract_address }
    }

    fn scoped(&self, query: &StateQuery) -> ScopedQuery {
        ScopedQuery {
            schema_id: query.schema_id,
            domain: self.domain.clone(),
            contract_address: self.contract_address.clone(),
            limit: query.limit,
        }
    }
}

impl ContextQuery for StoreContextQuery {
    fn find_available_states(&self, query: &StateQuery) -> Result<Vec<(State, Vec<StateLock>)>, String> {
        let scoped = self.scoped(query);
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current()
                .block_on(self.store.find_available_states(self.ctx_id, &scoped))
        })
        .map_err(|e| e.to_string())
    }

    fn find_available_nullifiers(&self, query: &StateQuery) -> Result<Vec<(State, Vec<StateLock>)>, String> {
        let scoped = self.scoped(query);
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current()
                .block_on(self.store.find_available_nullifiers(self.ctx_id, &scoped))
        })
        .map_err(|e| e.to_string())
    }

    fn encode_data(&self, schema: &Schema, data: &serde_json::Value) -> Result<Vec<u8>, String> {
        let _ = schema;
        serde_json::to_vec(data).map_err(|e| e.to_string())
    }

    fn decode_data(&self, schema: &Schema, raw: &[u8]) -> Result<serde_json::Value, String> {
        let _ = schema;
        serde_json::from_slice(raw).map_err(|e| e.to_string())
    }

    fn recover_signer(&self, payload: &[u8], signature: &[u8]) -> Result<String, String> {
        let sig: [u8; 65] = signature.try_into().map_err(|_| "recoverable signature must be 65 bytes".to_string())?;
        let public = recover_signer(payload, &sig).map_err(|e| e.to_string())?;
        Ok(hex::encode(public.as_bytes()))
    }
}
