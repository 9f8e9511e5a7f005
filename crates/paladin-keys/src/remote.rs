//! Remote verifier resolution over C4: a node asks a peer's identity
//! resolver for the verifier backing one of its key handles; the
//! answer lands asynchronously and is cached here so the synchronous
//! `Signer::resolve_verifier` contract can be satisfied from cache.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CacheKey {
    algorithm: String,
    verifier_type: String,
    key_handle: String,
}

#[derive(Default)]
pub struct RemoteVerifierCache {
    entries: RwLock<HashMap<CacheKey, String>>,
}

impl RemoteVerifierCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn populate(&self, algorithm: &str, verifier_type: &str, key_handle: &str, verifier: String) {
        self.entries.write().unwrap().insert(
            CacheKey {
                algorithm: algorithm.to_string(),
                verifier_type: verifier_type.to_string(),
                key_handle: key_handle.to_string(),
            },
            verifier,
        );
    }

    pub fn get(&self, algorithm: &str, verifier_type: &str, key_handle: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap()
            .get(&CacheKey {
                algorithm: algorithm.to_string(),
                verifier_type: verifier_type.to_string(),
                key_handle: key_handle.to_string(),
            })
            .cloned()
    }
}
