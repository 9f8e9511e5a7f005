//! Local key derivation: key handles map to Ed25519 keypairs held in
//! process memory, backed by `paladin-crypto`.

use std::collections::HashMap;
use std::sync::RwLock;

use paladin_crypto::{Ed25519KeyPair, Ed25519Signature};

use crate::errors::KeysError;

pub const ED25519: &str = "ed25519";

pub struct LocalKeystore {
    keys: RwLock<HashMap<String, Ed25519KeyPair>>,
}

impl LocalKeystore {
    pub fn new() -> Self {
        Self { keys: RwLock::new(HashMap::new()) }
    }

    pub fn generate(&self, key_handle: &str) -> [u8; 32] {
        let keypair = Ed25519KeyPair::generate();
        let public = *keypair.public_key().as_bytes();
        self.keys.write().unwrap().insert(key_handle.to_string(), keypair);
        public
    }

    pub fn import_seed(&self, key_handle: &str, seed: [u8; 32]) -> [u8; 32] {
        let keypair = Ed25519KeyPair::from_seed(seed);
        let public = *keypair.public_key().as_bytes();
        self.keys.write().unwrap().insert(key_handle.to_string(), keypair);
        public
    }

    pub fn public_key(&self, key_handle: &str) -> Result<[u8; 32], KeysError> {
        self.keys
            .read()
            .unwrap()
            .get(key_handle)
            .map(|kp| *kp.public_key().as_bytes())
            .ok_or_else(|| KeysError::UnknownKeyHandle(key_handle.to_string()))
    }

    pub fn sign(&self, key_handle: &str, payload: &[u8]) -> Result<Ed25519Signature, KeysError> {
        self.keys
            .read()
            .unwrap()
            .get(key_handle)
            .map(|kp| kp.sign(payload))
            .ok_or_else(|| KeysError::UnknownKeyHandle(key_handle.to_string()))
    }
}

impl Default for LocalKeystore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_signs_and_recovers_public_key() {
        let store = LocalKeystore::new();
        let public = store.generate("party-a");
        let sig = store.sign("party-a", b"payload").unwrap();
        assert_eq!(store.public_key("party-a").unwrap(), public);
        assert_eq!(sig.as_bytes().len(), 64);
    }

    #[test]
    fn unknown_handle_errors() {
        let store = LocalKeystore::new();
        assert!(matches!(store.public_key("ghost"), Err(KeysError::UnknownKeyHandle(_))));
    }
}
