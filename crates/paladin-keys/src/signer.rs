//! Ties `LocalKeystore` and `RemoteVerifierCache` together behind the
//! `paladin_types::Signer` port used by C6 when gathering and
//! validating attestations.

use std::sync::Arc;

use paladin_types::plugins::Signer;

use crate::keystore::{LocalKeystore, ED25519};
use crate::remote::RemoteVerifierCache;

pub struct NodeSigner {
    local: LocalKeystore,
    remote: Arc<RemoteVerifierCache>,
}

impl NodeSigner {
    pub fn new(local: LocalKeystore, remote: RemoteVerifierCache) -> Self {
        Self { local, remote: Arc::new(remote) }
    }

    pub fn local(&self) -> &LocalKeystore {
        &self.local
    }

    /// Shared handle to the remote-verifier cache, so a transport
    /// dispatcher can fold inbound identity responses into the same
    /// cache this signer resolves against.
    pub fn remote(&self) -> &Arc<RemoteVerifierCache> {
        &self.remote
    }
}

impl Signer for NodeSigner {
    fn algorithms(&self) -> Vec<String> {
        vec![ED25519.to_string()]
    }

    fn sign(&self, algorithm: &str, key_handle: &str, payload: &[u8]) -> Result<Vec<u8>, String> {
        if algorithm != ED25519 {
            return Err(format!("unsupported algorithm: {algorithm}"));
        }
        self.local
            .sign(key_handle, payload)
            .map(|sig| sig.as_bytes().to_vec())
            .map_err(|e| e.to_string())
    }

    fn resolve_verifier(&self, algorithm: &str, verifier_type: &str, key_handle: &str) -> Result<String, String> {
        if algorithm != ED25519 {
            return Err(format!("unsupported algorithm: {algorithm}"));
        }
        if let Ok(public) = self.local.public_key(key_handle) {
            return Ok(hex::encode(public));
        }
        self.remote
            .get(algorithm, verifier_type, key_handle)
            .ok_or_else(|| format!("verifier for {key_handle} not yet resolved"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_key_resolves_without_remote_lookup() {
        let local = LocalKeystore::new();
        let public = local.generate("party-a");
        let signer = NodeSigner::new(local, RemoteVerifierCache::new());
        assert_eq!(signer.resolve_verifier(ED25519, "signature", "party-a").unwrap(), hex::encode(public));
    }

    #[test]
    fn remote_key_falls_back_to_cache() {
        let signer = NodeSigner::new(LocalKeystore::new(), RemoteVerifierCache::new());
        signer.remote.populate(ED25519, "signature", "party-b", "cafebabe".into());
        assert_eq!(signer.resolve_verifier(ED25519, "signature", "party-b").unwrap(), "cafebabe");
    }

    #[test]
    fn unresolved_remote_key_errors() {
        let signer = NodeSigner::new(LocalKeystore::new(), RemoteVerifierCache::new());
        assert!(signer.resolve_verifier(ED25519, "signature", "party-c").is_err());
    }

    #[test]
    fn sign_rejects_unknown_algorithm() {
        let signer = NodeSigner::new(LocalKeystore::new(), RemoteVerifierCache::new());
        assert!(signer.sign("secp256k1", "party-a", b"x").is_err());
    }
}
