//! # Crypto primitives
//!
//! Backs the local half of the signing module (§1): local key
//! derivation and signature production for the key/verifier resolver
//! (C7). The concrete signature the core domains reason about is opaque
//! bytes (§4.1) — this crate only needs to produce and verify them.
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `hashing` | BLAKE3 | Fast hashing |
//! | `signatures` | Ed25519 | Node-to-node identity signing |
//! | `ecdsa` | secp256k1 | Transaction/endorsement signing |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod hashing;
pub mod signatures;

// Re-exports
pub use ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature};
pub use errors::CryptoError;
pub use hashing::{blake3_hash, Blake3Hasher};
pub use signatures::{Ed25519KeyPair, Ed25519PublicKey, Ed25519Signature};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
