//! # Signing module / key and verifier resolver (C7)
//!
//! Local key handles are derived and held in process memory; verifiers
//! for key handles owned by other nodes are resolved over C4's
//! fire-and-forget channel and cached for the synchronous `Signer`
//! contract used by C6 when gathering attestations.

mod errors;
mod keystore;
mod remote;
mod resolver;
mod signer;

pub use errors::KeysError;
pub use keystore::{LocalKeystore, ED25519};
pub use remote::RemoteVerifierCache;
pub use resolver::{handle_identity_message, request_resolution};
pub use signer::NodeSigner;
