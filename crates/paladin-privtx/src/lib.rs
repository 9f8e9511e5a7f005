//! # Private transaction coordinator (C6)
//!
//! Drives a private transaction submission through domain resolution,
//! per-contract sequencing, the domain plugin's four phases and
//! attestation gathering, ending in a prepared call dispatched to C5
//! (§4.6). Also exposes the supplemented read path (§4.8) over durable
//! transaction and receipt records.

mod attestation;
mod context_query;
mod coordinator;
mod dispatch;
mod errors;
mod reads;
mod sequencer;

pub use attestation::{handle_endorsement_message, gather_attestations, peek_tx_id, PendingAttestations};
pub use context_query::StoreContextQuery;
pub use coordinator::{PrivateTxCoordinator, SubmitOutcome, SubmitTx, UpdateTx};
pub use dispatch::PublicTxGateway;
pub use errors::PrivTxError;
pub use reads::{get_receipt, get_transaction, ReceiptView, TransactionView};
pub use sequencer::ContractSequencer;
