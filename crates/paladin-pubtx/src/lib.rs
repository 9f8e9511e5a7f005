//! # Public transaction orchestrator (C5)
//!
//! One orchestrator per signing address, coordinating a single nonce
//! space against an external base ledger that may delay, reject, or
//! replace submissions.

mod balance;
mod errors;
mod fsm;
mod gas;
mod nonce;
mod orchestrator;

pub use balance::BalanceManager;
pub use errors::PubTxError;
pub use fsm::{InFlightTx, Stage, StageOutput};
pub use gas::EscalationPolicy;
pub use nonce::NonceAllocator;
pub use orchestrator::Orchestrator;
