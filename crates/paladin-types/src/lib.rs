//! # Core Types
//!
//! Shared entities and contracts used by every component crate of the
//! node: the data model (schemas, states, locks, nullifiers,
//! transactions, reliable messages, dispatches, privacy groups), the
//! domain-plugin and transport-plugin wire contracts, and the
//! error-kind taxonomy common to all components.

pub mod data;
pub mod errors;
pub mod plugins;

pub use data::*;
pub use errors::*;
pub use plugins::*;
