//! # State store and domain context (C2)
//!
//! The durable store holds schemas, states and their label rows, plus
//! persisted nullifiers, locks-at-rest and privacy group membership. All
//! queries are scoped by (domain, contract-address, schema).
//!
//! Each in-flight transaction opens a [`context::DomainContext`]
//! identified by a fresh UUID; [`store::StateStore`] is the process-wide
//! registry of contexts plus the durable backend they overlay.

mod cache;
mod context;
mod errors;
mod store;

pub use context::{DomainContext, FlushSnapshot, OverlayEntry, StateUpsert};
pub use errors::StateError;
pub use store::{ScopedQuery, StateStore};
