//! # Persistence gateway (C1)
//!
//! Transactional access to the relational store. Every durable write in
//! the node goes through [`Gateway::transaction`], which hands the
//! caller a [`Tx`] wrapping an `sqlx::Transaction`; on commit the
//! registered `PostCommit` hooks run (cache fills, idempotency-safe
//! notifications), on rollback the `PostRollback` hooks run (idempotency
//! checks per §4.6, §5).
//!
//! Hooks are collected on the `Tx` during the unit of work and only
//! invoked after the database has durably committed or rolled back —
//! never speculatively — so a rolled-back write can never pollute a
//! cache (§5 "Caches").

mod errors;
mod gateway;

pub use errors::PersistenceError;
pub use gateway::{Gateway, PostCommitHook, PostRollbackHook, Tx};
