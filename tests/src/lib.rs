//! # End-to-end test suite
//!
//! Drives a fully wired [`paladin_node::PaladinNode`] against a fresh,
//! migrated Postgres database per test, plus a transport-level
//! scenario run directly against two [`paladin_transport::TransportManager`]s
//! sharing an in-process loopback hub. `domain` holds the fake
//! "notes" [`paladin_types::DomainPlugin`] every DB-backed scenario
//! submits transactions against.
//!
//! ```bash
//! cargo test -p paladin-tests
//! ```

#![allow(unused_variables)]
#![allow(dead_code)]

pub mod domain;

#[cfg(test)]
mod pubtx_scenarios;
#[cfg(test)]
mod scenarios;
#[cfg(test)]
mod state_scenarios;
#[cfg(test)]
mod transport_scenarios;
