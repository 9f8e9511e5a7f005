//! # Node wiring
//!
//! Assembles C1-C7 into one running process: the persistence gateway,
//! state store, domain manager, transport manager (over an in-process
//! loopback transport/registry adapter), the public- and private-
//! transaction coordinators, and the signing module. The binary
//! (`main.rs`) is a thin shell over [`PaladinNode`].

pub mod config;
pub mod dispatcher;
pub mod ledger;
pub mod loopback;
pub mod node;
pub mod pubtx_registry;

pub use config::NodeConfig;
pub use ledger::InMemoryLedger;
pub use loopback::LoopbackHub;
pub use node::PaladinNode;
