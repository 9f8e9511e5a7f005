//! Node binary: reads configuration, initializes logging, wires C1-C7
//! behind the in-process loopback adapter, and connects to Postgres.
//! No domain plugins are registered here — loading a deployment's
//! plugins is an external-collaborator concern this binary leaves to
//! its caller (see `paladin_node::PaladinNode::connect`).

use paladin_node::{LoopbackHub, NodeConfig, PaladinNode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NodeConfig::default();
    paladin_telemetry::init_tracing(&config.telemetry)?;

    tracing::info!(node_id = %config.identity.node_id, "starting paladin node");

    let hub = LoopbackHub::new();
    let node = PaladinNode::connect(config, hub, Vec::new()).await?;

    tracing::info!("paladin node ready");

    // Keeps the process alive; a real deployment would serve an RPC or
    // gRPC surface here instead of idling. `node` is kept in scope so
    // its background tasks (peer sender loops) aren't dropped.
    let _node = node;
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}
