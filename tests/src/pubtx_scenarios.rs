//! Regression coverage for the public-tx update path (§4.5/§4.6): a
//! submission that arrives for a `public_tx_id` already in flight must
//! open a new version against the existing nonce and reservation
//! rather than admitting (and reserving) a second time.

use std::sync::Arc;

use paladin_node::{InMemoryLedger, LoopbackHub, NodeConfig, PaladinNode};
use paladin_privtx::{SubmitTx, UpdateTx};
use paladin_pubtx::Orchestrator;
use paladin_types::{BaseLedgerClient, CanonicalJson, DomainPlugin, Hash, PreparedPublicCall, TxType};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::NotesDomain;

fn call(function: &str, signer: &str) -> PreparedPublicCall {
    PreparedPublicCall {
        function: function.to_string(),
        abi_reference: Hash::zero(),
        params: json!({}),
        required_signer: signer.to_string(),
    }
}

#[sqlx::test(migrations = "../crates/paladin-persistence/migrations")]
async fn admit_or_update_reuses_nonce_and_reservation_while_in_flight(pool: PgPool) {
    let gateway = paladin_persistence::Gateway::new(pool);
    let ledger: Arc<dyn BaseLedgerClient> = Arc::new(InMemoryLedger::new(1_000));
    let orchestrator = Orchestrator::new("alice".to_string(), ledger, gateway).unwrap();

    let public_tx_id = Uuid::new_v4();
    let available_before = orchestrator.available_to_spend().await;

    let first_nonce = orchestrator.admit_or_update(public_tx_id, 100, 1).await.unwrap();
    let available_after_first = orchestrator.available_to_spend().await;
    assert_eq!(available_before - available_after_first, 100);

    // Same `public_tx_id`, still in flight (not yet driven to submission):
    // must reuse the nonce and reservation rather than admitting a
    // second time.
    let second_nonce = orchestrator.admit_or_update(public_tx_id, 100, 2).await.unwrap();
    let available_after_second = orchestrator.available_to_spend().await;

    assert_eq!(second_nonce, first_nonce, "an update must reuse the nonce already allocated");
    assert_eq!(available_after_second, available_after_first, "an update must not reserve balance a second time");

    // the version bump resets the stage to `Received`, which must still
    // accept a normal drive to submission
    orchestrator.drive_to_submission(public_tx_id, &call("noop", "alice")).await.unwrap();
}

fn single_node_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.identity.node_id = "node-1".to_string();
    config
}

async fn wired_node(pool: PgPool) -> Arc<PaladinNode> {
    let gateway = paladin_persistence::Gateway::new(pool);
    let hub = LoopbackHub::new();
    let notes: Arc<dyn DomainPlugin> = Arc::new(NotesDomain::new("node-1"));
    let node = PaladinNode::wire(single_node_config(), gateway, hub, vec![notes.clone()], Arc::new(InMemoryLedger::default())).await;
    let declared = NotesDomain::new("node-1").schema();
    node.store.register_schema(declared).await.unwrap();
    node
}

fn public_request(owner: &str) -> SubmitTx {
    SubmitTx {
        tx_type: TxType::Public,
        from: owner.to_string(),
        to: None,
        domain: None,
        is_deploy: false,
        function: "noop".to_string(),
        abi_reference: Hash::zero(),
        inputs: CanonicalJson::new(json!({})),
        idempotency_key: None,
        depends_on: Vec::new(),
        expected_cost: 0,
        initial_gas_price: 1,
    }
}

#[sqlx::test(migrations = "../crates/paladin-persistence/migrations")]
async fn update_public_rewrites_the_transaction_and_resubmits(pool: PgPool) {
    let node = wired_node(pool).await;
    node.signer.local().generate("alice");

    let submitted = node.submit(public_request("alice")).await.unwrap();
    assert!(!submitted.idempotent_duplicate);

    node.update_public(
        submitted.tx_id,
        UpdateTx {
            function: "noop_v2".to_string(),
            abi_reference: Hash::zero(),
            inputs: CanonicalJson::new(json!({"version": 2})),
            expected_cost: 0,
            initial_gas_price: 2,
        },
    )
    .await
    .unwrap();

    let view = node.get_transaction(submitted.tx_id).await.unwrap();
    assert_eq!(view.function, "noop_v2");
    assert_eq!(view.inputs, json!({"version": 2}));
}
