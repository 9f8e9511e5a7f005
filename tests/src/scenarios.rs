//! End-to-end scenarios against a real `PaladinNode`, one fresh
//! migrated Postgres database per test via `#[sqlx::test]`.

use std::sync::Arc;
use std::time::Duration;

use paladin_node::{InMemoryLedger, LoopbackHub, NodeConfig, PaladinNode};
use paladin_privtx::{ReceiptView, SubmitOutcome, SubmitTx};
use paladin_types::{CanonicalJson, DomainPlugin, Hash, TxType};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::NotesDomain;

fn single_node_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.identity.node_id = "node-1".to_string();
    config.privtx.endorsement_timeout = Duration::from_secs(5);
    config
}

fn mint_request(owner: &str, contract: &str, amount: u64) -> SubmitTx {
    SubmitTx {
        tx_type: TxType::Private,
        from: owner.to_string(),
        to: Some(contract.to_string()),
        domain: Some("notes".to_string()),
        is_deploy: false,
        function: "mint".to_string(),
        abi_reference: Hash::zero(),
        inputs: CanonicalJson::new(json!({"owner": owner, "amount": amount})),
        idempotency_key: None,
        depends_on: Vec::new(),
        expected_cost: 0,
        initial_gas_price: 0,
    }
}

fn transfer_request(from: &str, to: &str, contract: &str, amount: u64, idempotency_key: Option<&str>) -> SubmitTx {
    SubmitTx {
        tx_type: TxType::Private,
        from: from.to_string(),
        to: Some(contract.to_string()),
        domain: None,
        is_deploy: false,
        function: "transfer".to_string(),
        abi_reference: Hash::zero(),
        inputs: CanonicalJson::new(json!({"from": from, "to": to, "amount": amount})),
        idempotency_key: idempotency_key.map(str::to_string),
        depends_on: Vec::new(),
        expected_cost: 0,
        initial_gas_price: 0,
    }
}

/// Public confirmation lands via a spawned task (the coordinator
/// returns as soon as a transaction is prepared and dispatched, not
/// once its base-ledger outcome is known); poll briefly rather than
/// assume it has already landed.
async fn wait_for_receipt(node: &PaladinNode, tx_id: Uuid) -> ReceiptView {
    for _ in 0..50 {
        if let Some(receipt) = node.get_receipt(tx_id).await.unwrap() {
            return receipt;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("receipt for {tx_id} never landed");
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

#[sqlx::test(migrations = "../crates/paladin-persistence/migrations")]
async fn mint_then_transfer_settles_and_repeat_submission_is_idempotent(pool: PgPool) {
    let node = wired_node(pool).await;
    node.signer.local().generate("alice");
    node.signer.local().generate("bob");

    let mint = node.submit(mint_request("alice", "contract-1", 100)).await.unwrap();
    assert!(!mint.idempotent_duplicate);
    let mint_receipt = wait_for_receipt(&node, mint.tx_id).await;
    assert!(mint_receipt.success);

    let transfer_req = transfer_request("alice", "bob", "contract-1", 40, Some("transfer-1"));
    let first: SubmitOutcome = node.submit(transfer_req.clone()).await.unwrap();
    assert!(!first.idempotent_duplicate);
    let transfer_receipt = wait_for_receipt(&node, first.tx_id).await;
    assert!(transfer_receipt.success);

    let second = node.submit(transfer_req).await.unwrap();
    assert!(second.idempotent_duplicate);
    assert_eq!(second.tx_id, first.tx_id);
}

#[sqlx::test(migrations = "../crates/paladin-persistence/migrations")]
async fn transfer_beyond_available_balance_fails_assembly(pool: PgPool) {
    let node = wired_node(pool).await;
    node.signer.local().generate("alice");
    node.signer.local().generate("bob");

    let mint = node.submit(mint_request("alice", "contract-1", 10)).await.unwrap();
    wait_for_receipt(&node, mint.tx_id).await;

    let err = node.submit(transfer_request("alice", "bob", "contract-1", 50, None)).await.unwrap_err();
    assert!(err.to_string().contains("insufficient funds"), "unexpected error: {err}");
}

#[sqlx::test(migrations = "../crates/paladin-persistence/migrations")]
async fn concurrent_submits_with_the_same_idempotency_key_resolve_to_one_transaction(pool: PgPool) {
    let node = wired_node(pool).await;
    node.signer.local().generate("alice");

    let a = node.clone();
    let b = node.clone();
    let (r1, r2) = tokio::join!(
        a.submit(mint_request_with_key("alice", "contract-1", 5, "mint-once")),
        b.submit(mint_request_with_key("alice", "contract-1", 5, "mint-once")),
    );
    let r1 = r1.unwrap();
    let r2 = r2.unwrap();

    assert_eq!(r1.tx_id, r2.tx_id);
    assert_eq!(r1.idempotent_duplicate != r2.idempotent_duplicate, true, "exactly one submission should have won");
}

fn mint_request_with_key(owner: &str, contract: &str, amount: u64, key: &str) -> SubmitTx {
    let mut req = mint_request(owner, contract, amount);
    req.idempotency_key = Some(key.to_string());
    req
}
