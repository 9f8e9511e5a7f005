//! Regression coverage for the privacy-group write path (§4.7): the
//! `privacy_groups` / `privacy_group_members` tables were previously
//! only ever read from, never written to.

use chrono::Utc;
use paladin_state::StateStore;
use paladin_types::{Hash, Schema, State};
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "../crates/paladin-persistence/migrations")]
async fn create_privacy_group_is_readable_by_its_members(pool: PgPool) {
    let gateway = paladin_persistence::Gateway::new(pool);
    let store = StateStore::new(gateway);

    let schema = Schema::new("notes".to_string(), json!({"fields": ["owner"]}), Vec::new());
    store.register_schema(schema.clone()).await.unwrap();

    let genesis = State {
        id: Hash::from_bytes(b"group-genesis"),
        schema_id: schema.id,
        domain: "notes".to_string(),
        contract_address: "contract-1".to_string(),
        data: json!({"owner": "alice"}),
        created_at: Utc::now(),
    };

    let group_id = store
        .create_privacy_group("notes", genesis.clone(), vec!["alice".to_string(), "bob".to_string()])
        .await
        .unwrap();
    assert_eq!(group_id, genesis.id);

    let group = store.privacy_group("notes", &group_id).await.unwrap().expect("group must be readable after creation");
    assert_eq!(group.domain, "notes");
    assert_eq!(group.members.len(), 2);
    assert!(group.members.contains(&"alice".to_string()));
    assert!(group.members.contains(&"bob".to_string()));

    // creating the same group twice must not fail or duplicate members
    store.create_privacy_group("notes", genesis, vec!["alice".to_string(), "bob".to_string()]).await.unwrap();
    let group_again = store.privacy_group("notes", &group_id).await.unwrap().unwrap();
    assert_eq!(group_again.members.len(), 2);
}
