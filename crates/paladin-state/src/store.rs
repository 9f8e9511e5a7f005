//! State store (C2): durable schema/state storage fronted by per-transaction
//! domain contexts, per spec §4.2.

use std::collections::HashMap;
use std::sync::Arc;

use paladin_persistence::Gateway;
use paladin_types::{Hash, LockKind, Nullifier, PrivacyGroup, Schema, State, StateLock};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::SchemaCache;
use crate::context::{DomainContext, StateUpsert};
use crate::errors::StateError;

/// Query against a scoped schema, mirroring `paladin_types::StateQuery`
/// but expressed for the durable backend: domain/contract-address scope
/// plus an already-parsed sort/limit.
pub struct ScopedQuery {
    pub schema_id: Hash,
    pub domain: String,
    pub contract_address: String,
    pub limit: Option<usize>,
}

pub struct StateStore {
    gateway: Gateway,
    schemas: SchemaCache,
    contexts: RwLock<HashMap<Uuid, Arc<DomainContext>>>,
}

impl StateStore {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway, schemas: SchemaCache::new(), contexts: RwLock::new(HashMap::new()) }
    }

    pub async fn register_schema(&self, schema: Schema) -> Result<(), StateError> {
        self.gateway
            .transaction(|tx| {
                let schema = schema.clone();
                async move {
                    sqlx::query(
                        "INSERT INTO schemas (id, domain, declaration, labels) VALUES ($1, $2, $3, $4)
                         ON CONFLICT (id) DO NOTHING",
                    )
                    .bind(schema.id.as_bytes().to_vec())
                    .bind(&schema.domain)
                    .bind(&schema.declaration)
                    .bind(serde_json::to_value(&schema.labels).unwrap())
                    .execute(tx.conn().as_mut())
                    .await?;
                    Ok(())
                }
            })
            .await?;
        self.schemas.put(schema);
        Ok(())
    }

    pub async fn get_schema(&self, id: &Hash) -> Result<Schema, StateError> {
        if let Some(schema) = self.schemas.get(id) {
            return Ok(schema);
        }
        let row: Option<(Vec<u8>, String, serde_json::Value, serde_json::Value)> =
            sqlx::query_as("SELECT id, domain, declaration, labels FROM schemas WHERE id = $1")
                .bind(id.as_bytes().to_vec())
                .fetch_optional(self.gateway.pool())
                .await
                .map_err(paladin_persistence::PersistenceError::from)?;
        let (_, domain, declaration, labels) =
            row.ok_or_else(|| StateError::SchemaNotFound(id.to_string()))?;
        let labels = serde_json::from_value(labels).unwrap_or_default();
        let schema = Schema { id: *id, domain, declaration, labels };
        self.schemas.put(schema.clone());
        Ok(schema)
    }

    pub async fn open_context(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.contexts.write().await.insert(id, Arc::new(DomainContext::new(id)));
        id
    }

    async fn context(&self, id: Uuid) -> Result<Arc<DomainContext>, StateError> {
        self.contexts.read().await.get(&id).cloned().ok_or(StateError::ContextClosed(id))
    }

    /// *FindAvailableStates* per §4.2: durable states excluding spent/
    /// spend-locked ids, merged with overlay states in the creating map,
    /// de-duplicated by state id and truncated to `query.limit`.
    pub async fn find_available_states(
        &self,
        ctx_id: Uuid,
        query: &ScopedQuery,
    ) -> Result<Vec<(State, Vec<StateLock>)>, StateError> {
        self.find_available(ctx_id, query, false).await
    }

    pub async fn find_available_nullifiers(
        &self,
        ctx_id: Uuid,
        query: &ScopedQuery,
    ) -> Result<Vec<(State, Vec<StateLock>)>, StateError> {
        self.find_available(ctx_id, query, true).await
    }

    async fn find_available(
        &self,
        ctx_id: Uuid,
        query: &ScopedQuery,
        require_nullifier: bool,
    ) -> Result<Vec<(State, Vec<StateLock>)>, StateError> {
        let ctx = self.context(ctx_id).await?;

        let durable_ids: Vec<(Vec<u8>,)> = if require_nullifier {
            sqlx::query_as(
                "SELECT s.id FROM states s
                 JOIN state_nullifiers n ON n.state_id = s.id
                 WHERE s.schema_id = $1 AND s.domain = $2 AND s.contract_address = $3
                   AND s.id NOT IN (SELECT state_id FROM state_spends)",
            )
            .bind(query.schema_id.as_bytes().to_vec())
            .bind(&query.domain)
            .bind(&query.contract_address)
            .fetch_all(self.gateway.pool())
            .await
            .map_err(paladin_persistence::PersistenceError::from)?
        } else {
            sqlx::query_as(
                "SELECT id FROM states
                 WHERE schema_id = $1 AND domain = $2 AND contract_address = $3
                   AND id NOT IN (SELECT state_id FROM state_spends)",
            )
            .bind(query.schema_id.as_bytes().to_vec())
            .bind(&query.domain)
            .bind(&query.contract_address)
            .fetch_all(self.gateway.pool())
            .await
            .map_err(paladin_persistence::PersistenceError::from)?
        };

        let mut results = Vec::new();
        for (raw_id,) in durable_ids {
            let id: [u8; 32] = raw_id.try_into().map_err(|_| {
                StateError::StateNotFound("malformed state id in storage".into())
            })?;
            let id = Hash(id);
            if let Some(state) = self.load_state(&id).await? {
                results.push((state, Vec::new()));
            }
        }

        let overlay = ctx.available_overlay_states(&query.schema_id, require_nullifier).await;
        let mut seen: std::collections::HashSet<Hash> =
            results.iter().map(|(s, _)| s.id).collect();
        for (state, locks) in overlay {
            if seen.insert(state.id) {
                results.push((state, locks));
            }
        }

        if let Some(limit) = query.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn load_state(&self, id: &Hash) -> Result<Option<State>, StateError> {
        let row: Option<(Vec<u8>, Vec<u8>, String, String, serde_json::Value, chrono::DateTime<chrono::Utc>)> =
            sqlx::query_as(
                "SELECT id, schema_id, domain, contract_address, data, created_at FROM states WHERE id = $1",
            )
            .bind(id.as_bytes().to_vec())
            .fetch_optional(self.gateway.pool())
            .await
            .map_err(paladin_persistence::PersistenceError::from)?;
        Ok(row.map(|(id, schema_id, domain, contract_address, data, created_at)| State {
            id: Hash(id.try_into().unwrap_or([0; 32])),
            schema_id: Hash(schema_id.try_into().unwrap_or([0; 32])),
            domain,
            contract_address,
            data,
            created_at,
        }))
    }

    pub async fn upsert_states(&self, ctx_id: Uuid, upserts: Vec<StateUpsert>) -> Result<Vec<Hash>, StateError> {
        let ctx = self.context(ctx_id).await?;
        Ok(ctx.upsert_states(upserts).await)
    }

    pub async fn upsert_nullifiers(&self, ctx_id: Uuid, nullifiers: Vec<Nullifier>) -> Result<(), StateError> {
        let ctx = self.context(ctx_id).await?;
        ctx.upsert_nullifiers(nullifiers).await
    }

    pub async fn add_state_locks(&self, ctx_id: Uuid, locks: Vec<StateLock>) -> Result<(), StateError> {
        let ctx = self.context(ctx_id).await?;
        ctx.add_state_locks(locks).await
    }

    pub async fn clear_transactions(&self, ctx_id: Uuid, tx_ids: &[Uuid]) -> Result<(), StateError> {
        let ctx = self.context(ctx_id).await?;
        ctx.clear_transactions(tx_ids).await;
        Ok(())
    }

    /// *InitiateFlush* per §4.2: seals the overlay, writes it durably in a
    /// background task, then invokes `callback` with the outcome. At most
    /// one flush per context may be in progress.
    pub async fn initiate_flush<F>(&self, ctx_id: Uuid, callback: F) -> Result<(), StateError>
    where
        F: FnOnce(Result<(), StateError>) + Send + 'static,
    {
        let ctx = self.context(ctx_id).await?;
        let snapshot = ctx.seal_for_flush().await?;
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            let result = gateway
                .transaction(|tx| {
                    let overlay = snapshot.overlay.clone();
                    let locks = snapshot.locks.clone();
                    async move {
                        for entry in &overlay {
                            sqlx::query(
                                "INSERT INTO states (id, schema_id, domain, contract_address, data, created_at)
                                 VALUES ($1, $2, $3, $4, $5, $6)
                                 ON CONFLICT (id) DO NOTHING",
                            )
                            .bind(entry.state.id.as_bytes().to_vec())
                            .bind(entry.state.schema_id.as_bytes().to_vec())
                            .bind(&entry.state.domain)
                            .bind(&entry.state.contract_address)
                            .bind(&entry.state.data)
                            .bind(entry.state.created_at)
                            .execute(tx.conn().as_mut())
                            .await?;

                            if let Some(nullifier) = &entry.nullifier {
                                sqlx::query(
                                    "INSERT INTO state_nullifiers (id, state_id, domain) VALUES ($1, $2, $3)
                                     ON CONFLICT (id) DO NOTHING",
                                )
                                .bind(nullifier.id.as_bytes().to_vec())
                                .bind(nullifier.state_id.as_bytes().to_vec())
                                .bind(&nullifier.domain)
                                .execute(tx.conn().as_mut())
                                .await?;
                            }
                        }
                        for lock in &locks {
                            if lock.kind == LockKind::Spend {
                                sqlx::query(
                                    "INSERT INTO state_spends (state_id, tx_id) VALUES ($1, $2)
                                     ON CONFLICT DO NOTHING",
                                )
                                .bind(lock.state_id.as_bytes().to_vec())
                                .bind(lock.tx_id)
                                .execute(tx.conn().as_mut())
                                .await?;
                            }
                        }
                        Ok::<(), paladin_persistence::PersistenceError>(())
                    }
                })
                .await
                .map_err(StateError::from);

            if result.is_ok() {
                debug!(context_id = %ctx.id(), "flush committed");
            } else {
                warn!(context_id = %ctx.id(), error = ?result, "flush failed");
            }
            ctx.complete_flush().await;
            callback(result);
        });
        Ok(())
    }

    pub async fn reset(&self, ctx_id: Uuid) -> Result<(), StateError> {
        let ctx = self.context(ctx_id).await?;
        ctx.reset().await;
        Ok(())
    }

    /// *Close* per §4.2: removes the context from the registry.
    /// Subsequent operations on `ctx_id` fail with `ContextClosed`.
    pub async fn close(&self, ctx_id: Uuid) {
        self.contexts.write().await.remove(&ctx_id);
    }

    /// Supplemented (§4.7): creates a privacy group keyed by its genesis
    /// state's id, durably writing the genesis state alongside the
    /// group's membership list in one transaction.
    pub async fn create_privacy_group(
        &self,
        domain: &str,
        mut genesis_state: State,
        members: Vec<String>,
    ) -> Result<Hash, StateError> {
        genesis_state.domain = domain.to_string();
        let group_id = genesis_state.id;
        self.gateway
            .transaction(|tx| {
                let domain = domain.to_string();
                let genesis_state = genesis_state.clone();
                let members = members.clone();
                async move {
                    sqlx::query(
                        "INSERT INTO states (id, schema_id, domain, contract_address, data, created_at)
                         VALUES ($1, $2, $3, $4, $5, $6)
                         ON CONFLICT (id) DO NOTHING",
                    )
                    .bind(genesis_state.id.as_bytes().to_vec())
                    .bind(genesis_state.schema_id.as_bytes().to_vec())
                    .bind(&genesis_state.domain)
                    .bind(&genesis_state.contract_address)
                    .bind(&genesis_state.data)
                    .bind(genesis_state.created_at)
                    .execute(tx.conn().as_mut())
                    .await?;

                    sqlx::query("INSERT INTO privacy_groups (domain, id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                        .bind(&domain)
                        .bind(genesis_state.id.as_bytes().to_vec())
                        .execute(tx.conn().as_mut())
                        .await?;

                    for member in &members {
                        sqlx::query(
                            "INSERT INTO privacy_group_members (domain, group_id, member) VALUES ($1, $2, $3)
                             ON CONFLICT DO NOTHING",
                        )
                        .bind(&domain)
                        .bind(genesis_state.id.as_bytes().to_vec())
                        .bind(member)
                        .execute(tx.conn().as_mut())
                        .await?;
                    }
                    Ok(())
                }
            })
            .await?;
        Ok(group_id)
    }

    /// Supplemented (§4.7): membership lookup for a privacy group, used by
    /// the private-transaction coordinator to resolve attestation parties.
    pub async fn privacy_group(&self, domain: &str, id: &Hash) -> Result<Option<PrivacyGroup>, StateError> {
        let members: Vec<(String,)> =
            sqlx::query_as("SELECT member FROM privacy_group_members WHERE domain = $1 AND group_id = $2")
                .bind(domain)
                .bind(id.as_bytes().to_vec())
                .fetch_all(self.gateway.pool())
                .await
                .map_err(paladin_persistence::PersistenceError::from)?;
        if members.is_empty() {
            return Ok(None);
        }
        Ok(Some(PrivacyGroup {
            domain: domain.to_string(),
            id: *id,
            members: members.into_iter().map(|(m,)| m).collect(),
        }))
    }
}
