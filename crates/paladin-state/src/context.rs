//! Domain context: the per-transaction overlay described in spec §4.2.
//!
//! A context tracks unflushed new states ("overlay"), which of those are
//! tracked as in-flight creates ("creating map"), and the locks
//! accumulated against them. Overlay mutations are serialised by a
//! per-context mutex; a flush seals the overlay into a `flushing` slot
//! that drains to the database outside the mutex, but the seal/swap
//! itself happens under it.

use paladin_types::{Hash, LockKind, Nullifier, State, StateLock};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::StateError;

#[derive(Debug, Clone)]
pub struct OverlayEntry {
    pub state: State,
    pub created_by: Option<Uuid>,
    pub nullifier: Option<Nullifier>,
}

#[derive(Debug, Clone)]
pub struct StateUpsert {
    pub state: State,
    pub created_by: Option<Uuid>,
}

/// A snapshot of everything sealed for flush: taken under the context
/// mutex, written to the database outside it.
pub struct FlushSnapshot {
    pub overlay: Vec<OverlayEntry>,
    pub locks: Vec<StateLock>,
}

struct Inner {
    overlay: HashMap<Hash, OverlayEntry>,
    creating: HashSet<Hash>,
    locks: Vec<StateLock>,
    flushing: bool,
}

pub struct DomainContext {
    id: Uuid,
    inner: Mutex<Inner>,
}

impl DomainContext {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            inner: Mutex::new(Inner {
                overlay: HashMap::new(),
                creating: HashSet::new(),
                locks: Vec::new(),
                flushing: false,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Overlay states visible from this context, matching `schema_id` and
    /// (if `require_nullifier`) carrying a nullifier. Only states in the
    /// creating map are "available" per §4.2.
    pub async fn available_overlay_states(
        &self,
        schema_id: &Hash,
        require_nullifier: bool,
    ) -> Vec<(State, Vec<StateLock>)> {
        let inner = self.inner.lock().await;
        inner
            .creating
            .iter()
            .filter_map(|id| inner.overlay.get(id))
            .filter(|entry| &entry.state.schema_id == schema_id)
            .filter(|entry| !require_nullifier || entry.nullifier.is_some())
            .map(|entry| {
                let locks: Vec<StateLock> =
                    inner.locks.iter().filter(|l| l.state_id == entry.state.id).cloned().collect();
                (entry.state.clone(), locks)
            })
            .collect()
    }

    /// Last-write-wins upsert. Returns the ids that entered the creating
    /// map (those with `created_by` set).
    pub async fn upsert_states(&self, upserts: Vec<StateUpsert>) -> Vec<Hash> {
        let mut inner = self.inner.lock().await;
        let mut created = Vec::new();
        for upsert in upserts {
            let id = upsert.state.id;
            let created_by = upsert.created_by;
            inner.overlay.insert(
                id,
                OverlayEntry { state: upsert.state, created_by, nullifier: None },
            );
            if let Some(tx_id) = created_by {
                inner.creating.insert(id);
                inner.locks.push(StateLock { state_id: id, tx_id, kind: LockKind::Create });
                created.push(id);
            }
        }
        created
    }

    pub async fn upsert_nullifiers(&self, nullifiers: Vec<Nullifier>) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        for nullifier in nullifiers {
            if !inner.creating.contains(&nullifier.state_id) {
                return Err(StateError::NotInCreatingMap(nullifier.state_id));
            }
            let entry = inner
                .overlay
                .get_mut(&nullifier.state_id)
                .expect("creating map entry without overlay entry");
            match &entry.nullifier {
                Some(existing) if existing.id != nullifier.id => {
                    return Err(StateError::NullifierConflict(nullifier.state_id));
                }
                _ => entry.nullifier = Some(nullifier),
            }
        }
        Ok(())
    }

    pub async fn add_state_locks(&self, locks: Vec<StateLock>) -> Result<(), StateError> {
        let mut inner = self.inner.lock().await;
        for lock in &locks {
            if lock.kind == LockKind::Create && !inner.creating.contains(&lock.state_id) {
                return Err(StateError::NotInCreatingMap(lock.state_id));
            }
        }
        inner.locks.extend(locks);
        Ok(())
    }

    /// Drops every lock held by `tx_ids`; for dropped create-locks the
    /// overlay and creating-map entries for that state are dropped too.
    pub async fn clear_transactions(&self, tx_ids: &[Uuid]) {
        let mut inner = self.inner.lock().await;
        let dropped_creates: Vec<Hash> = inner
            .locks
            .iter()
            .filter(|l| l.kind == LockKind::Create && tx_ids.contains(&l.tx_id))
            .map(|l| l.state_id)
            .collect();
        inner.locks.retain(|l| !tx_ids.contains(&l.tx_id));
        for id in dropped_creates {
            inner.creating.remove(&id);
            inner.overlay.remove(&id);
        }
    }

    /// Seals `unFlushed` as `flushing`. Fails if a flush is already in
    /// progress. The returned snapshot is drained to the database outside
    /// the context mutex by the caller (`StateStore`).
    pub async fn seal_for_flush(&self) -> Result<FlushSnapshot, StateError> {
        let mut inner = self.inner.lock().await;
        if inner.flushing {
            return Err(StateError::FlushInProgress(self.id));
        }
        inner.flushing = true;
        Ok(FlushSnapshot {
            overlay: inner.overlay.values().cloned().collect(),
            locks: inner.locks.clone(),
        })
    }

    pub async fn complete_flush(&self) {
        let mut inner = self.inner.lock().await;
        inner.flushing = false;
    }

    pub async fn is_flushing(&self) -> bool {
        self.inner.lock().await.flushing
    }

    /// Discards overlay, creating map and locks. Callers must re-drive
    /// the context after a flush failure.
    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.overlay.clear();
        inner.creating.clear();
        inner.locks.clear();
        inner.flushing = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_state(domain: &str) -> State {
        State {
            id: Hash::from_bytes(domain.as_bytes()),
            schema_id: Hash::zero(),
            domain: domain.into(),
            contract_address: "0xabc".into(),
            data: json!({}),
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_with_created_by_enters_creating_map() {
        let ctx = DomainContext::new(Uuid::new_v4());
        let tx_id = Uuid::new_v4();
        let state = test_state("d1");
        let schema_id = state.schema_id;
        ctx.upsert_states(vec![StateUpsert { state, created_by: Some(tx_id) }]).await;
        let available = ctx.available_overlay_states(&schema_id, false).await;
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].1[0].kind, LockKind::Create);
    }

    #[tokio::test]
    async fn upsert_without_created_by_is_not_available() {
        let ctx = DomainContext::new(Uuid::new_v4());
        let state = test_state("d1");
        let schema_id = state.schema_id;
        ctx.upsert_states(vec![StateUpsert { state, created_by: None }]).await;
        let available = ctx.available_overlay_states(&schema_id, false).await;
        assert!(available.is_empty());
    }

    #[tokio::test]
    async fn nullifier_requires_creating_map_membership() {
        let ctx = DomainContext::new(Uuid::new_v4());
        let state_id = Hash::from_bytes(b"orphan");
        let result = ctx
            .upsert_nullifiers(vec![Nullifier { id: Hash::zero(), state_id, domain: "d1".into() }])
            .await;
        assert!(matches!(result, Err(StateError::NotInCreatingMap(_))));
    }

    #[tokio::test]
    async fn clear_transactions_drops_create_overlay() {
        let ctx = DomainContext::new(Uuid::new_v4());
        let tx_id = Uuid::new_v4();
        let state = test_state("d1");
        let schema_id = state.schema_id;
        ctx.upsert_states(vec![StateUpsert { state, created_by: Some(tx_id) }]).await;
        ctx.clear_transactions(&[tx_id]).await;
        let available = ctx.available_overlay_states(&schema_id, false).await;
        assert!(available.is_empty());
    }

    #[tokio::test]
    async fn double_flush_is_rejected() {
        let ctx = DomainContext::new(Uuid::new_v4());
        ctx.seal_for_flush().await.unwrap();
        assert!(matches!(ctx.seal_for_flush().await, Err(StateError::FlushInProgress(_))));
        ctx.complete_flush().await;
        assert!(ctx.seal_for_flush().await.is_ok());
    }
}
