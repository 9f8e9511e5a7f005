//! Schema cache.
//!
//! Schemas are immutable once registered (their id is a content hash of
//! `domain:declaration`), so unlike an account-balance cache there is no
//! reorg or invalidation concern — a plain capacity-bounded LRU suffices.

use lru::LruCache;
use paladin_types::{Hash, Schema};
use std::num::NonZeroUsize;
use std::sync::Mutex;

const DEFAULT_CAPACITY: usize = 4096;

pub struct SchemaCache {
    inner: Mutex<LruCache<Hash, Schema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self { inner: Mutex::new(LruCache::new(cap)) }
    }

    pub fn get(&self, id: &Hash) -> Option<Schema> {
        self.inner.lock().unwrap().get(id).cloned()
    }

    pub fn put(&self, schema: Schema) {
        self.inner.lock().unwrap().put(schema.id, schema);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_schema() -> Schema {
        Schema::new("test-domain".into(), json!({"type": "object"}), vec![])
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = SchemaCache::new();
        let schema = test_schema();
        cache.put(schema.clone());
        let got = cache.get(&schema.id).expect("schema present");
        assert_eq!(got.domain, schema.domain);
    }

    #[test]
    fn miss_on_unknown_id() {
        let cache = SchemaCache::new();
        assert!(cache.get(&Hash::zero()).is_none());
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let cache = SchemaCache::with_capacity(1);
        let a = Schema::new("a".into(), json!({}), vec![]);
        let b = Schema::new("b".into(), json!({}), vec![]);
        cache.put(a.clone());
        cache.put(b.clone());
        assert!(cache.get(&a.id).is_none());
        assert!(cache.get(&b.id).is_some());
    }
}
