//! Single-flight smart-contract cache keyed by ledger address (§4.3).
//!
//! Concurrent first-lookups for the same address coordinate on a shared
//! `Notify`: the first caller becomes the "loader" and populates the
//! entry; everyone else waits for the notification and then re-reads the
//! now-populated entry.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, Notify};

use crate::errors::DomainManagerError;

#[derive(Clone)]
pub struct SmartContractRecord {
    pub domain: String,
    pub contract_address: String,
    pub config: Value,
}

enum Slot {
    Loading(Arc<Notify>),
    Ready(Arc<SmartContractRecord>),
}

pub struct ContractCache {
    slots: Mutex<HashMap<String, Slot>>,
}

impl ContractCache {
    pub fn new() -> Self {
        Self { slots: Mutex::new(HashMap::new()) }
    }

    /// Returns the cached record for `contract_address` if present,
    /// without triggering a load. Used for domain-resolution checks
    /// that must not block on a first-sight registration.
    pub async fn peek(&self, contract_address: &str) -> Option<Arc<SmartContractRecord>> {
        match self.slots.lock().await.get(contract_address) {
            Some(Slot::Ready(record)) => Some(record.clone()),
            _ => None,
        }
    }

    /// Returns the cached record for `contract_address`, invoking `load`
    /// exactly once across all concurrent callers if it is not yet
    /// cached.
    pub async fn get_or_load<F>(
        &self,
        contract_address: &str,
        load: F,
    ) -> Result<Arc<SmartContractRecord>, DomainManagerError>
    where
        F: FnOnce() -> Result<SmartContractRecord, DomainManagerError>,
    {
        loop {
            enum Action {
                Ready(Arc<SmartContractRecord>),
                Wait(Arc<Notify>),
                Load,
            }

            let action = {
                let mut slots = self.slots.lock().await;
                match slots.get(contract_address) {
                    Some(Slot::Ready(record)) => Action::Ready(record.clone()),
                    Some(Slot::Loading(notify)) => Action::Wait(notify.clone()),
                    None => {
                        slots.insert(
                            contract_address.to_string(),
                            Slot::Loading(Arc::new(Notify::new())),
                        );
                        Action::Load
                    }
                }
            };

            match action {
                Action::Ready(record) => return Ok(record),
                Action::Wait(notify) => notify.notified().await,
                Action::Load => match load() {
                    Ok(record) => {
                        let record = Arc::new(record);
                        let mut slots = self.slots.lock().await;
                        if let Some(Slot::Loading(notify)) =
                            slots.insert(contract_address.to_string(), Slot::Ready(record.clone()))
                        {
                            notify.notify_waiters();
                        }
                        return Ok(record);
                    }
                    Err(e) => {
                        let mut slots = self.slots.lock().await;
                        if let Some(Slot::Loading(notify)) = slots.remove(contract_address) {
                            notify.notify_waiters();
                        }
                        return Err(e);
                    }
                },
            }
        }
    }
}

impl Default for ContractCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn loads_exactly_once_under_concurrency() {
        let cache = Arc::new(ContractCache::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load("0xabc", || {
                        loads.fetch_add(1, Ordering::SeqCst);
                        Ok(SmartContractRecord {
                            domain: "d1".into(),
                            contract_address: "0xabc".into(),
                            config: serde_json::json!({}),
                        })
                    })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn peek_misses_without_triggering_a_load() {
        let cache = ContractCache::new();
        assert!(cache.peek("0xnever-loaded").await.is_none());
    }

    #[tokio::test]
    async fn peek_hits_once_loaded() {
        let cache = ContractCache::new();
        cache
            .get_or_load("0xabc", || {
                Ok(SmartContractRecord { domain: "d1".into(), contract_address: "0xabc".into(), config: serde_json::json!({}) })
            })
            .await
            .unwrap();
        assert_eq!(cache.peek("0xabc").await.unwrap().domain, "d1");
    }

    #[tokio::test]
    async fn a_failed_load_does_not_deadlock_later_callers() {
        let cache = ContractCache::new();

        let err = cache
            .get_or_load("0xabc", || Err(DomainManagerError::Plugin("boom".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainManagerError::Plugin(_)));

        // A later call for the same address must retry the load rather
        // than wait forever on a `Notify` that already fired, or never
        // fires, from the failed attempt.
        let record = cache
            .get_or_load("0xabc", || {
                Ok(SmartContractRecord { domain: "d1".into(), contract_address: "0xabc".into(), config: serde_json::json!({}) })
            })
            .await
            .unwrap();
        assert_eq!(record.domain, "d1");
    }

    #[tokio::test]
    async fn concurrent_waiters_are_released_when_the_load_fails() {
        let cache = Arc::new(ContractCache::new());

        let waiter_cache = cache.clone();
        let waiter = tokio::spawn(async move {
            waiter_cache
                .get_or_load("0xabc", || {
                    Ok(SmartContractRecord { domain: "waiter".into(), contract_address: "0xabc".into(), config: serde_json::json!({}) })
                })
                .await
        });

        // Give the waiter a chance to observe `Slot::Loading` before the
        // loader below fails.
        tokio::task::yield_now().await;

        let _ = cache.get_or_load("0xabc", || Err(DomainManagerError::Plugin("boom".into()))).await;

        // Whichever path the waiter took (retried load or failed), it
        // must complete rather than hang on a notification that never
        // arrives.
        waiter.await.unwrap().unwrap();
    }
}
