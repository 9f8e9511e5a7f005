//! Per-contract sequencer (§4.6, §5): one assembly runs at a time for
//! a given (domain, contract) slot; different contracts proceed fully
//! in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct ContractSequencer {
    slots: Mutex<HashMap<(String, String), Arc<Mutex<()>>>>,
}

impl ContractSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, domain: &str, contract_address: &str) -> Arc<Mutex<()>> {
        let key = (domain.to_string(), contract_address.to_string());
        let mut slots = self.slots.lock().await;
        slots.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Acquires the slot for `(domain, contract_address)`, blocking
    /// until any other assembly against the same contract has released
    /// it. The returned guard serialises assembly for the caller's
    /// lifetime.
    pub async fn acquire(&self, domain: &str, contract_address: &str) -> OwnedMutexGuard<()> {
        let slot = self.slot(domain, contract_address).await;
        slot.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc as StdArc;
    use tokio::sync::Mutex as TokioMutex;

    #[tokio::test]
    async fn same_slot_serialises_concurrent_assemblies() {
        let sequencer = StdArc::new(ContractSequencer::new());
        let order = StdArc::new(TokioMutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..5 {
            let sequencer = sequencer.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _guard = sequencer.acquire("domain-a", "0xabc").await;
                order.lock().await.push(i);
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(order.lock().await.len(), 5);
    }

    #[tokio::test]
    async fn different_contracts_do_not_share_a_slot() {
        let sequencer = ContractSequencer::new();
        let guard_a = sequencer.acquire("domain-a", "0x1").await;
        let guard_b = sequencer.acquire("domain-a", "0x2").await;
        drop(guard_a);
        drop(guard_b);
    }
}
