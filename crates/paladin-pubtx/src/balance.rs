//! Balance manager: gates admission of a new in-flight transaction by
//! expected cost versus available-to-spend (§4.5).

use tokio::sync::Mutex;

use crate::errors::PubTxError;

pub struct BalanceManager {
    confirmed_balance: Mutex<u128>,
    reserved: Mutex<u128>,
}

impl BalanceManager {
    pub fn new(confirmed_balance: u128) -> Self {
        Self { confirmed_balance: Mutex::new(confirmed_balance), reserved: Mutex::new(0) }
    }

    pub async fn available_to_spend(&self) -> u128 {
        let balance = *self.confirmed_balance.lock().await;
        let reserved = *self.reserved.lock().await;
        balance.saturating_sub(reserved)
    }

    /// Reserves `cost` against the available balance, or fails if it
    /// would overdraw.
    pub async fn reserve(&self, cost: u128) -> Result<(), PubTxError> {
        let balance = *self.confirmed_balance.lock().await;
        let mut reserved = self.reserved.lock().await;
        let available = balance.saturating_sub(*reserved);
        if cost > available {
            return Err(PubTxError::InsufficientBalance { required: cost, available });
        }
        *reserved += cost;
        Ok(())
    }

    pub async fn release(&self, cost: u128) {
        let mut reserved = self.reserved.lock().await;
        *reserved = reserved.saturating_sub(cost);
    }

    pub async fn set_confirmed_balance(&self, balance: u128) {
        *self.confirmed_balance.lock().await = balance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reserve_rejects_overdraw() {
        let mgr = BalanceManager::new(100);
        mgr.reserve(80).await.unwrap();
        assert!(matches!(mgr.reserve(30).await, Err(PubTxError::InsufficientBalance { .. })));
    }

    #[tokio::test]
    async fn release_frees_capacity() {
        let mgr = BalanceManager::new(100);
        mgr.reserve(80).await.unwrap();
        mgr.release(80).await;
        assert_eq!(mgr.available_to_spend().await, 100);
    }
}
