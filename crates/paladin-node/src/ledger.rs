//! In-memory base-ledger client fake (§6): wiring-only stand-in for a
//! real base ledger. `submit` accepts immediately and returns a
//! synthetic location; there is no consensus, block time, or rejection
//! model here, since consensus among base-ledger validators is an
//! explicit Non-goal. Real deployments substitute a client for an
//! actual chain.

use std::collections::HashMap;
use std::sync::Mutex;

use paladin_types::{BaseLedgerClient, PreparedPublicCall};
use uuid::Uuid;

struct Account {
    balance: u128,
    nonce: u64,
}

/// A fake base ledger: every address starts with a configurable balance
/// and nonce zero, and every submission immediately "lands".
pub struct InMemoryLedger {
    default_balance: u128,
    accounts: Mutex<HashMap<String, Account>>,
}

impl InMemoryLedger {
    pub fn new(default_balance: u128) -> Self {
        Self { default_balance, accounts: Mutex::new(HashMap::new()) }
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(u128::MAX / 2)
    }
}

impl BaseLedgerClient for InMemoryLedger {
    fn submit(&self, from: &str, nonce: u64, _gas_price: u128, call: &PreparedPublicCall) -> Result<String, String> {
        let mut accounts = self.accounts.lock().unwrap();
        let account = accounts.entry(from.to_string()).or_insert_with(|| Account { balance: self.default_balance, nonce: 0 });
        if nonce < account.nonce {
            return Err(format!("nonce {nonce} already mined for {from}"));
        }
        account.nonce = nonce + 1;
        Ok(format!("0x{}:{}", Uuid::new_v4().simple(), call.function))
    }

    fn get_balance(&self, address: &str) -> Result<u128, String> {
        Ok(self.accounts.lock().unwrap().get(address).map(|a| a.balance).unwrap_or(self.default_balance))
    }

    fn get_confirmed_nonce(&self, address: &str) -> Result<u64, String> {
        Ok(self.accounts.lock().unwrap().get(address).map(|a| a.nonce).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_address_gets_the_default_balance() {
        let ledger = InMemoryLedger::new(1_000);
        assert_eq!(ledger.get_balance("0xabc").unwrap(), 1_000);
        assert_eq!(ledger.get_confirmed_nonce("0xabc").unwrap(), 0);
    }

    #[test]
    fn submit_advances_the_nonce() {
        let ledger = InMemoryLedger::new(1_000);
        let call = PreparedPublicCall {
            function: "transfer".to_string(),
            abi_reference: paladin_types::Hash::zero(),
            params: serde_json::json!({}),
            required_signer: "0xabc".to_string(),
        };
        ledger.submit("0xabc", 0, 1, &call).unwrap();
        assert_eq!(ledger.get_confirmed_nonce("0xabc").unwrap(), 1);
        assert!(ledger.submit("0xabc", 0, 1, &call).is_err());
    }
}
