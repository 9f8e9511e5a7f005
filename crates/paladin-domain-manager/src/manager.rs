use std::collections::HashMap;
use std::sync::Arc;

use paladin_types::DomainPlugin;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::cache::{ContractCache, SmartContractRecord};
use crate::errors::DomainManagerError;
use crate::handle::DomainSmartContract;

/// Loaded domains (by name) and a single-flight cache of smart-contract
/// records keyed by ledger address, per §4.3.
pub struct DomainManager {
    domains: RwLock<HashMap<String, Arc<dyn DomainPlugin>>>,
    contracts: ContractCache,
}

impl DomainManager {
    pub fn new() -> Self {
        Self { domains: RwLock::new(HashMap::new()), contracts: ContractCache::new() }
    }

    pub async fn register_domain(&self, plugin: Arc<dyn DomainPlugin>) {
        let name = plugin.name().to_string();
        info!(domain = %name, "domain registered");
        self.domains.write().await.insert(name, plugin);
    }

    /// Domain resolution for §4.6: the domain already backing a
    /// registered contract, if any. Never triggers a load.
    pub async fn domain_of(&self, contract_address: &str) -> Option<String> {
        self.contracts.peek(contract_address).await.map(|record| record.domain.clone())
    }

    pub async fn domain(&self, name: &str) -> Result<Arc<dyn DomainPlugin>, DomainManagerError> {
        self.domains
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DomainManagerError::DomainNotLoaded(name.to_string()))
    }

    /// On first sight of `contract_address` (via a registration event),
    /// asks `domain` to parse `config` and caches the record; concurrent
    /// first-lookups coordinate on the cache's single-flight loader.
    pub async fn smart_contract(
        &self,
        domain: &str,
        contract_address: &str,
        config: &[u8],
    ) -> Result<DomainSmartContract, DomainManagerError> {
        let plugin = self.domain(domain).await?;
        let plugin_for_load = plugin.clone();
        let domain_owned = domain.to_string();
        let contract_address_owned = contract_address.to_string();
        let config_owned = config.to_vec();
        let record = self
            .contracts
            .get_or_load(contract_address, move || {
                let parsed: Value = plugin_for_load
                    .init_contract(&contract_address_owned, &config_owned)
                    .map_err(DomainManagerError::Plugin)?;
                Ok(SmartContractRecord {
                    domain: domain_owned,
                    contract_address: contract_address_owned.clone(),
                    config: parsed,
                })
            })
            .await?;
        let _ = record;
        Ok(DomainSmartContract::new(plugin, contract_address.to_string()))
    }
}

impl Default for DomainManager {
    fn default() -> Self {
        Self::new()
    }
}
