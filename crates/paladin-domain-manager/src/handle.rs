//! `DomainSmartContract`: a handle bound to one (domain, contract
//! address) pair through which C6 invokes the four phases, per §4.3.

use std::sync::Arc;

use paladin_types::{
    AssembledTransaction, AttestationResult, ContextQuery, DomainPlugin, EndorsementVerdict,
    PrepareOutcome, ResolvedVerifier, State, VerifierRequirement,
};
use serde_json::Value;

use crate::errors::DomainManagerError;

pub struct DomainSmartContract {
    plugin: Arc<dyn DomainPlugin>,
    contract_address: String,
}

impl DomainSmartContract {
    pub fn new(plugin: Arc<dyn DomainPlugin>, contract_address: String) -> Self {
        Self { plugin, contract_address }
    }

    pub fn domain_name(&self) -> &str {
        self.plugin.name()
    }

    pub fn init_transaction(
        &self,
        function: &str,
        inputs: &Value,
    ) -> Result<Vec<VerifierRequirement>, DomainManagerError> {
        self.plugin
            .init_transaction(&self.contract_address, function, inputs)
            .map_err(DomainManagerError::Plugin)
    }

    pub fn assemble_transaction(
        &self,
        function: &str,
        inputs: &Value,
        verifiers: &[ResolvedVerifier],
        ctx: &dyn ContextQuery,
    ) -> Result<AssembledTransaction, DomainManagerError> {
        self.plugin
            .assemble_transaction(&self.contract_address, function, inputs, verifiers, ctx)
            .map_err(DomainManagerError::Plugin)
    }

    pub fn endorse_transaction(
        &self,
        assembled: &AssembledTransaction,
        endorser: &str,
    ) -> Result<EndorsementVerdict, DomainManagerError> {
        self.plugin
            .endorse_transaction(&self.contract_address, assembled, endorser)
            .map_err(DomainManagerError::Plugin)
    }

    pub fn prepare_transaction(
        &self,
        assembled: &AssembledTransaction,
        attestations: &[AttestationResult],
    ) -> Result<PrepareOutcome, DomainManagerError> {
        self.plugin
            .prepare_transaction(&self.contract_address, assembled, attestations)
            .map_err(DomainManagerError::Plugin)
    }

    pub fn init_call(
        &self,
        function: &str,
        inputs: &Value,
    ) -> Result<Vec<VerifierRequirement>, DomainManagerError> {
        self.plugin
            .init_call(&self.contract_address, function, inputs)
            .map_err(DomainManagerError::Plugin)
    }

    pub fn exec_call(&self, function: &str, inputs: &Value) -> Result<Value, DomainManagerError> {
        self.plugin
            .exec_call(&self.contract_address, function, inputs)
            .map_err(DomainManagerError::Plugin)
    }

    pub fn build_receipt(
        &self,
        assembled: &AssembledTransaction,
        onchain_location: &str,
    ) -> Result<Value, DomainManagerError> {
        self.plugin
            .build_receipt(assembled, onchain_location)
            .map_err(DomainManagerError::Plugin)
    }

    pub fn validate_state_hashes(&self, states: &mut [State]) -> Result<(), DomainManagerError> {
        self.plugin.validate_state_hashes(states).map_err(DomainManagerError::Plugin)
    }
}
