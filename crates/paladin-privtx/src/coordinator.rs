//! Private transaction coordinator (§4.6): resolves the target domain,
//! serialises assembly per `(domain, contract)`, drives the domain
//! plugin's four phases, gathers attestations, and hands a prepared
//! public call to C5.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use paladin_domain_manager::DomainManager;
use paladin_keys::NodeSigner;
use paladin_persistence::Gateway;
use paladin_state::{StateStore, StateUpsert};
use paladin_transport::TransportManager;
use paladin_types::{
    AssembledTransaction, CanonicalJson, Hash, LockKind, PrepareOutcome, PreparedPublicCall,
    ResolvedVerifier, Signer, StateLock, TxType, VerifierRequirement,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::attestation::{gather_attestations, PendingAttestations};
use crate::context_query::StoreContextQuery;
use crate::dispatch::PublicTxGateway;
use crate::errors::PrivTxError;
use crate::sequencer::ContractSequencer;

/// A transaction submission as received from the submission API,
/// covering both public and private `tx_type`s (§4.6).
#[derive(Debug, Clone)]
pub struct SubmitTx {
    pub tx_type: TxType,
    pub from: String,
    pub to: Option<String>,
    pub domain: Option<String>,
    pub is_deploy: bool,
    pub function: String,
    pub abi_reference: Hash,
    pub inputs: CanonicalJson,
    pub idempotency_key: Option<String>,
    pub depends_on: Vec<Uuid>,
    pub expected_cost: u128,
    pub initial_gas_price: u128,
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub tx_id: Uuid,
    pub idempotent_duplicate: bool,
}

/// Update path (§4.6): restricted to public transactions, re-resolves
/// function/ABI and forwards to C5 under the same DB transaction.
#[derive(Debug, Clone)]
pub struct UpdateTx {
    pub function: String,
    pub abi_reference: Hash,
    pub inputs: CanonicalJson,
    pub expected_cost: u128,
    pub initial_gas_price: u128,
}

struct PendingAssembly {
    ctx_id: Uuid,
    domain: String,
    contract_address: String,
    assembled: AssembledTransaction,
}

pub struct PrivateTxCoordinator {
    node_id: String,
    gateway: Gateway,
    store: Arc<StateStore>,
    domains: Arc<DomainManager>,
    signer: Arc<NodeSigner>,
    transport: Arc<TransportManager>,
    pubtx: Arc<dyn PublicTxGateway>,
    sequencer: ContractSequencer,
    pending_attestations: Arc<PendingAttestations>,
    in_flight: Mutex<HashMap<Uuid, PendingAssembly>>,
    by_public_tx: Mutex<HashMap<Uuid, Uuid>>,
    endorsement_timeout: Duration,
}

impl PrivateTxCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_id: String,
        gateway: Gateway,
        store: Arc<StateStore>,
        domains: Arc<DomainManager>,
        signer: Arc<NodeSigner>,
        transport: Arc<TransportManager>,
        pubtx: Arc<dyn PublicTxGateway>,
        endorsement_timeout: Duration,
    ) -> Self {
        Self {
            node_id,
            gateway,
            store,
            domains,
            signer,
            transport,
            pubtx,
            sequencer: ContractSequencer::new(),
            pending_attestations: Arc::new(PendingAttestations::new()),
            in_flight: Mutex::new(HashMap::new()),
            by_public_tx: Mutex::new(HashMap::new()),
            endorsement_timeout,
        }
    }

    pub fn pending_attestations(&self) -> Arc<PendingAttestations> {
        self.pending_attestations.clone()
    }

    /// Looks up the assembly in flight for `tx_id`, used to answer
    /// remote endorsement requests against a transaction this node is
    /// still assembling.
    pub async fn assembled_for(&self, tx_id: Uuid) -> Option<AssembledTransaction> {
        self.in_flight.lock().await.get(&tx_id).map(|p| p.assembled.clone())
    }

    /// The `(domain, contract_address)` this node is assembling `tx_id`
    /// against, if any. Lets a transport dispatcher resolve the right
    /// `DomainSmartContract` handle before answering an inbound
    /// endorsement request for it.
    pub async fn pending_domain_contract(&self, tx_id: Uuid) -> Option<(String, String)> {
        self.in_flight.lock().await.get(&tx_id).map(|p| (p.domain.clone(), p.contract_address.clone()))
    }

    pub async fn submit(&self, req: SubmitTx) -> Result<SubmitOutcome, PrivTxError> {
        match req.tx_type {
            TxType::Public => self.submit_public(req).await,
            TxType::Private => self.submit_private(req).await,
        }
    }

    async fn submit_public(&self, req: SubmitTx) -> Result<SubmitOutcome, PrivTxError> {
        let tx_id = Uuid::new_v4();
        let public_tx_id = Uuid::new_v4();
        let conflict = Arc::new(StdMutex::new(None::<Uuid>));

        let result = self
            .gateway
            .transaction(|tx| {
                let req = req.clone();
                let pool = self.gateway.pool().clone();
                let conflict = conflict.clone();
                async move {
                    let written = insert_transaction_row(tx, tx_id, TxType::Public, &req).await?;
                    if !written {
                        let key = req.idempotency_key.clone();
                        tx.on_rollback(move || {
                            let resolved = tokio::task::block_in_place(|| {
                                tokio::runtime::Handle::current()
                                    .block_on(lookup_by_idempotency_key(&pool, key.as_deref()))
                            });
                            *conflict.lock().unwrap() = resolved;
                        });
                        return Err(paladin_persistence::PersistenceError::Conflict(
                            req.idempotency_key.clone().unwrap_or_default(),
                        ));
                    }
                    for dep in &req.depends_on {
                        sqlx::query("INSERT INTO transaction_deps (tx_id, depends_on_id) VALUES ($1, $2)")
                            .bind(tx_id)
                            .bind(dep)
                            .execute(tx.conn().as_mut())
                            .await?;
                    }
                    sqlx::query(
                        "INSERT INTO public_txns (id, signer, nonce, gas_price, stage) VALUES ($1, $2, NULL, NULL, 'Received')",
                    )
                    .bind(public_tx_id)
                    .bind(&req.from)
                    .execute(tx.conn().as_mut())
                    .await?;
                    sqlx::query("INSERT INTO public_tx_submissions (tx_id, public_tx_id) VALUES ($1, $2)")
                        .bind(tx_id)
                        .bind(public_tx_id)
                        .execute(tx.conn().as_mut())
                        .await?;
                    Ok(())
                }
            })
            .await;

        match result {
            Ok(()) => {
                self.notify_public_submission(public_tx_id, &req).await;
                Ok(SubmitOutcome { tx_id, idempotent_duplicate: false })
            }
            Err(paladin_persistence::PersistenceError::Conflict(_)) => {
                let existing = conflict.lock().unwrap().take().ok_or(PrivTxError::PublicSubmission(
                    "idempotency conflict reported but no existing row found".into(),
                ))?;
                Ok(SubmitOutcome { tx_id: existing, idempotent_duplicate: true })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn notify_public_submission(&self, public_tx_id: Uuid, req: &SubmitTx) {
        let call = PreparedPublicCall {
            function: req.function.clone(),
            abi_reference: req.abi_reference,
            params: req.inputs.as_value().clone(),
            required_signer: req.from.clone(),
        };
        let pubtx = self.pubtx.clone();
        let expected_cost = req.expected_cost;
        let initial_gas_price = req.initial_gas_price;
        tokio::spawn(async move {
            if let Err(err) = pubtx.submit_public(public_tx_id, &call, expected_cost, initial_gas_price).await {
                warn!(%public_tx_id, %err, "public submission notification failed");
            }
        });
    }

    pub async fn update_public(&self, tx_id: Uuid, update: UpdateTx) -> Result<(), PrivTxError> {
        let existing = crate::reads::get_transaction(&self.gateway, tx_id).await?;
        if existing.tx_type != TxType::Public {
            return Err(PrivTxError::UpdateNotPublic);
        }
        let public_tx_id: (Uuid,) = sqlx::query_as("SELECT public_tx_id FROM public_tx_submissions WHERE tx_id = $1")
            .bind(tx_id)
            .fetch_one(self.gateway.pool())
            .await
            .map_err(paladin_persistence::PersistenceError::from)?;

        self.gateway
            .transaction(|tx| {
                let update = update.clone();
                async move {
                    sqlx::query(
                        "UPDATE transactions SET function = $1, abi_reference = $2, inputs = $3 WHERE id = $4",
                    )
                    .bind(&update.function)
                    .bind(update.abi_reference.as_bytes().to_vec())
                    .bind(update.inputs.as_value())
                    .bind(tx_id)
                    .execute(tx.conn().as_mut())
                    .await?;
                    Ok(())
                }
            })
            .await?;

        let call = PreparedPublicCall {
            function: update.function,
            abi_reference: update.abi_reference,
            params: update.inputs.into_value(),
            required_signer: existing.from,
        };
        self.pubtx
            .submit_public(public_tx_id.0, &call, update.expected_cost, update.initial_gas_price)
            .await
            .map_err(PrivTxError::PublicSubmission)?;
        Ok(())
    }

    async fn submit_private(&self, req: SubmitTx) -> Result<SubmitOutcome, PrivTxError> {
        let domain_name = self.resolve_domain(&req).await?;
        let tx_id = Uuid::new_v4();
        let conflict = Arc::new(StdMutex::new(None::<Uuid>));

        let result = self
            .gateway
            .transaction(|tx| {
                let mut req = req.clone();
                req.domain = Some(domain_name.clone());
                let pool = self.gateway.pool().clone();
                let conflict = conflict.clone();
                async move {
                    let written = insert_transaction_row(tx, tx_id, TxType::Private, &req).await?;
                    if !written {
                        let key = req.idempotency_key.clone();
                        tx.on_rollback(move || {
                            let resolved = tokio::task::block_in_place(|| {
                                tokio::runtime::Handle::current()
                                    .block_on(lookup_by_idempotency_key(&pool, key.as_deref()))
                            });
                            *conflict.lock().unwrap() = resolved;
                        });
                        return Err(paladin_persistence::PersistenceError::Conflict(
                            req.idempotency_key.clone().unwrap_or_default(),
                        ));
                    }
                    for dep in &req.depends_on {
                        sqlx::query("INSERT INTO transaction_deps (tx_id, depends_on_id) VALUES ($1, $2)")
                            .bind(tx_id)
                            .bind(dep)
                            .execute(tx.conn().as_mut())
                            .await?;
                    }
                    Ok(())
                }
            })
            .await;

        match result {
            Ok(()) => {}
            Err(paladin_persistence::PersistenceError::Conflict(_)) => {
                let existing = conflict.lock().unwrap().take().ok_or(PrivTxError::PublicSubmission(
                    "idempotency conflict reported but no existing row found".into(),
                ))?;
                return Ok(SubmitOutcome { tx_id: existing, idempotent_duplicate: true });
            }
            Err(err) => return Err(err.into()),
        }

        self.run_private_pipeline(tx_id, &domain_name, &req).await?;
        Ok(SubmitOutcome { tx_id, idempotent_duplicate: false })
    }

    async fn resolve_domain(&self, req: &SubmitTx) -> Result<String, PrivTxError> {
        if req.is_deploy {
            return req.domain.clone().ok_or(PrivTxError::DeployRequiresDomain);
        }
        let to = req.to.clone().ok_or(PrivTxError::DeployRequiresDomain)?;
        let registered = self.domains.domain_of(&to).await;
        match (registered, req.domain.clone()) {
            (Some(resolved), Some(claimed)) if resolved != claimed => {
                Err(PrivTxError::DomainMismatch { to: Some(to), resolved })
            }
            (Some(resolved), _) => Ok(resolved),
            (None, Some(claimed)) => Ok(claimed),
            (None, None) => Err(PrivTxError::DomainMismatch { to: Some(to), resolved: "unregistered".into() }),
        }
    }

    /// Steps 2-5 of §4.6. Deploys never open a domain context, since
    /// `InitDeploy`/`PrepareDeploy` take no `ContextQuery`; everything
    /// else assembles under a context held open until confirmation.
    async fn run_private_pipeline(&self, tx_id: Uuid, domain_name: &str, req: &SubmitTx) -> Result<(), PrivTxError> {
        let contract_address = req.to.clone().unwrap_or_else(|| format!("deploy:{tx_id}"));
        let _slot = self.sequencer.acquire(domain_name, &contract_address).await;

        if req.is_deploy {
            return self.run_deploy(tx_id, domain_name, req).await;
        }

        let ctx_id = self.store.open_context().await;
        let outcome = self.assemble_and_prepare(tx_id, domain_name, &contract_address, req, ctx_id).await;

        if let Err(err) = outcome {
            self.in_flight.lock().await.remove(&tx_id);
            let _ = self.store.reset(ctx_id).await;
            self.store.close(ctx_id).await;
            return Err(err);
        }
        Ok(())
    }

    async fn run_deploy(&self, tx_id: Uuid, domain_name: &str, req: &SubmitTx) -> Result<(), PrivTxError> {
        let plugin = self.domains.domain(domain_name).await?;
        let requirements = plugin
            .init_deploy(req.inputs.as_value())
            .map_err(paladin_domain_manager::DomainManagerError::Plugin)?;
        let verifiers = self.resolve_verifiers(&requirements).await?;
        let outcome = plugin
            .prepare_deploy(req.inputs.as_value(), &verifiers)
            .map_err(paladin_domain_manager::DomainManagerError::Plugin)?;

        match outcome {
            PrepareOutcome::PublicCall(call) => {
                self.dispatch_public_call(tx_id, call, req).await?;
                info!(%tx_id, domain = domain_name, "deploy dispatched to base ledger");
                Ok(())
            }
            PrepareOutcome::ChainedPrivateTx { .. } => {
                warn!(%tx_id, "deploy chained into a new private transaction; chaining not auto-submitted");
                Ok(())
            }
        }
    }

    /// Reserves `assembled`'s proposed outputs and consumed inputs in the
    /// context overlay (§4.2) before attestation gathering begins: new
    /// states go in under a create-lock, input states under a spend-lock,
    /// so a concurrent assembly against the same contract can see them as
    /// unavailable well before this attempt's flush.
    async fn stage_assembled_states(
        &self,
        ctx_id: Uuid,
        tx_id: Uuid,
        assembled: &AssembledTransaction,
    ) -> Result<(), PrivTxError> {
        let upserts = assembled
            .new_states
            .iter()
            .cloned()
            .map(|state| StateUpsert { state, created_by: Some(tx_id) })
            .collect();
        self.store.upsert_states(ctx_id, upserts).await?;

        if !assembled.input_states.is_empty() {
            let locks = assembled
                .input_states
                .iter()
                .map(|state_id| StateLock { state_id: *state_id, tx_id, kind: LockKind::Spend })
                .collect();
            self.store.add_state_locks(ctx_id, locks).await?;
        }
        Ok(())
    }

    async fn assemble_and_prepare(
        &self,
        tx_id: Uuid,
        domain_name: &str,
        contract_address: &str,
        req: &SubmitTx,
        ctx_id: Uuid,
    ) -> Result<(), PrivTxError> {
        let handle = self.domains.smart_contract(domain_name, contract_address, &[]).await?;
        let requirements = handle.init_transaction(&req.function, req.inputs.as_value())?;
        let verifiers = self.resolve_verifiers(&requirements).await?;

        let ctx_query = StoreContextQuery::new(
            self.store.clone(),
            ctx_id,
            domain_name.to_string(),
            contract_address.to_string(),
        );
        let assembled = handle.assemble_transaction(&req.function, req.inputs.as_value(), &verifiers, &ctx_query)?;
        self.stage_assembled_states(ctx_id, tx_id, &assembled).await?;

        self.in_flight.lock().await.insert(
            tx_id,
            PendingAssembly {
                ctx_id,
                domain: domain_name.to_string(),
                contract_address: contract_address.to_string(),
                assembled: assembled.clone(),
            },
        );

        let attestations = gather_attestations(
            tx_id,
            &self.node_id,
            &handle,
            &assembled,
            &self.signer,
            &self.transport,
            &self.pending_attestations,
            self.endorsement_timeout,
        )
        .await?;

        let prepared = handle.prepare_transaction(&assembled, &attestations)?;
        self.commit_prepare_outcome(tx_id, ctx_id, prepared, req).await
    }

    async fn commit_prepare_outcome(
        &self,
        tx_id: Uuid,
        ctx_id: Uuid,
        outcome: PrepareOutcome,
        req: &SubmitTx,
    ) -> Result<(), PrivTxError> {
        match outcome {
            PrepareOutcome::PublicCall(call) => {
                let (tx, rx) = tokio::sync::oneshot::channel();
                self.store
                    .initiate_flush(ctx_id, move |result| {
                        let _ = tx.send(result);
                    })
                    .await?;
                rx.await.map_err(|_| PrivTxError::AttestationFailed("flush callback dropped".into()))??;

                let public_tx_id = self.insert_dispatch(tx_id, &call).await?;
                self.by_public_tx.lock().await.insert(public_tx_id, tx_id);
                self.notify_public_submission(public_tx_id, req).await;
                Ok(())
            }
            PrepareOutcome::ChainedPrivateTx { .. } => {
                warn!(%tx_id, "prepare chained into a new private transaction; chaining not auto-submitted");
                self.store.close(ctx_id).await;
                self.in_flight.lock().await.remove(&tx_id);
                Ok(())
            }
        }
    }

    async fn dispatch_public_call(&self, tx_id: Uuid, call: PreparedPublicCall, req: &SubmitTx) -> Result<(), PrivTxError> {
        let public_tx_id = self.insert_dispatch(tx_id, &call).await?;
        self.by_public_tx.lock().await.insert(public_tx_id, tx_id);
        self.notify_public_submission(public_tx_id, req).await;
        Ok(())
    }

    async fn insert_dispatch(&self, tx_id: Uuid, call: &PreparedPublicCall) -> Result<Uuid, PrivTxError> {
        let public_tx_id = Uuid::new_v4();
        self.gateway
            .transaction(|tx| {
                let call = call.clone();
                async move {
                    sqlx::query(
                        "INSERT INTO public_txns (id, signer, nonce, gas_price, stage) VALUES ($1, $2, NULL, NULL, 'Received')",
                    )
                    .bind(public_tx_id)
                    .bind(&call.required_signer)
                    .execute(tx.conn().as_mut())
                    .await?;
                    sqlx::query("INSERT INTO dispatches (public_tx_id, private_tx_id) VALUES ($1, $2)")
                        .bind(public_tx_id)
                        .bind(tx_id)
                        .execute(tx.conn().as_mut())
                        .await?;
                    Ok(())
                }
            })
            .await?;
        Ok(public_tx_id)
    }

    async fn resolve_verifiers(&self, requirements: &[VerifierRequirement]) -> Result<Vec<ResolvedVerifier>, PrivTxError> {
        let mut resolved = Vec::with_capacity(requirements.len());
        for requirement in requirements {
            let verifier = match self.signer.resolve_verifier(&requirement.algorithm, &requirement.verifier_type, &requirement.lookup) {
                Ok(v) => v,
                Err(_) => {
                    paladin_keys::request_resolution(
                        &self.transport,
                        &requirement.lookup,
                        &requirement.algorithm,
                        &requirement.verifier_type,
                        &requirement.lookup,
                    )
                    .await?;
                    self.poll_for_verifier(requirement).await?
                }
            };
            resolved.push(ResolvedVerifier { requirement: requirement.clone(), verifier });
        }
        Ok(resolved)
    }

    async fn poll_for_verifier(&self, requirement: &VerifierRequirement) -> Result<String, PrivTxError> {
        let deadline = tokio::time::Instant::now() + self.endorsement_timeout;
        loop {
            if let Ok(v) = self.signer.resolve_verifier(&requirement.algorithm, &requirement.verifier_type, &requirement.lookup) {
                return Ok(v);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(PrivTxError::AttestationTimeout(requirement.lookup.clone()));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Called once C5 reports an on-chain confirmation for
    /// `public_tx_id`: clears the private transaction's context locks
    /// and writes its receipt.
    pub async fn on_public_confirmed(&self, public_tx_id: Uuid, onchain_location: &str) -> Result<(), PrivTxError> {
        let private_tx_id = self
            .by_public_tx
            .lock()
            .await
            .remove(&public_tx_id)
            .ok_or(PrivTxError::NotFound(public_tx_id))?;
        let pending = self.in_flight.lock().await.remove(&private_tx_id);

        let domain_data = if let Some(pending) = &pending {
            let handle = self
                .domains
                .smart_contract(&pending.domain, &pending.contract_address, &[])
                .await?;
            let data = handle.build_receipt(&pending.assembled, onchain_location)?;
            self.store.clear_transactions(pending.ctx_id, &[private_tx_id]).await?;
            self.store.close(pending.ctx_id).await;
            Some(data)
        } else {
            None
        };

        self.write_receipt(private_tx_id, true, Some(onchain_location.to_string()), None, domain_data).await
    }

    pub async fn on_public_failed(&self, public_tx_id: Uuid, reason: &str) -> Result<(), PrivTxError> {
        let private_tx_id = self
            .by_public_tx
            .lock()
            .await
            .remove(&public_tx_id)
            .ok_or(PrivTxError::NotFound(public_tx_id))?;
        if let Some(pending) = self.in_flight.lock().await.remove(&private_tx_id) {
            self.store.clear_transactions(pending.ctx_id, &[private_tx_id]).await?;
            self.store.close(pending.ctx_id).await;
        }
        self.write_receipt(private_tx_id, false, None, Some(reason.to_string()), None).await
    }

    async fn write_receipt(
        &self,
        tx_id: Uuid,
        success: bool,
        onchain_location: Option<String>,
        failure_message: Option<String>,
        domain_data: Option<Value>,
    ) -> Result<(), PrivTxError> {
        self.gateway
            .transaction(|tx| {
                let onchain_location = onchain_location.clone();
                let failure_message = failure_message.clone();
                let domain_data = domain_data.clone();
                async move {
                    sqlx::query(
                        "INSERT INTO transaction_receipts (tx_id, success, onchain_location, failure_message, domain_data, recorded_at)
                         VALUES ($1, $2, $3, $4, $5, $6)
                         ON CONFLICT (tx_id) DO NOTHING",
                    )
                    .bind(tx_id)
                    .bind(success)
                    .bind(onchain_location)
                    .bind(failure_message)
                    .bind(domain_data)
                    .bind(Utc::now())
                    .execute(tx.conn().as_mut())
                    .await?;
                    Ok(())
                }
            })
            .await?;
        Ok(())
    }
}

async fn insert_transaction_row(
    tx: &mut paladin_persistence::Tx<'_>,
    id: Uuid,
    tx_type: TxType,
    req: &SubmitTx,
) -> Result<bool, paladin_persistence::PersistenceError> {
    let tx_type_str = match tx_type {
        TxType::Public => "public",
        TxType::Private => "private",
    };
    let result = sqlx::query(
        "INSERT INTO transactions (id, tx_type, \"from\", \"to\", domain, function, abi_reference, inputs, idempotency_key)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         ON CONFLICT (idempotency_key) DO NOTHING",
    )
    .bind(id)
    .bind(tx_type_str)
    .bind(&req.from)
    .bind(&req.to)
    .bind(&req.domain)
    .bind(&req.function)
    .bind(req.abi_reference.as_bytes().to_vec())
    .bind(req.inputs.as_value())
    .bind(&req.idempotency_key)
    .execute(tx.conn().as_mut())
    .await?;
    Ok(result.rows_affected() > 0)
}

async fn lookup_by_idempotency_key(pool: &sqlx::PgPool, key: Option<&str>) -> Option<Uuid> {
    let key = key?;
    sqlx::query_as::<_, (Uuid,)>("SELECT id FROM transactions WHERE idempotency_key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
        .map(|(id,)| id)
}
