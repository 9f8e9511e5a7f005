use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PrivTxError {
    #[error("domain mismatch: transaction targets {to:?} but resolved domain is {resolved}")]
    DomainMismatch { to: Option<String>, resolved: String },

    #[error("deploy requires an explicit domain field")]
    DeployRequiresDomain,

    #[error("update path is only valid for public transactions")]
    UpdateNotPublic,

    #[error("idempotency key collides with existing transaction {0}")]
    IdempotencyConflict(Uuid),

    #[error("transaction {0} not found")]
    NotFound(Uuid),

    #[error("attestation failed: {0}")]
    AttestationFailed(String),

    #[error("attestation timed out waiting on {0}")]
    AttestationTimeout(String),

    #[error("endorsement rejected: {0}")]
    EndorsementRejected(String),

    #[error("domain manager error: {0}")]
    DomainManager(#[from] paladin_domain_manager::DomainManagerError),

    #[error("state store error: {0}")]
    State(#[from] paladin_state::StateError),

    #[error("transport error: {0}")]
    Transport(#[from] paladin_transport::TransportError),

    #[error("persistence error: {0}")]
    Persistence(#[from] paladin_persistence::PersistenceError),

    #[error("public submission rejected: {0}")]
    PublicSubmission(String),
}

impl PrivTxError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PrivTxError::Persistence(e) => e.is_retryable(),
            PrivTxError::Transport(_) | PrivTxError::AttestationTimeout(_) => true,
            PrivTxError::State(e) => e.is_retryable(),
            _ => false,
        }
    }
}
