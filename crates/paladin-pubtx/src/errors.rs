use thiserror::Error;

#[derive(Debug, Error)]
pub enum PubTxError {
    #[error("insufficient available-to-spend balance: required {required}, available {available}")]
    InsufficientBalance { required: u128, available: u128 },

    #[error("in-flight transaction {0} not found")]
    NotFound(uuid::Uuid),

    #[error("stage output persistence failed, will retry: {0}")]
    PersistenceRetry(String),

    #[error("replacement transaction underpriced")]
    ReplacementUnderpriced,

    #[error("persistence error: {0}")]
    Persistence(#[from] paladin_persistence::PersistenceError),
}

impl PubTxError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PubTxError::PersistenceRetry(_) | PubTxError::ReplacementUnderpriced
        ) || matches!(self, PubTxError::Persistence(e) if e.is_retryable())
    }
}
