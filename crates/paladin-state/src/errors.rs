use thiserror::Error;

/// Errors surfaced by the state store and domain context.
///
/// None of these panic; a poisoned overlay mutex is itself reported as
/// `InternalInvariant` rather than propagated as a panic.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("schema not found: {0}")]
    SchemaNotFound(String),

    #[error("state not found: {0}")]
    StateNotFound(String),

    #[error("domain context not found or closed: {0}")]
    ContextClosed(uuid::Uuid),

    #[error("state {0} is not in the creating map for this context")]
    NotInCreatingMap(paladin_types::Hash),

    #[error("state {0} already has a different nullifier in this context")]
    NullifierConflict(paladin_types::Hash),

    #[error("label validation failed for schema {schema}: {reason}")]
    LabelValidation { schema: String, reason: String },

    #[error("flush already in progress for context {0}")]
    FlushInProgress(uuid::Uuid),

    #[error("persistence error: {0}")]
    Persistence(#[from] paladin_persistence::PersistenceError),
}

impl StateError {
    pub fn is_retryable(&self) -> bool {
        match self {
            StateError::Persistence(e) => e.is_retryable(),
            StateError::FlushInProgress(_) => true,
            _ => false,
        }
    }
}
