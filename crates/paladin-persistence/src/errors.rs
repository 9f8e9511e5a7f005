use thiserror::Error;

/// Errors from the persistence gateway. All variants are Transient-Infra
/// per §7 except `Conflict`, which is a caller-visible idempotency
/// collision (Input-validation).
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("unique constraint conflict on {0}")]
    Conflict(String),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl PersistenceError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, PersistenceError::Conflict(_))
    }
}
