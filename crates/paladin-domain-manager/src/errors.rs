use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainManagerError {
    #[error("domain not loaded: {0}")]
    DomainNotLoaded(String),

    #[error("domain plugin error: {0}")]
    Plugin(String),
}

impl DomainManagerError {
    pub fn is_retryable(&self) -> bool {
        false
    }
}
