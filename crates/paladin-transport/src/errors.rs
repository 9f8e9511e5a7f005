use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no transport mutually supported with node {0}")]
    NoMutualTransport(String),

    #[error("node not found in registry: {0}")]
    NodeNotFound(String),

    #[error("peer quiesced, send aborted: {0}")]
    PeerQuiesced(String),

    #[error("transport plugin error: {0}")]
    Plugin(String),

    #[error("persistence error: {0}")]
    Persistence(#[from] paladin_persistence::PersistenceError),
}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Persistence(e) if e.is_retryable())
            || matches!(self, TransportError::PeerQuiesced(_))
    }
}
