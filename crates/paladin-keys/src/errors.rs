use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeysError {
    #[error("unknown key handle: {0}")]
    UnknownKeyHandle(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("remote verifier resolution failed: {0}")]
    RemoteResolution(String),
}

impl KeysError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, KeysError::RemoteResolution(_))
    }
}
