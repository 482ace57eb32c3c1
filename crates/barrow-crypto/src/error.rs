use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("key schedule derivation failed: {0}")]
    KeySchedule(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("unable to verify MAC")]
    MacMismatch,
}
