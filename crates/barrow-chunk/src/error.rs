use thiserror::Error;

pub type ChunkResult<T> = Result<T, ChunkError>;

/// Failure modes of the chunk pipeline.
///
/// The integrity variants (`NotEncrypted`, `UnsupportedVersion`,
/// `MacMismatch`, `IdMismatch`) are deterministic: the affected chunk must
/// be rejected and never retried.
#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("not enough encrypted data ({0} bytes) provided")]
    TooShort(usize),

    #[error("the storage doesn't seem to be encrypted")]
    NotEncrypted,

    #[error("unsupported encryption version {0}")]
    UnsupportedVersion(u8),

    #[error("unable to verify MAC")]
    MacMismatch,

    #[error("chunk id should be {expected} instead of {actual}, length: {length}")]
    IdMismatch {
        expected: String,
        actual: String,
        length: usize,
    },

    #[error("chunk has no buffer")]
    NoBuffer,

    #[error("chunk hash requested before any data was written")]
    NoHasher,

    #[error("invalid repository key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Crypto(#[from] barrow_crypto::CryptoError),

    #[error("compression error: {0}")]
    Compression(#[from] std::io::Error),
}
