use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

/// Backend failure modes. `Io` is the transient class the caller's retry
/// loop handles; the rest are surfaced as-is. Remote clients wrap their
/// transport failures into `Io` (`std::io::Error::other` and friends).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{path}: not found")]
    NotFound { path: String },

    #[error("the renter has no formed contracts to store data")]
    NoContracts,

    #[error("timed out waiting for {operation} of {path}")]
    Timeout {
        operation: &'static str,
        path: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
