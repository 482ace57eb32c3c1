//! Repository configuration shared by every chunk in a backup run.

use std::fmt;

use zeroize::Zeroize;

use barrow_crypto::{HashAlgorithm, KeyedHasher};

use crate::error::{ChunkError, ChunkResult};
use crate::pool::BufferPool;

/// Environment variable recognized by the frontend: any value other than
/// `"0"` turns on the legacy HMAC-SHA256 decrypt derivation.
pub const LEGACY_DECRYPT_ENV: &str = "DUPLICACY_DECRYPT_WITH_HMACSHA256";

/// Read the legacy-decrypt switch from the environment. Library code never
/// calls this; the CLI entry point reads it once and sets
/// [`RepoConfig::legacy_hmac_decrypt`].
pub fn legacy_decrypt_from_env() -> bool {
    std::env::var(LEGACY_DECRYPT_ENV).map(|v| v != "0").unwrap_or(false)
}

/// Repository-wide configuration: the keys, sizes, and switches every chunk
/// operation needs. Read-only after construction and freely shared; clients
/// sharing a storage must construct it with identical keys.
pub struct RepoConfig {
    hash_key: Vec<u8>,
    id_key: Vec<u8>,
    hash_algorithm: HashAlgorithm,
    /// Upper bound the variable-size splitter produces; pool buffers are
    /// grown to this up front so writes never reallocate.
    pub max_chunk_size: usize,
    /// zstd level for envelope payloads.
    pub compression_level: i32,
    /// Decrypt-side compatibility switch, see [`legacy_decrypt_from_env`].
    pub legacy_hmac_decrypt: bool,
    pool: BufferPool,
}

impl RepoConfig {
    pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

    /// Build a repository config with a machine-sized buffer pool. Key
    /// lengths are validated once here so per-chunk hasher construction on
    /// the hot path cannot fail.
    pub fn new(hash_key: Vec<u8>, id_key: Vec<u8>, max_chunk_size: usize) -> ChunkResult<Self> {
        Self::with_pool(hash_key, id_key, max_chunk_size, BufferPool::new())
    }

    /// Same as [`RepoConfig::new`] with an explicit pool, which tests use
    /// for deterministic teardown.
    pub fn with_pool(
        hash_key: Vec<u8>,
        id_key: Vec<u8>,
        max_chunk_size: usize,
        pool: BufferPool,
    ) -> ChunkResult<Self> {
        let hash_algorithm = HashAlgorithm::Blake2b;
        KeyedHasher::new(hash_algorithm, &hash_key)
            .map_err(|e| ChunkError::InvalidKey(e.to_string()))?;
        if id_key.is_empty() {
            return Err(ChunkError::InvalidKey("empty id key".into()));
        }
        Ok(Self {
            hash_key,
            id_key,
            hash_algorithm,
            max_chunk_size,
            compression_level: Self::DEFAULT_COMPRESSION_LEVEL,
            legacy_hmac_decrypt: false,
            pool,
        })
    }

    /// Switch the content-hash algorithm. All clients sharing the storage
    /// must agree on it.
    pub fn set_hash_algorithm(&mut self, algorithm: HashAlgorithm) -> ChunkResult<()> {
        KeyedHasher::new(algorithm, &self.hash_key)
            .map_err(|e| ChunkError::InvalidKey(e.to_string()))?;
        self.hash_algorithm = algorithm;
        Ok(())
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    pub fn hash_key(&self) -> &[u8] {
        &self.hash_key
    }

    pub fn id_key(&self) -> &[u8] {
        &self.id_key
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// A fresh keyed hasher over chunk plaintext.
    pub fn keyed_hasher(&self) -> KeyedHasher {
        // Key lengths were validated in the constructor.
        KeyedHasher::new(self.hash_algorithm, &self.hash_key)
            .expect("hash key validated at construction")
    }
}

impl Drop for RepoConfig {
    fn drop(&mut self) {
        self.hash_key.zeroize();
        self.id_key.zeroize();
    }
}

impl fmt::Debug for RepoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoConfig")
            .field("hash_key", &"[REDACTED]")
            .field("id_key", &"[REDACTED]")
            .field("hash_algorithm", &self.hash_algorithm)
            .field("max_chunk_size", &self.max_chunk_size)
            .field("compression_level", &self.compression_level)
            .field("legacy_hmac_decrypt", &self.legacy_hmac_decrypt)
            .finish()
    }
}
