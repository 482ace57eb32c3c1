//! Incremental keyed content hashing.

use blake2::digest::consts::U32;
use blake2::digest::Mac;
use blake2::Blake2bMac;
use hmac::Hmac;
use sha2::Sha256;

use crate::error::{CryptoError, CryptoResult};

/// Which keyed hash a repository uses for content addressing. All clients
/// sharing a storage must agree; the output length is 32 bytes either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// Keyed BLAKE2b with a 256-bit output. The default.
    Blake2b,
    /// HMAC-SHA256, for storages written by the older sibling product.
    HmacSha256,
}

/// Incremental keyed hasher over chunk plaintext.
pub enum KeyedHasher {
    Blake2b(Box<Blake2bMac<U32>>),
    HmacSha256(Box<Hmac<Sha256>>),
}

impl KeyedHasher {
    /// Keys must be non-empty; BLAKE2b additionally caps them at 64 bytes.
    pub fn new(algorithm: HashAlgorithm, key: &[u8]) -> CryptoResult<Self> {
        if key.is_empty() {
            return Err(CryptoError::InvalidKey("empty hash key".into()));
        }
        match algorithm {
            HashAlgorithm::Blake2b => Blake2bMac::new_from_slice(key)
                .map(|mac| Self::Blake2b(Box::new(mac)))
                .map_err(|e| CryptoError::InvalidKey(format!("hash key: {e}"))),
            HashAlgorithm::HmacSha256 => Hmac::new_from_slice(key)
                .map(|mac| Self::HmacSha256(Box::new(mac)))
                .map_err(|e| CryptoError::InvalidKey(format!("hash key: {e}"))),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Blake2b(mac) => mac.update(data),
            Self::HmacSha256(mac) => mac.update(data),
        }
    }

    /// The 32-byte binary digest.
    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::Blake2b(mac) => mac.finalize().into_bytes().to_vec(),
            Self::HmacSha256(mac) => mac.finalize().into_bytes().to_vec(),
        }
    }
}
