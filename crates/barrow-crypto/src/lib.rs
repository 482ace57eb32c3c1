//! barrow-crypto: envelope key schedule and chunk identity
//!
//! Key material flow for one encrypted envelope:
//! ```text
//! encryption key ── PBKDF2-HMAC-SHA512(derivation key, 100 it) ──► effective key
//! effective key + 32-byte salt ── Argon2id(t=4, m=2^15 KiB, p=2) ──► 336-byte schedule
//!   ├── 128 bytes  Threefish-1024 cipher key
//!   ├──  16 bytes  tweak
//!   ├──  64 bytes  MAC key (keyed BLAKE2b-512, personalized)
//!   └── 128 bytes  initial CTR counter
//! ```
//! Content addressing is independent of the envelope:
//! ```text
//! plaintext ── keyed BLAKE2b-256 (HashKey) ──► chunk hash
//! chunk hash ── PBKDF2-HMAC-SHA512(IDKey, 13 it, 64 bytes) ── zbase32 ──► chunk id
//! ```
//! The hash key and the id key are separate so that clients sharing a
//! repository deduplicate against each other while remote filenames reveal
//! nothing about plaintext fingerprints.

pub mod error;
pub mod hasher;
pub mod id;
pub mod kdf;
pub mod mac;
pub mod stream;

pub use error::{CryptoError, CryptoResult};
pub use hasher::{HashAlgorithm, KeyedHasher};
pub use id::{chunk_id, zbase32};
pub use kdf::{derive_effective_key, derive_effective_key_legacy, EnvelopeKeySchedule};
pub use mac::{envelope_mac, verify_envelope_mac};
pub use stream::apply_keystream;

/// Size of the per-envelope random salt in bytes.
pub const SALT_SIZE: usize = 32;

/// Size of the envelope MAC tag in bytes.
pub const MAC_SIZE: usize = 64;

/// Personalization string mixed into every envelope MAC. Repository-wide;
/// all clients sharing a storage use the same value.
pub const MAC_PERSONALIZATION: &[u8] = b"duplicacy";
