//! Key derivation: effective keys and the per-envelope Argon2id schedule.

use std::fmt;

use argon2::{Algorithm, Argon2, Params, Version};
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha2::{Sha256, Sha512};
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};

/// Threefish-1024 key size in bytes.
pub const CIPHER_KEY_SIZE: usize = 128;
/// Threefish tweak size in bytes.
pub const TWEAK_SIZE: usize = 16;
/// Envelope MAC key size in bytes.
pub const MAC_KEY_SIZE: usize = 64;
/// Initial CTR counter size in bytes (one cipher block).
pub const COUNTER_SIZE: usize = 128;

const SCHEDULE_SIZE: usize = CIPHER_KEY_SIZE + TWEAK_SIZE + MAC_KEY_SIZE + COUNTER_SIZE;

const EFFECTIVE_KEY_ITERATIONS: u32 = 100;
const EFFECTIVE_KEY_SIZE: usize = 128;

/// Derive the per-object-class effective key from the repository encryption
/// key. Distinct derivation keys ("chunk", "snapshot", ...) give each object
/// class its own key from a single master; an empty derivation key means the
/// encryption key is used directly.
pub fn derive_effective_key(encryption_key: &[u8], derivation_key: &str) -> Vec<u8> {
    if derivation_key.is_empty() {
        return encryption_key.to_vec();
    }
    let mut okm = vec![0u8; EFFECTIVE_KEY_SIZE];
    pbkdf2_hmac::<Sha512>(
        encryption_key,
        derivation_key.as_bytes(),
        EFFECTIVE_KEY_ITERATIONS,
        &mut okm,
    );
    okm
}

/// Legacy effective-key derivation (HMAC-SHA256), selected on the decrypt
/// path for storages written by the older sibling product.
pub fn derive_effective_key_legacy(
    encryption_key: &[u8],
    derivation_key: &str,
) -> CryptoResult<Vec<u8>> {
    if derivation_key.is_empty() {
        return Ok(encryption_key.to_vec());
    }
    let mut mac = Hmac::<Sha256>::new_from_slice(encryption_key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(derivation_key.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// The full key schedule for one envelope, derived from the effective key
/// and the per-envelope salt.
///
/// A fresh salt drives Argon2 anew for every encryption, so identical
/// plaintexts produce unrelated cipher keys, MAC keys, and counters.
/// Zeroized on drop.
pub struct EnvelopeKeySchedule {
    cipher_key: [u8; CIPHER_KEY_SIZE],
    tweak: [u8; TWEAK_SIZE],
    mac_key: [u8; MAC_KEY_SIZE],
    counter: [u8; COUNTER_SIZE],
}

impl EnvelopeKeySchedule {
    /// Argon2id over `(effective_key, salt)`: time cost 4, memory cost
    /// 2^15 KiB, two lanes, 336 bytes out, sliced in the fixed order
    /// cipher key, tweak, MAC key, counter.
    pub fn derive(effective_key: &[u8], salt: &[u8]) -> CryptoResult<Self> {
        let params = Params::new(1 << 15, 4, 2, Some(SCHEDULE_SIZE))
            .map_err(|e| CryptoError::KeySchedule(e.to_string()))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut blob = [0u8; SCHEDULE_SIZE];
        argon2
            .hash_password_into(effective_key, salt, &mut blob)
            .map_err(|e| CryptoError::KeySchedule(e.to_string()))?;

        let mut schedule = Self {
            cipher_key: [0u8; CIPHER_KEY_SIZE],
            tweak: [0u8; TWEAK_SIZE],
            mac_key: [0u8; MAC_KEY_SIZE],
            counter: [0u8; COUNTER_SIZE],
        };
        let (cipher_key, rest) = blob.split_at(CIPHER_KEY_SIZE);
        let (tweak, rest) = rest.split_at(TWEAK_SIZE);
        let (mac_key, counter) = rest.split_at(MAC_KEY_SIZE);
        schedule.cipher_key.copy_from_slice(cipher_key);
        schedule.tweak.copy_from_slice(tweak);
        schedule.mac_key.copy_from_slice(mac_key);
        schedule.counter.copy_from_slice(counter);
        blob.zeroize();

        Ok(schedule)
    }

    pub fn cipher_key(&self) -> &[u8; CIPHER_KEY_SIZE] {
        &self.cipher_key
    }

    pub fn tweak(&self) -> &[u8; TWEAK_SIZE] {
        &self.tweak
    }

    pub fn mac_key(&self) -> &[u8] {
        &self.mac_key
    }

    pub fn counter(&self) -> &[u8; COUNTER_SIZE] {
        &self.counter
    }
}

impl Drop for EnvelopeKeySchedule {
    fn drop(&mut self) {
        self.cipher_key.zeroize();
        self.tweak.zeroize();
        self.mac_key.zeroize();
        self.counter.zeroize();
    }
}

impl fmt::Debug for EnvelopeKeySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeKeySchedule")
            .field("keys", &"[REDACTED]")
            .finish()
    }
}
