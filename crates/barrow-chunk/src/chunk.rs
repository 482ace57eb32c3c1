//! The chunk object and its envelope codec.
//!
//! Lifecycle: `reset` → `write*` → (`encrypt` → upload) or (download →
//! `decrypt` → `verify_id`); dropping the chunk returns its buffer to the
//! pool.
//!
//! Encrypted envelope layout:
//! ```text
//! offset   0  10   magic "duplicacy" plus one version byte (0x00)
//! offset  10  32   salt, random per encryption
//! offset  42  64   keyed BLAKE2b-512 MAC over magic || salt || ciphertext
//! offset 106   *   Threefish-1024 CTR ciphertext of the zstd'd plaintext
//! ```
//! An unencrypted envelope is the bare zstd frame. Deduplication happens on
//! the plaintext hash before encryption, so the fresh salt making every
//! envelope unique costs nothing.

use std::io::{self, Write};
use std::sync::Arc;

use rand::RngCore;

use barrow_crypto::{
    apply_keystream, chunk_id, derive_effective_key, derive_effective_key_legacy, envelope_mac,
    verify_envelope_mac, CryptoError, EnvelopeKeySchedule, KeyedHasher, MAC_SIZE, SALT_SIZE,
};

use crate::config::RepoConfig;
use crate::error::{ChunkError, ChunkResult};

/// Magic prefix identifying an encrypted envelope, ending in the format
/// version byte.
pub const ENCRYPTION_HEADER: &[u8; 10] = b"duplicacy\x00";

/// The object passed between the splitter, the uploader, and the
/// downloader. Writable like any byte sink; hash and id come out lazily.
pub struct Chunk {
    /// Payload storage. `None` for hash-only chunks the splitter uses to
    /// probe boundaries without retaining data.
    buffer: Option<Vec<u8>>,
    /// Logical payload length, authoritative when `buffer` is `None`.
    size: usize,
    /// Incremental keyed hash of the plaintext written so far. `None` while
    /// the buffer holds ciphertext.
    hasher: Option<KeyedHasher>,
    /// Finalized binary hash, empty until first requested.
    hash: Vec<u8>,
    /// Printable id derived from the hash; doubles as the remote filename.
    id: String,
    config: Arc<RepoConfig>,
}

impl Chunk {
    /// Create a chunk. With `buffer_needed`, a pool buffer is attached and
    /// grown to the repository's maximum chunk size up front.
    pub fn create(config: Arc<RepoConfig>, buffer_needed: bool) -> Self {
        let buffer = buffer_needed.then(|| {
            let mut buffer = config.pool().acquire();
            buffer.clear();
            if buffer.capacity() < config.max_chunk_size {
                buffer.reserve(config.max_chunk_size - buffer.capacity());
            }
            buffer
        });
        Self {
            buffer,
            size: 0,
            hasher: None,
            hash: Vec::new(),
            id: String::new(),
            config,
        }
    }

    /// Make the chunk reusable. `hash_needed` arms a fresh keyed hasher for
    /// plaintext about to be written; pass `false` when ciphertext will be
    /// read in and the hash would be wasted work.
    pub fn reset(&mut self, hash_needed: bool) {
        if let Some(buffer) = &mut self.buffer {
            buffer.clear();
        }
        self.hasher = hash_needed.then(|| self.config.keyed_hasher());
        self.hash.clear();
        self.id.clear();
        self.size = 0;
    }

    /// Length of the available data.
    pub fn len(&self) -> usize {
        match &self.buffer {
            Some(buffer) => buffer.len(),
            None => self.size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity of the attached buffer; zero for hash-only chunks.
    pub fn capacity(&self) -> usize {
        self.buffer.as_ref().map_or(0, Vec::capacity)
    }

    /// The current contents: plaintext before `encrypt` and after `decrypt`,
    /// the envelope in between.
    pub fn bytes(&self) -> ChunkResult<&[u8]> {
        self.buffer.as_deref().ok_or(ChunkError::NoBuffer)
    }

    /// The binary keyed hash of the plaintext, finalized on first call.
    pub fn hash(&mut self) -> ChunkResult<&[u8]> {
        if self.hash.is_empty() {
            let hasher = self.hasher.take().ok_or(ChunkError::NoHasher)?;
            self.hash = hasher.finalize();
        }
        Ok(&self.hash)
    }

    /// The printable chunk id, derived lazily from the hash and cached.
    pub fn id(&mut self) -> ChunkResult<&str> {
        if self.id.is_empty() {
            self.hash()?;
            self.id = chunk_id(self.config.id_key(), &self.hash);
        }
        Ok(&self.id)
    }

    /// Recompute hash and id from the current plaintext buffer and compare
    /// with the cached id. A mismatch means the storage handed back
    /// corrupted data for this chunk; the restore must abort.
    pub fn verify_id(&mut self) -> ChunkResult<()> {
        let buffer = self.buffer.as_deref().ok_or(ChunkError::NoBuffer)?;
        let mut hasher = self.config.keyed_hasher();
        hasher.update(buffer);
        let hash = hasher.finalize();
        let length = buffer.len();
        let expected = chunk_id(self.config.id_key(), &hash);
        let actual = self.id()?.to_owned();
        if expected != actual {
            return Err(ChunkError::IdMismatch {
                expected,
                actual,
                length,
            });
        }
        Ok(())
    }

    /// Compress and seal the buffered plaintext into an envelope, leaving
    /// the envelope in the buffer. With an empty encryption key the envelope
    /// is the bare zstd frame. A non-empty `derivation_key` selects the
    /// object-class key derived from the repository master.
    pub fn encrypt(&mut self, encryption_key: &[u8], derivation_key: &str) -> ChunkResult<()> {
        let plaintext = self.buffer.as_deref().ok_or(ChunkError::NoBuffer)?;
        let compressed = zstd::encode_all(plaintext, self.config.compression_level)?;

        let mut envelope = self.config.pool().acquire();
        envelope.clear();

        if encryption_key.is_empty() {
            envelope.extend_from_slice(&compressed);
            self.swap_buffer(envelope);
            return Ok(());
        }

        let effective_key = derive_effective_key(encryption_key, derivation_key);

        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);

        let schedule = EnvelopeKeySchedule::derive(&effective_key, &salt)?;
        let mut ciphertext = compressed;
        apply_keystream(&schedule, &mut ciphertext);
        let mac = envelope_mac(schedule.mac_key(), ENCRYPTION_HEADER, &salt, &ciphertext)?;

        envelope.extend_from_slice(ENCRYPTION_HEADER);
        envelope.extend_from_slice(&salt);
        envelope.extend_from_slice(&mac);
        envelope.extend_from_slice(&ciphertext);
        self.swap_buffer(envelope);
        Ok(())
    }

    /// Open the enveloped buffer back into plaintext, verifying the MAC
    /// before trusting anything. Re-arms the hasher with the recovered
    /// plaintext so `hash`/`verify_id` work afterwards.
    pub fn decrypt(&mut self, encryption_key: &[u8], derivation_key: &str) -> ChunkResult<()> {
        let envelope = self.buffer.as_deref().ok_or(ChunkError::NoBuffer)?;

        if encryption_key.is_empty() {
            let plaintext = zstd::decode_all(envelope)?;
            self.install_plaintext(plaintext);
            return Ok(());
        }

        let header_len = ENCRYPTION_HEADER.len();
        let payload_offset = header_len + SALT_SIZE + MAC_SIZE;
        if envelope.len() < payload_offset {
            return Err(ChunkError::TooShort(envelope.len()));
        }
        if envelope[..header_len - 1] != ENCRYPTION_HEADER[..header_len - 1] {
            return Err(ChunkError::NotEncrypted);
        }
        let version = envelope[header_len - 1];
        if version != 0 {
            return Err(ChunkError::UnsupportedVersion(version));
        }

        let effective_key = if self.config.legacy_hmac_decrypt {
            derive_effective_key_legacy(encryption_key, derivation_key)?
        } else {
            derive_effective_key(encryption_key, derivation_key)
        };

        let salt = &envelope[header_len..header_len + SALT_SIZE];
        let stored_mac = &envelope[header_len + SALT_SIZE..payload_offset];

        let schedule = EnvelopeKeySchedule::derive(&effective_key, salt)?;
        verify_envelope_mac(
            schedule.mac_key(),
            &envelope[..header_len],
            salt,
            &envelope[payload_offset..],
            stored_mac,
        )
        .map_err(|e| match e {
            CryptoError::MacMismatch => ChunkError::MacMismatch,
            other => ChunkError::Crypto(other),
        })?;

        let mut decrypted = envelope[payload_offset..].to_vec();
        apply_keystream(&schedule, &mut decrypted);
        let plaintext = zstd::decode_all(&decrypted[..])?;
        self.install_plaintext(plaintext);
        Ok(())
    }

    /// Put recovered plaintext into a pool buffer and feed a fresh hasher
    /// with it. The cached id survives so `verify_id` checks the recovered
    /// bytes against the identity the chunk was requested under.
    fn install_plaintext(&mut self, plaintext: Vec<u8>) {
        let mut hasher = self.config.keyed_hasher();
        hasher.update(&plaintext);

        let mut buffer = self.config.pool().acquire();
        buffer.clear();
        buffer.extend_from_slice(&plaintext);
        self.swap_buffer(buffer);

        self.hasher = Some(hasher);
        self.hash.clear();
    }

    /// Swap in `next` as the chunk's buffer and release the old one.
    fn swap_buffer(&mut self, next: Vec<u8>) {
        if let Some(previous) = self.buffer.replace(next) {
            self.config.pool().release(previous);
        }
    }
}

impl Write for Chunk {
    /// In-memory writes never fail; hash-only chunks just count bytes.
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match &mut self.buffer {
            Some(buffer) => buffer.extend_from_slice(data),
            None => self.size += data.len(),
        }
        if let Some(hasher) = &mut self.hasher {
            hasher.update(data);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.config.pool().release(buffer);
        }
    }
}
