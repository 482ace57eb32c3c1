//! End-to-end tests for the envelope codec and chunk identity.

use std::io::Write;
use std::sync::Arc;

use proptest::prelude::*;
use rand::RngCore;

use barrow_chunk::{BufferPool, Chunk, ChunkError, RepoConfig, ENCRYPTION_HEADER};
use barrow_crypto::{MAC_SIZE, SALT_SIZE};

const HEADER_LEN: usize = 10;
const PAYLOAD_OFFSET: usize = HEADER_LEN + SALT_SIZE + MAC_SIZE;

const ENCRYPTION_KEY: [u8; 32] = [0x41; 32];

fn config_with(hash_key: u8, id_key: u8, max_chunk_size: usize) -> Arc<RepoConfig> {
    Arc::new(
        RepoConfig::with_pool(
            vec![hash_key; 32],
            vec![id_key; 32],
            max_chunk_size,
            BufferPool::with_capacity(8),
        )
        .unwrap(),
    )
}

fn test_config() -> Arc<RepoConfig> {
    config_with(0x11, 0x22, 1 << 20)
}

fn plaintext_chunk(config: &Arc<RepoConfig>, plaintext: &[u8]) -> Chunk {
    let mut chunk = Chunk::create(config.clone(), true);
    chunk.reset(true);
    chunk.write_all(plaintext).unwrap();
    chunk
}

fn envelope_of(config: &Arc<RepoConfig>, plaintext: &[u8], key: &[u8], derivation: &str) -> Vec<u8> {
    let mut chunk = plaintext_chunk(config, plaintext);
    chunk.encrypt(key, derivation).unwrap();
    chunk.bytes().unwrap().to_vec()
}

fn decrypt_envelope(
    config: &Arc<RepoConfig>,
    envelope: &[u8],
    key: &[u8],
    derivation: &str,
) -> Result<Vec<u8>, ChunkError> {
    let mut chunk = Chunk::create(config.clone(), true);
    chunk.reset(false);
    chunk.write_all(envelope).unwrap();
    chunk.decrypt(key, derivation)?;
    Ok(chunk.bytes().unwrap().to_vec())
}

#[test]
fn unencrypted_empty_chunk_is_the_empty_zstd_frame() {
    let config = test_config();
    let envelope = envelope_of(&config, b"", b"", "");
    let reference = zstd::encode_all(&b""[..], 3).unwrap();
    assert_eq!(envelope.len(), reference.len());
    assert_eq!(envelope, reference);

    let recovered = decrypt_envelope(&config, &envelope, b"", "").unwrap();
    assert!(recovered.is_empty());
}

#[test]
fn unencrypted_envelope_equals_plain_zstd() {
    let config = test_config();
    let plaintext = b"compressible compressible compressible";
    let envelope = envelope_of(&config, plaintext, b"", "");
    assert_eq!(
        envelope,
        zstd::encode_all(&plaintext[..], config.compression_level).unwrap()
    );
    assert_eq!(
        decrypt_envelope(&config, &envelope, b"", "").unwrap(),
        plaintext
    );
}

#[test]
fn encrypting_twice_shares_only_the_header() {
    let config = test_config();
    let first = envelope_of(&config, b"hello world", &ENCRYPTION_KEY, "chunk");
    let second = envelope_of(&config, b"hello world", &ENCRYPTION_KEY, "chunk");

    assert_eq!(&first[..HEADER_LEN], ENCRYPTION_HEADER);
    assert_eq!(&second[..HEADER_LEN], ENCRYPTION_HEADER);
    // Fresh salt per encryption: everything after the magic differs.
    assert_ne!(&first[HEADER_LEN..], &second[HEADER_LEN..]);

    assert_eq!(
        decrypt_envelope(&config, &first, &ENCRYPTION_KEY, "chunk").unwrap(),
        b"hello world"
    );
    assert_eq!(
        decrypt_envelope(&config, &second, &ENCRYPTION_KEY, "chunk").unwrap(),
        b"hello world"
    );
}

#[test]
fn salt_region_differs_in_every_byte_between_encryptions() {
    let config = test_config();
    let first = envelope_of(&config, b"same plaintext", &ENCRYPTION_KEY, "chunk");
    let second = envelope_of(&config, b"same plaintext", &ENCRYPTION_KEY, "chunk");
    let differing = first[HEADER_LEN..PAYLOAD_OFFSET]
        .iter()
        .zip(&second[HEADER_LEN..PAYLOAD_OFFSET])
        .filter(|(a, b)| a != b)
        .count();
    // 96 salt+MAC bytes; a handful of accidental collisions is expected,
    // wholesale agreement is not.
    assert!(differing > 80, "only {differing} bytes differ");
}

#[test]
fn zeroed_mac_fails_with_mac_error() {
    let config = test_config();
    let mut envelope = envelope_of(&config, &vec![0u8; 1 << 20], &ENCRYPTION_KEY, "chunk");
    for byte in &mut envelope[HEADER_LEN + SALT_SIZE..PAYLOAD_OFFSET] {
        *byte = 0;
    }
    assert!(matches!(
        decrypt_envelope(&config, &envelope, &ENCRYPTION_KEY, "chunk"),
        Err(ChunkError::MacMismatch)
    ));
}

#[test]
fn every_flipped_bit_is_detected() {
    let config = test_config();
    let envelope = envelope_of(&config, b"attack at dawn", &ENCRYPTION_KEY, "chunk");

    let mut position = 0;
    while position < envelope.len() {
        let mut tampered = envelope.clone();
        tampered[position] ^= 0x01;
        let result = decrypt_envelope(&config, &tampered, &ENCRYPTION_KEY, "chunk");
        assert!(result.is_err(), "flip at {position} went undetected");
        position += 5;
    }
}

#[test]
fn truncated_envelope_is_rejected() {
    let config = test_config();
    let envelope = envelope_of(&config, b"payload", &ENCRYPTION_KEY, "chunk");
    let result = decrypt_envelope(&config, &envelope[..PAYLOAD_OFFSET - 1], &ENCRYPTION_KEY, "chunk");
    match result {
        Err(ChunkError::TooShort(len)) => assert_eq!(len, PAYLOAD_OFFSET - 1),
        other => panic!("expected TooShort, got {other:?}"),
    }
    assert!(
        format!("{}", ChunkError::TooShort(PAYLOAD_OFFSET - 1))
            .contains("not enough encrypted data")
    );
}

#[test]
fn wrong_magic_is_rejected() {
    let config = test_config();
    let mut envelope = envelope_of(&config, b"payload", &ENCRYPTION_KEY, "chunk");
    envelope[0] = b'x';
    let result = decrypt_envelope(&config, &envelope, &ENCRYPTION_KEY, "chunk");
    assert!(matches!(result, Err(ChunkError::NotEncrypted)));
    assert_eq!(
        format!("{}", ChunkError::NotEncrypted),
        "the storage doesn't seem to be encrypted"
    );
}

#[test]
fn future_version_is_rejected() {
    let config = test_config();
    let mut envelope = envelope_of(&config, b"payload", &ENCRYPTION_KEY, "chunk");
    envelope[HEADER_LEN - 1] = 1;
    let result = decrypt_envelope(&config, &envelope, &ENCRYPTION_KEY, "chunk");
    match result {
        Err(ChunkError::UnsupportedVersion(version)) => {
            assert_eq!(version, 1);
            assert_eq!(
                format!("{}", ChunkError::UnsupportedVersion(version)),
                "unsupported encryption version 1"
            );
        }
        other => panic!("expected UnsupportedVersion, got {other:?}"),
    }
}

#[test]
fn zero_length_plaintext_is_still_authenticated() {
    let config = test_config();
    let envelope = envelope_of(&config, b"", &ENCRYPTION_KEY, "chunk");
    assert!(envelope.len() >= PAYLOAD_OFFSET);
    assert_eq!(
        decrypt_envelope(&config, &envelope, &ENCRYPTION_KEY, "chunk").unwrap(),
        b""
    );

    let mut tampered = envelope;
    let last = tampered.len() - 1;
    tampered[last] ^= 0x80;
    assert!(decrypt_envelope(&config, &tampered, &ENCRYPTION_KEY, "chunk").is_err());
}

#[test]
fn maximum_size_chunk_roundtrips_without_buffer_growth() {
    const MAX: usize = 16 << 20;
    let config = config_with(0x11, 0x22, MAX);

    let mut plaintext = vec![0u8; MAX];
    rand::thread_rng().fill_bytes(&mut plaintext);

    let mut chunk = Chunk::create(config.clone(), true);
    chunk.reset(true);
    assert!(chunk.capacity() >= MAX);
    chunk.write_all(&plaintext).unwrap();
    let hash_before = chunk.hash().unwrap().to_vec();
    let id_before = chunk.id().unwrap().to_owned();

    chunk.encrypt(&ENCRYPTION_KEY, "chunk").unwrap();
    let envelope = chunk.bytes().unwrap().to_vec();

    let mut restored = Chunk::create(config, true);
    restored.reset(false);
    restored.write_all(&envelope).unwrap();
    restored.decrypt(&ENCRYPTION_KEY, "chunk").unwrap();

    assert_eq!(restored.bytes().unwrap(), &plaintext[..]);
    assert!(restored.capacity() >= MAX);
    assert_eq!(restored.hash().unwrap(), hash_before);
    assert_eq!(restored.id().unwrap(), id_before);
}

#[test]
fn same_plaintext_same_id_under_different_encryption_keys() {
    let config = test_config();
    let plaintext = b"deduplicated across clients";

    let mut first = plaintext_chunk(&config, plaintext);
    let mut second = plaintext_chunk(&config, plaintext);
    assert_eq!(
        first.id().unwrap().to_owned(),
        second.id().unwrap().to_owned()
    );

    first.encrypt(&[0x41; 32], "chunk").unwrap();
    second.encrypt(&[0x42; 32], "chunk").unwrap();
    assert_ne!(first.bytes().unwrap(), second.bytes().unwrap());
}

#[test]
fn id_key_separates_id_space_from_hash_space() {
    let plaintext = b"key separation";

    let mut base = plaintext_chunk(&config_with(0x11, 0x22, 1 << 20), plaintext);
    let mut other_id_key = plaintext_chunk(&config_with(0x11, 0x33, 1 << 20), plaintext);
    let mut other_hash_key = plaintext_chunk(&config_with(0x44, 0x22, 1 << 20), plaintext);

    // Changing only the id key keeps the hash, changes the id.
    assert_eq!(base.hash().unwrap(), other_id_key.hash().unwrap());
    assert_ne!(
        base.id().unwrap().to_owned(),
        other_id_key.id().unwrap().to_owned()
    );

    // Changing the hash key changes both.
    assert_ne!(base.hash().unwrap(), other_hash_key.hash().unwrap());
    assert_ne!(
        base.id().unwrap().to_owned(),
        other_hash_key.id().unwrap().to_owned()
    );
}

#[test]
fn verify_id_passes_after_roundtrip_and_catches_substitution() {
    let config = test_config();
    let mut chunk = plaintext_chunk(&config, b"integrity checked payload");
    let id = chunk.id().unwrap().to_owned();
    chunk.encrypt(&ENCRYPTION_KEY, "chunk").unwrap();
    chunk.decrypt(&ENCRYPTION_KEY, "chunk").unwrap();
    chunk.verify_id().unwrap();
    assert_eq!(chunk.id().unwrap(), id);

    // A chunk whose buffer no longer matches its cached id must be
    // rejected. Appending after the id was finalized models a storage that
    // handed back the wrong bytes for a name.
    let mut tampered = plaintext_chunk(&config, b"integrity checked payload");
    let cached = tampered.id().unwrap().to_owned();
    tampered.write_all(b" plus trailing garbage").unwrap();
    match tampered.verify_id() {
        Err(ChunkError::IdMismatch { actual, .. }) => assert_eq!(actual, cached),
        other => panic!("expected IdMismatch, got {other:?}"),
    }
}

#[test]
fn legacy_decrypt_mode_changes_key_derivation() {
    let standard = test_config();
    let envelope = envelope_of(&standard, b"legacy compat", &ENCRYPTION_KEY, "chunk");

    let mut legacy_config =
        RepoConfig::with_pool(vec![0x11; 32], vec![0x22; 32], 1 << 20, BufferPool::with_capacity(8))
            .unwrap();
    legacy_config.legacy_hmac_decrypt = true;
    let legacy = Arc::new(legacy_config);

    // With a derivation key the legacy derivation disagrees, so the MAC
    // cannot verify.
    assert!(matches!(
        decrypt_envelope(&legacy, &envelope, &ENCRYPTION_KEY, "chunk"),
        Err(ChunkError::MacMismatch)
    ));

    // With no derivation key both modes use the encryption key directly.
    let plain = envelope_of(&standard, b"legacy compat", &ENCRYPTION_KEY, "");
    assert_eq!(
        decrypt_envelope(&legacy, &plain, &ENCRYPTION_KEY, "").unwrap(),
        b"legacy compat"
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn unencrypted_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..=4096)) {
        let config = test_config();
        let envelope = envelope_of(&config, &data, b"", "");
        let recovered = decrypt_envelope(&config, &envelope, b"", "").unwrap();
        prop_assert_eq!(recovered, data);
    }

    #[test]
    fn identity_is_deterministic_across_independent_configs(
        data in proptest::collection::vec(any::<u8>(), 0..=2048),
    ) {
        let mut first = plaintext_chunk(&config_with(0x11, 0x22, 1 << 20), &data);
        let mut second = plaintext_chunk(&config_with(0x11, 0x22, 1 << 20), &data);
        prop_assert_eq!(first.hash().unwrap(), second.hash().unwrap());
        prop_assert_eq!(first.id().unwrap(), second.id().unwrap());
    }
}

proptest! {
    // Each case costs two Argon2 passes; keep the count small.
    #![proptest_config(ProptestConfig::with_cases(4))]

    #[test]
    fn encrypted_roundtrip(
        data in proptest::collection::vec(any::<u8>(), 0..=4096),
        derivation in "[a-z]{0,8}",
        level in 1i32..=9,
    ) {
        let mut config = RepoConfig::with_pool(
            vec![0x11; 32],
            vec![0x22; 32],
            1 << 20,
            BufferPool::with_capacity(8),
        )
        .unwrap();
        config.compression_level = level;
        let config = Arc::new(config);

        let mut chunk = plaintext_chunk(&config, &data);
        let hash_before = chunk.hash().unwrap().to_vec();
        chunk.encrypt(&ENCRYPTION_KEY, &derivation).unwrap();
        chunk.decrypt(&ENCRYPTION_KEY, &derivation).unwrap();
        prop_assert_eq!(chunk.bytes().unwrap(), &data[..]);
        prop_assert_eq!(chunk.hash().unwrap(), &hash_before[..]);
        chunk.verify_id().unwrap();
    }
}
