//! Chunk identity: a key-separating PRF over the content hash, printed in
//! zbase32 for filename use.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha512;

const ID_ITERATIONS: u32 = 13;
const ID_SIZE: usize = 64;

/// Derive the printable chunk id from the binary content hash.
///
/// The iteration count is low on purpose: the input is already a
/// cryptographic digest, and this pass only separates the id namespace from
/// the hash namespace so that remote filenames reveal no plaintext
/// fingerprints.
pub fn chunk_id(id_key: &[u8], hash: &[u8]) -> String {
    let mut id = [0u8; ID_SIZE];
    pbkdf2_hmac::<Sha512>(id_key, hash, ID_ITERATIONS, &mut id);
    zbase32::encode(&id)
}

/// zbase32 codec (no external dep needed, just a small impl)
pub mod zbase32 {
    const ALPHABET: &[u8; 32] = b"ybndrfg8ejkmcpqxot1uwisza345h769";

    /// Encode whole bytes, most significant bit first, five bits per
    /// character; a trailing partial group is zero-padded on the right.
    pub fn encode(data: &[u8]) -> String {
        let mut out = String::with_capacity(data.len() * 8 / 5 + 1);
        let mut buffer: u16 = 0;
        let mut bits: u32 = 0;
        for &byte in data {
            buffer = (buffer << 8) | u16::from(byte);
            bits += 8;
            while bits >= 5 {
                bits -= 5;
                out.push(ALPHABET[usize::from((buffer >> bits) & 0x1F)] as char);
            }
        }
        if bits > 0 {
            out.push(ALPHABET[usize::from((buffer << (5 - bits)) & 0x1F)] as char);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zbase32_known_vectors() {
        assert_eq!(zbase32::encode(b""), "");
        assert_eq!(zbase32::encode(&[0x00]), "yy");
        assert_eq!(zbase32::encode(&[0xFF]), "9h");
        assert_eq!(zbase32::encode(&[0x00, 0x00]), "yyyy");
    }

    #[test]
    fn zbase32_length_and_alphabet() {
        let data: Vec<u8> = (0u8..=255).collect();
        let encoded = zbase32::encode(&data);
        assert_eq!(encoded.len(), (data.len() * 8).div_ceil(5));
        assert!(encoded
            .bytes()
            .all(|c| b"ybndrfg8ejkmcpqxot1uwisza345h769".contains(&c)));
    }

    #[test]
    fn chunk_id_is_deterministic() {
        let hash = [0xABu8; 32];
        let a = chunk_id(&[1u8; 32], &hash);
        let b = chunk_id(&[1u8; 32], &hash);
        assert_eq!(a, b);
        // 64 bytes is 512 bits, 103 characters at 5 bits each.
        assert_eq!(a.len(), 103);
    }

    #[test]
    fn chunk_id_depends_on_id_key_only() {
        let hash = [0xABu8; 32];
        assert_ne!(chunk_id(&[1u8; 32], &hash), chunk_id(&[2u8; 32], &hash));
    }

    #[test]
    fn chunk_id_is_filename_safe() {
        let id = chunk_id(&[1u8; 32], &[0xCDu8; 32]);
        assert!(!id.contains('/'));
        assert!(!id.contains('.'));
    }
}
