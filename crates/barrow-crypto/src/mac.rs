//! Keyed envelope MAC over `header || salt || ciphertext`.
//!
//! Covering the salt prevents salt swapping between envelopes; covering the
//! header pins the format version the tag was computed for.

use blake2::digest::Mac;
use blake2::Blake2bMac512;

use crate::error::{CryptoError, CryptoResult};
use crate::{MAC_PERSONALIZATION, MAC_SIZE};

fn keyed(mac_key: &[u8]) -> CryptoResult<Blake2bMac512> {
    Blake2bMac512::new_with_salt_and_personal(mac_key, &[], MAC_PERSONALIZATION)
        .map_err(|e| CryptoError::InvalidKey(format!("MAC key: {e}")))
}

/// Keyed, personalized BLAKE2b-512 tag for an envelope.
pub fn envelope_mac(
    mac_key: &[u8],
    header: &[u8],
    salt: &[u8],
    ciphertext: &[u8],
) -> CryptoResult<[u8; MAC_SIZE]> {
    let mut mac = keyed(mac_key)?;
    mac.update(header);
    mac.update(salt);
    mac.update(ciphertext);
    let mut tag = [0u8; MAC_SIZE];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Constant-time verification of a stored envelope tag.
pub fn verify_envelope_mac(
    mac_key: &[u8],
    header: &[u8],
    salt: &[u8],
    ciphertext: &[u8],
    tag: &[u8],
) -> CryptoResult<()> {
    let mut mac = keyed(mac_key)?;
    mac.update(header);
    mac.update(salt);
    mac.update(ciphertext);
    mac.verify_slice(tag).map_err(|_| CryptoError::MacMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 64] = [0x5Au8; 64];

    #[test]
    fn mac_roundtrip() {
        let tag = envelope_mac(&KEY, b"header", b"salt", b"ciphertext").unwrap();
        verify_envelope_mac(&KEY, b"header", b"salt", b"ciphertext", &tag).unwrap();
    }

    #[test]
    fn mac_rejects_any_moved_part() {
        let tag = envelope_mac(&KEY, b"header", b"salt", b"ciphertext").unwrap();
        assert!(matches!(
            verify_envelope_mac(&KEY, b"headex", b"salt", b"ciphertext", &tag),
            Err(CryptoError::MacMismatch)
        ));
        assert!(matches!(
            verify_envelope_mac(&KEY, b"header", b"salx", b"ciphertext", &tag),
            Err(CryptoError::MacMismatch)
        ));
        assert!(matches!(
            verify_envelope_mac(&KEY, b"header", b"salt", b"ciphertexx", &tag),
            Err(CryptoError::MacMismatch)
        ));
    }

    #[test]
    fn mac_depends_on_key() {
        let tag = envelope_mac(&KEY, b"header", b"salt", b"ciphertext").unwrap();
        let other = [0xA5u8; 64];
        assert!(verify_envelope_mac(&other, b"header", b"salt", b"ciphertext", &tag).is_err());

        let a = envelope_mac(&KEY, b"h", b"s", b"c").unwrap();
        let b = envelope_mac(&[0x11u8; 64], b"h", b"s", b"c").unwrap();
        assert_ne!(a, b);
    }
}
