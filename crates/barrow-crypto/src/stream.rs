//! Threefish-1024 counter-mode keystream.

use threefish::cipher::{generic_array::GenericArray, BlockEncrypt};
use threefish::Threefish1024;

use crate::kdf::{EnvelopeKeySchedule, COUNTER_SIZE};

/// XOR `data` in place with the keystream defined by the schedule.
///
/// The counter starts at the derived 128-byte value and the whole block
/// increments as one big-endian integer, so encrypt and decrypt are the same
/// operation.
pub fn apply_keystream(schedule: &EnvelopeKeySchedule, data: &mut [u8]) {
    let cipher = Threefish1024::new_with_tweak(schedule.cipher_key(), schedule.tweak());
    let mut counter = *schedule.counter();

    for block in data.chunks_mut(COUNTER_SIZE) {
        let mut keystream = GenericArray::clone_from_slice(&counter);
        cipher.encrypt_block(&mut keystream);
        for (byte, key) in block.iter_mut().zip(keystream.iter()) {
            *byte ^= key;
        }
        increment(&mut counter);
    }
}

fn increment(counter: &mut [u8; COUNTER_SIZE]) {
    for byte in counter.iter_mut().rev() {
        let (value, carry) = byte.overflowing_add(1);
        *byte = value;
        if !carry {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdf::derive_effective_key;

    fn test_schedule(salt: &[u8; 32]) -> EnvelopeKeySchedule {
        let key = derive_effective_key(&[0x41u8; 32], "chunk");
        EnvelopeKeySchedule::derive(&key, salt).unwrap()
    }

    #[test]
    fn keystream_is_an_involution() {
        let schedule = test_schedule(&[3u8; 32]);
        let original: Vec<u8> = (0u8..=255).cycle().take(1000).collect();

        let mut data = original.clone();
        apply_keystream(&schedule, &mut data);
        assert_ne!(data, original);

        apply_keystream(&schedule, &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn keystream_covers_partial_blocks() {
        let schedule = test_schedule(&[3u8; 32]);
        for len in [0usize, 1, 127, 128, 129, 300] {
            let original = vec![0xA5u8; len];
            let mut data = original.clone();
            apply_keystream(&schedule, &mut data);
            if len > 0 {
                assert_ne!(data, original, "len {len}");
            }
            apply_keystream(&schedule, &mut data);
            assert_eq!(data, original, "len {len}");
        }
    }

    #[test]
    fn prefix_of_longer_stream_matches_shorter() {
        // CTR property: encrypting a prefix yields a prefix of the stream.
        let schedule = test_schedule(&[5u8; 32]);
        let mut long = vec![0u8; 512];
        let mut short = vec![0u8; 200];
        apply_keystream(&schedule, &mut long);
        apply_keystream(&schedule, &mut short);
        assert_eq!(&long[..200], &short[..]);
    }

    #[test]
    fn different_salts_give_unrelated_streams() {
        let a = test_schedule(&[1u8; 32]);
        let b = test_schedule(&[2u8; 32]);
        let mut stream_a = vec![0u8; 256];
        let mut stream_b = vec![0u8; 256];
        apply_keystream(&a, &mut stream_a);
        apply_keystream(&b, &mut stream_b);
        assert_ne!(stream_a, stream_b);
    }

    #[test]
    fn counter_increment_carries() {
        let mut counter = [0xFFu8; COUNTER_SIZE];
        increment(&mut counter);
        assert_eq!(counter, [0u8; COUNTER_SIZE]);

        let mut counter = [0u8; COUNTER_SIZE];
        counter[COUNTER_SIZE - 1] = 0xFF;
        increment(&mut counter);
        assert_eq!(counter[COUNTER_SIZE - 1], 0);
        assert_eq!(counter[COUNTER_SIZE - 2], 1);
    }
}
