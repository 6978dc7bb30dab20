use super::{
    digest,
    params::{DIGEST_BYTE_LEN, PLAINTEXT_BIT_LEN, SENTINEL_BYTE},
};

/// A key-value pair, as it is laid out in the database: DIGEST_BYTE_LEN -bytes digest of the key, followed by the value.
/// Byte `p` of the record lives in partition (byte-plane) `p`.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedRecord {
    bytes: Vec<u8>,
}

impl EncodedRecord {
    pub fn encode(key: &[u8], value: &[u8]) -> EncodedRecord {
        let mut bytes = Vec::with_capacity(DIGEST_BYTE_LEN + value.len());
        bytes.extend_from_slice(&digest::key_digest(key));
        bytes.extend_from_slice(value);

        EncodedRecord { bytes }
    }

    /// Filler for empty database slots. All bytes are 0xff, which collides with a real record only if some key's digest is
    /// all 0xff, which happens with probability 2^-64.
    pub fn sentinel(partition: usize) -> EncodedRecord {
        EncodedRecord {
            bytes: vec![SENTINEL_BYTE; partition],
        }
    }

    #[inline(always)]
    pub fn partition(&self) -> usize {
        self.bytes.len()
    }

    #[inline(always)]
    pub fn plane(&self, p: usize) -> u8 {
        self.bytes[p]
    }
}

/// Rounds a noisy ring element to the nearest multiple of the scale `2^(32 - plaintext_bit_len)`, and returns the
/// corresponding plaintext, reduced modulo `2^plaintext_bit_len`. Noise of magnitude below half the scale is removed.
#[inline(always)]
pub fn round_to_scale(noisy: u32, plaintext_bit_len: u32) -> u32 {
    let scale_bit_len = u32::BITS - plaintext_bit_len;
    let half_scale = 1u32 << (scale_bit_len - 1);
    let plaintext_mask = ((1u64 << plaintext_bit_len) - 1) as u32;

    (noisy.wrapping_add(half_scale) >> scale_bit_len) & plaintext_mask
}

/// Recovers the database byte carried in the top byte of a noisy ring element.
#[inline(always)]
pub fn decode_byte(noisy: u32) -> u8 {
    round_to_scale(noisy, PLAINTEXT_BIT_LEN) as u8
}

/// Checks whether a decoded record begins with the given key digest. All digest bytes are always inspected.
#[inline]
pub fn starts_with_digest(decoded: &[u8], digest: &[u8; DIGEST_BYTE_LEN]) -> bool {
    decoded.len() >= DIGEST_BYTE_LEN && digest.iter().zip(decoded).fold(0u8, |acc, (&a, &b)| acc | (a ^ b)) == 0
}

#[cfg(test)]
mod test {
    use crate::pir_internals::{
        digest,
        params::{DIGEST_BYTE_LEN, SCALE},
        record::{EncodedRecord, decode_byte, round_to_scale, starts_with_digest},
    };
    use test_case::test_case;

    #[test_case(0, 0; "Zero without noise")]
    #[test_case(SCALE * 0x7f, 0x7f; "Exact multiple of scale")]
    #[test_case((SCALE * 0x42).wrapping_add((SCALE >> 1) - 1), 0x42; "Positive noise just below half the scale")]
    #[test_case((SCALE * 0x42).wrapping_sub(SCALE >> 1), 0x42; "Negative noise of exactly half the scale")]
    #[test_case((SCALE * 0x42).wrapping_add(SCALE >> 1), 0x43; "Positive noise of half the scale rounds up")]
    #[test_case(5u32.wrapping_neg(), 0; "Small negative noise around zero wraps to zero")]
    #[test_case((SCALE * 0xff).wrapping_add(SCALE >> 1), 0; "Rounding past the largest plaintext wraps to zero")]
    fn noisy_top_byte_is_rounded(noisy: u32, expected: u8) {
        assert_eq!(decode_byte(noisy), expected);
    }

    #[test]
    fn rounding_generalizes_to_other_plaintext_widths() {
        // 4 -bit plaintexts are scaled by 2^28.
        let scale = 1u32 << 28;
        assert_eq!(round_to_scale(scale * 9 + (scale >> 2), 4), 9);
        assert_eq!(round_to_scale((scale * 9).wrapping_sub(scale >> 2), 4), 9);
        assert_eq!(round_to_scale((scale * 15).wrapping_add(scale >> 1), 4), 0);
    }

    #[test]
    fn encoded_record_is_digest_then_value() {
        let record = EncodedRecord::encode(b"apple", b"red");

        assert_eq!(record.partition(), DIGEST_BYTE_LEN + 3);
        assert_eq!(record.plane(DIGEST_BYTE_LEN), b'r');
        assert_eq!(record.plane(0), digest::key_digest(b"apple")[0]);
    }

    #[test]
    fn digest_match_requires_every_byte() {
        let digest = digest::key_digest(b"apple");

        let mut decoded = digest.to_vec();
        decoded.extend_from_slice(b"red");
        assert!(starts_with_digest(&decoded, &digest));

        decoded[DIGEST_BYTE_LEN - 1] ^= 1;
        assert!(!starts_with_digest(&decoded, &digest));
        assert!(!starts_with_digest(&digest[..4], &digest));

        let sentinel = (0..DIGEST_BYTE_LEN).map(|p| EncodedRecord::sentinel(DIGEST_BYTE_LEN).plane(p)).collect::<Vec<u8>>();
        assert!(!starts_with_digest(&sentinel, &digest));
    }
}
