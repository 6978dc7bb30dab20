use super::params::{DIGEST_BYTE_LEN, HASH_KEY_BYTE_LEN};
use turboshake::TurboShake128;

const KEY_DIGEST_DOMAIN_SEPARATOR: u8 = 0x0b;
const BIN_PRF_DOMAIN_SEPARATOR: u8 = 0x0c;

/// Computes the unkeyed DIGEST_BYTE_LEN -byte digest of a key, using TurboSHAKE128 xof. It is prepended to every
/// encoded record, so that the client can tell which of the rows in a column holds the queried key.
#[inline]
pub fn key_digest(key: &[u8]) -> [u8; DIGEST_BYTE_LEN] {
    let mut hasher = TurboShake128::default();
    hasher.absorb(key);
    hasher.finalize::<KEY_DIGEST_DOMAIN_SEPARATOR>();

    let mut digest = [0u8; DIGEST_BYTE_LEN];
    hasher.squeeze(&mut digest);

    digest
}

/// Interprets the key digest as a big-endian 64 -bit integer. The learned index orders keys by this number.
#[inline]
pub fn numeric_key_digest(key: &[u8]) -> u64 {
    u64::from_be_bytes(key_digest(key))
}

/// Keyed pseudorandom function mapping a key to a 64 -bit integer, by absorbing `hash_key || key` into TurboSHAKE128.
#[inline]
pub fn keyed_prf(hash_key: &[u8; HASH_KEY_BYTE_LEN], key: &[u8]) -> u64 {
    let mut hasher = TurboShake128::default();
    hasher.absorb(hash_key);
    hasher.absorb(key);
    hasher.finalize::<BIN_PRF_DOMAIN_SEPARATOR>();

    let mut word = [0u8; std::mem::size_of::<u64>()];
    hasher.squeeze(&mut word);

    u64::from_be_bytes(word)
}
