pub const SEED_BYTE_LEN: usize = 16;
pub const HASH_KEY_BYTE_LEN: usize = 16;
pub const DIGEST_BYTE_LEN: usize = 8;

/// Each database element is a single byte, carried in the most significant byte of a 32 -bit ring element.
pub const PLAINTEXT_BIT_LEN: u32 = 8;
pub const SCALE_BIT_LEN: u32 = u32::BITS - PLAINTEXT_BIT_LEN;
pub const SCALE: u32 = 1u32 << SCALE_BIT_LEN;

/// Maximum prediction error of the learned index, at its leaf level.
pub const EPSILON: usize = 4;
/// Maximum prediction error of the learned index, at its internal levels.
pub const EPSILON_RECURSIVE: usize = 2;

/// Guard rows mirrored from neighbouring columns, on either side, in the learned index layout.
pub const HEAD_GUARD_ROWS: usize = EPSILON + 1;
pub const TAIL_GUARD_ROWS: usize = EPSILON + 2;

pub const SENTINEL_BYTE: u8 = 0xff;

pub const DEFAULT_LWE_DIMENSION: usize = 1024;
pub const DEFAULT_GAUSSIAN_SIGMA: f64 = 6.4;
