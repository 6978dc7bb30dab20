//! Parameters both parties agree on out-of-band, before the offline phase starts. None of them travel over the wire.

use crate::pir_internals::{
    branch_opt_util,
    error::HintPIRError,
    params::{DEFAULT_GAUSSIAN_SIGMA, DEFAULT_LWE_DIMENSION, DIGEST_BYTE_LEN, EPSILON},
};

/// LWE parameters: secret dimension and standard deviation of the discrete Gaussian error distribution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LweParams {
    pub dimension: usize,
    pub sigma: f64,
}

impl Default for LweParams {
    fn default() -> Self {
        LweParams {
            dimension: DEFAULT_LWE_DIMENSION,
            sigma: DEFAULT_GAUSSIAN_SIGMA,
        }
    }
}

/// Strategy used for mapping a key to the column of the database matrix which holds it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutKind {
    /// Keys are spread over columns by a keyed hash. Public parameters are the hash key and the maximum bin size.
    HashBin,
    /// Keys are sorted by digest and placed column after column. Public parameter is a learned index over the digests.
    LearnedIndex,
}

/// Validated configuration of a PIR deployment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PirConfig {
    num_records: usize,
    value_byte_len: usize,
    lwe: LweParams,
    layout: LayoutKind,
}

impl PirConfig {
    /// Validates and creates a new configuration.
    ///
    /// # Arguments
    ///
    /// * `num_records` - Number of key-value pairs in the database. Must be positive.
    /// * `value_byte_len` - Byte length of every value. Must be positive.
    /// * `lwe` - LWE dimension, which must be positive, and Gaussian standard deviation, which must be finite and positive.
    /// * `layout` - Row layout strategy. The learned index layout requires at least as many records as its error bound.
    pub fn new(num_records: usize, value_byte_len: usize, lwe: LweParams, layout: LayoutKind) -> Result<PirConfig, HintPIRError> {
        if branch_opt_util::unlikely(num_records == 0) {
            return Err(HintPIRError::NonPositiveRecordCount);
        }
        if branch_opt_util::unlikely(value_byte_len == 0) {
            return Err(HintPIRError::NonPositiveValueByteLength);
        }
        if branch_opt_util::unlikely(lwe.dimension == 0 || lwe.dimension > u32::MAX as usize) {
            return Err(HintPIRError::InvalidLweDimension);
        }
        if branch_opt_util::unlikely(!(lwe.sigma.is_finite() && lwe.sigma > 0.0)) {
            return Err(HintPIRError::InvalidGaussianSigma(lwe.sigma));
        }
        if branch_opt_util::unlikely(layout == LayoutKind::LearnedIndex && EPSILON > num_records) {
            return Err(HintPIRError::EpsilonExceedsDatasetSize {
                epsilon: EPSILON,
                num_records,
            });
        }

        Ok(PirConfig {
            num_records,
            value_byte_len,
            lwe,
            layout,
        })
    }

    #[inline(always)]
    pub fn num_records(&self) -> usize {
        self.num_records
    }

    #[inline(always)]
    pub fn value_byte_len(&self) -> usize {
        self.value_byte_len
    }

    #[inline(always)]
    pub fn lwe(&self) -> LweParams {
        self.lwe
    }

    #[inline(always)]
    pub fn layout(&self) -> LayoutKind {
        self.layout
    }

    /// Byte length of an encoded record, which is also the number of byte-planes the database is split into.
    #[inline(always)]
    pub fn partition(&self) -> usize {
        self.value_byte_len + DIGEST_BYTE_LEN
    }

    /// Number of columns of every database plane, `⌈√(n · partition)⌉`.
    pub fn columns(&self) -> usize {
        let num_bytes = self.num_records * self.partition();
        let root = num_bytes.isqrt();

        if root * root < num_bytes { root + 1 } else { root }
    }
}
