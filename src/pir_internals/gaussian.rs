//! Discrete Gaussian sampling over Z, for LWE error terms.

use super::{branch_opt_util, error::HintPIRError, vector::Vector};
use rand::prelude::*;

/// Samples are rejected beyond this many standard deviations from the center.
const TAILCUT_IN_SIGMA: f64 = 6.0;

/// Discrete Gaussian sampler over Z, centered at 0, using rejection sampling over `[-⌈6σ⌉, ⌈6σ⌉]`.
#[derive(Clone, Copy, Debug)]
pub struct GaussianSampler {
    sigma: f64,
    tailcut: i64,
}

impl GaussianSampler {
    pub fn new(sigma: f64) -> Result<GaussianSampler, HintPIRError> {
        if branch_opt_util::unlikely(!(sigma.is_finite() && sigma > 0.0)) {
            return Err(HintPIRError::InvalidGaussianSigma(sigma));
        }

        Ok(GaussianSampler {
            sigma,
            tailcut: (sigma * TAILCUT_IN_SIGMA).ceil() as i64,
        })
    }

    /// Samples a single integer from the discrete Gaussian distribution D_σ.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        let two_sigma_sq = 2.0 * self.sigma * self.sigma;

        loop {
            let x = rng.random_range(-self.tailcut..=self.tailcut);
            let acceptance_prob = (-((x * x) as f64) / two_sigma_sq).exp();

            if rng.random::<f64>() < acceptance_prob {
                return x;
            }
        }
    }

    /// Samples a single value from D_σ, represented in Z/2^32Z. Negative values wrap around to the top of the ring.
    #[inline(always)]
    pub fn sample_ring_elem<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        self.sample(rng) as i32 as u32
    }

    /// Samples a vector of `len` independent coordinates, each from D_σ, represented in Z/2^32Z.
    pub fn sample_vector<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Result<Vector, HintPIRError> {
        Vector::from_values((0..len).map(|_| self.sample_ring_elem(rng)).collect())
    }
}
