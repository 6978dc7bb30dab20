use super::{branch_opt_util, error::HintPIRError, serialization};
use std::ops::{Add, Index, Sub};

/// Vector over Z/2^32Z, used for LWE secrets, queries and responses.
#[derive(Clone, Debug, PartialEq)]
pub struct Vector {
    elems: Vec<u32>,
}

impl Vector {
    /// Creates a zero-initialized vector of the given length. Length must be non-zero.
    #[cfg(test)]
    pub fn new(len: usize) -> Result<Vector, HintPIRError> {
        Self::from_values(vec![0; len])
    }

    pub fn from_values(values: Vec<u32>) -> Result<Vector, HintPIRError> {
        if branch_opt_util::unlikely(values.is_empty()) {
            return Err(HintPIRError::InvalidNumberOfElementsInVector);
        }

        Ok(Vector { elems: values })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    #[inline(always)]
    pub fn as_slice(&self) -> &[u32] {
        &self.elems
    }

    /// Adds `value` to the element at `index`, wrapping around on overflow.
    pub fn add_at(&mut self, index: usize, value: u32) -> Result<(), HintPIRError> {
        let elem = self.elems.get_mut(index).ok_or(HintPIRError::IndexOutOfBoundsInVector)?;
        *elem = elem.wrapping_add(value);

        Ok(())
    }

    pub fn to_be_bytes(&self) -> Vec<u8> {
        serialization::u32s_to_be_bytes(&self.elems)
    }

    /// Deserializes a vector of exactly `len` 32 -bit big-endian integers.
    pub fn from_be_bytes(len: usize, bytes: &[u8]) -> Result<Vector, HintPIRError> {
        if branch_opt_util::unlikely(bytes.len() != len * std::mem::size_of::<u32>()) {
            return Err(HintPIRError::InvalidNumberOfElementsInVector);
        }

        let elems = serialization::u32s_from_be_bytes(bytes).ok_or(HintPIRError::InvalidNumberOfElementsInVector)?;
        Self::from_values(elems)
    }
}

impl Index<usize> for Vector {
    type Output = u32;

    #[inline(always)]
    fn index(&self, index: usize) -> &Self::Output {
        &self.elems[index]
    }
}

impl<'b> Add<&'b Vector> for &Vector {
    type Output = Result<Vector, HintPIRError>;

    fn add(self, rhs: &'b Vector) -> Self::Output {
        if branch_opt_util::unlikely(self.len() != rhs.len()) {
            return Err(HintPIRError::IncompatibleDimensionForVectorArithmetic);
        }

        Vector::from_values(self.elems.iter().zip(&rhs.elems).map(|(&a, &b)| a.wrapping_add(b)).collect())
    }
}

impl<'b> Sub<&'b Vector> for &Vector {
    type Output = Result<Vector, HintPIRError>;

    fn sub(self, rhs: &'b Vector) -> Self::Output {
        if branch_opt_util::unlikely(self.len() != rhs.len()) {
            return Err(HintPIRError::IncompatibleDimensionForVectorArithmetic);
        }

        Vector::from_values(self.elems.iter().zip(&rhs.elems).map(|(&a, &b)| a.wrapping_sub(b)).collect())
    }
}
