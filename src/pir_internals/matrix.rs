use super::{branch_opt_util, error::HintPIRError, params::SEED_BYTE_LEN, serialization, vector::Vector};
use rayon::prelude::*;
use std::ops::{Index, IndexMut, Mul};
use turboshake::TurboShake128;

/// Row-major matrix over Z/2^32Z. All arithmetic wraps around.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: u32,
    cols: u32,
    elems: Vec<u32>,
}

impl Matrix {
    /// Creates a new matrix with the given number of rows and columns, s.t. all elements are zero-initialized.
    ///
    /// # Arguments
    ///
    /// * `rows` - The number of rows in the matrix.
    /// * `cols` - The number of columns in the matrix.
    ///
    /// # Returns
    ///
    /// * `Result<Matrix, HintPIRError>` - A new matrix if both `rows` and `cols` are positive, otherwise an error.
    #[cfg(test)]
    pub fn new(rows: u32, cols: u32) -> Result<Matrix, HintPIRError> {
        if branch_opt_util::likely((rows > 0) && (cols > 0)) {
            Ok(Matrix {
                rows,
                cols,
                elems: vec![0; rows as usize * cols as usize],
            })
        } else {
            Err(HintPIRError::InvalidMatrixDimension)
        }
    }

    /// Creates a new matrix with the given number of rows and columns, s.t. elements are initialized with the given values,
    /// laid out in row-major order.
    ///
    /// Returns an error if either `rows` or `cols` is zero, or if the number of values is not `rows * cols`.
    pub fn from_values(rows: u32, cols: u32, values: Vec<u32>) -> Result<Matrix, HintPIRError> {
        if branch_opt_util::likely((rows > 0) && (cols > 0)) {
            if branch_opt_util::likely(rows as usize * cols as usize == values.len()) {
                Ok(Matrix { rows, cols, elems: values })
            } else {
                Err(HintPIRError::InvalidNumberOfElementsInMatrix)
            }
        } else {
            Err(HintPIRError::InvalidMatrixDimension)
        }
    }

    #[inline(always)]
    pub const fn num_rows(&self) -> u32 {
        self.rows
    }
    #[inline(always)]
    pub const fn num_cols(&self) -> u32 {
        self.cols
    }
    #[inline(always)]
    pub fn row(&self, ridx: usize) -> &[u32] {
        let begin = ridx * self.cols as usize;
        &self.elems[begin..begin + self.cols as usize]
    }

    /// Transposes the matrix.
    pub fn transpose(&self) -> Matrix {
        let mut elems = vec![0u32; self.elems.len()];

        elems.par_chunks_exact_mut(self.rows as usize).enumerate().for_each(|(ridx, res_row)| {
            res_row.iter_mut().enumerate().for_each(|(cidx, v)| {
                *v = self[(cidx, ridx)];
            });
        });

        Matrix {
            rows: self.cols,
            cols: self.rows,
            elems,
        }
    }

    /// Generates a matrix with the given dimensions from a SEED_BYTE_LEN -byte public seed using TurboSHAKE128 xof.
    /// Both parties derive the same matrix from the same seed, so the matrix itself never travels over the wire.
    ///
    /// Elements are read from the xof output as little-endian 32 -bit words, independent of host endianness.
    pub fn generate_from_seed(rows: u32, cols: u32, seed: &[u8; SEED_BYTE_LEN]) -> Result<Matrix, HintPIRError> {
        if branch_opt_util::unlikely(rows == 0 || cols == 0) {
            return Err(HintPIRError::InvalidMatrixDimension);
        }

        let mut hasher = TurboShake128::default();
        hasher.absorb(seed);
        hasher.finalize::<{ TurboShake128::DEFAULT_DOMAIN_SEPARATOR }>();

        let num_elems = rows as usize * cols as usize;
        let mut elem_bytes = vec![0u8; num_elems * std::mem::size_of::<u32>()];
        hasher.squeeze(&mut elem_bytes);

        let elems = elem_bytes
            .chunks_exact(std::mem::size_of::<u32>())
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect::<Vec<u32>>();

        Matrix::from_values(rows, cols, elems)
    }

    /// Computes `M · v`, for a column vector `v` of length equal to number of columns of `M`.
    /// The resulting vector has as many elements as there are rows in `M`.
    pub fn mul_vec(&self, vector: &Vector) -> Result<Vector, HintPIRError> {
        if branch_opt_util::unlikely(self.cols as usize != vector.len()) {
            return Err(HintPIRError::IncompatibleDimensionForMatrixVectorMultiplication);
        }

        let rhs = vector.as_slice();
        let res_elems = self
            .elems
            .par_chunks_exact(self.cols as usize)
            .map(|row| row.iter().zip(rhs).fold(0u32, |acc, (&a, &b)| acc.wrapping_add(a.wrapping_mul(b))))
            .collect::<Vec<u32>>();

        Vector::from_values(res_elems)
    }

    /// Computes `vᵗ · M`, for a row vector `v` of length equal to number of rows of `M`.
    /// The resulting vector has as many elements as there are columns in `M`.
    ///
    /// Rows of `M` are streamed one after another, which keeps memory access sequential. Callers are expected to
    /// parallelize across independent matrices.
    pub fn left_mul(&self, vector: &Vector) -> Result<Vector, HintPIRError> {
        if branch_opt_util::unlikely(self.rows as usize != vector.len()) {
            return Err(HintPIRError::IncompatibleDimensionForVectorMatrixMultiplication);
        }

        let mut res_elems = vec![0u32; self.cols as usize];

        self.elems.chunks_exact(self.cols as usize).zip(vector.as_slice()).for_each(|(row, &scalar)| {
            if scalar == 0 {
                return;
            }

            res_elems.iter_mut().zip(row).for_each(|(acc, &elem)| {
                *acc = acc.wrapping_add(elem.wrapping_mul(scalar));
            });
        });

        Vector::from_values(res_elems)
    }

    /// Serializes the matrix as a sequence of rows, each being `cols` 32 -bit big-endian integers. No header is written,
    /// the receiver is expected to know the dimensions.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        serialization::u32s_to_be_bytes(&self.elems)
    }

    /// Deserializes a matrix of known dimension, which was serialized using `to_be_bytes`.
    pub fn from_be_bytes(rows: u32, cols: u32, bytes: &[u8]) -> Result<Matrix, HintPIRError> {
        let expected_byte_len = rows as usize * cols as usize * std::mem::size_of::<u32>();
        if branch_opt_util::unlikely(bytes.len() != expected_byte_len) {
            return Err(HintPIRError::InvalidNumberOfElementsInMatrix);
        }

        let elems = serialization::u32s_from_be_bytes(bytes).ok_or(HintPIRError::InvalidNumberOfElementsInMatrix)?;
        Matrix::from_values(rows, cols, elems)
    }

    /// Creates a new identity matrix of requested dimension.
    #[cfg(test)]
    pub fn identity(rows: u32) -> Result<Matrix, HintPIRError> {
        let mut mat = Matrix::new(rows, rows)?;

        (0..mat.rows as usize).for_each(|idx| {
            mat[(idx, idx)] = 1;
        });

        Ok(mat)
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = u32;

    #[inline(always)]
    fn index(&self, index: (usize, usize)) -> &Self::Output {
        let (ridx, cidx) = index;
        &self.elems[ridx * self.cols as usize + cidx]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    #[inline(always)]
    fn index_mut(&mut self, index: (usize, usize)) -> &mut Self::Output {
        let (ridx, cidx) = index;
        &mut self.elems[ridx * self.cols as usize + cidx]
    }
}

impl Mul for Matrix {
    type Output = Result<Matrix, HintPIRError>;

    #[inline(always)]
    fn mul(self, rhs: Self) -> Self::Output {
        &self * &rhs
    }
}

impl<'b> Mul<&'b Matrix> for &Matrix {
    type Output = Result<Matrix, HintPIRError>;

    fn mul(self, rhs: &'b Matrix) -> Self::Output {
        if branch_opt_util::unlikely(self.cols != rhs.rows) {
            return Err(HintPIRError::IncompatibleDimensionForMatrixMultiplication);
        }

        let res_num_cols = rhs.cols as usize;
        let mut res_elems = vec![0u32; self.rows as usize * res_num_cols];

        // Row `i` of the product is the linear combination of rows of `rhs`, weighted by row `i` of `self`.
        res_elems.par_chunks_exact_mut(res_num_cols).enumerate().for_each(|(r_idx, res_row)| {
            self.row(r_idx).iter().enumerate().for_each(|(k, &lhs_elem)| {
                if lhs_elem == 0 {
                    return;
                }

                res_row.iter_mut().zip(rhs.row(k)).for_each(|(acc, &rhs_elem)| {
                    *acc = acc.wrapping_add(lhs_elem.wrapping_mul(rhs_elem));
                });
            });
        });

        Matrix::from_values(self.rows, rhs.cols, res_elems)
    }
}

#[cfg(test)]
pub mod test {
    use crate::pir_internals::{error::HintPIRError, matrix::Matrix, params::SEED_BYTE_LEN, vector::Vector};
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;
    use test_case::test_case;

    #[test_case(1024, 1024 => matches Ok(_);  "Non-zero number of rows and columns are valid")]
    #[test_case(0, 1024 => matches Err(HintPIRError::InvalidMatrixDimension);  "Number of rows must be greater than zero")]
    #[test_case(1024, 0 => matches Err(HintPIRError::InvalidMatrixDimension);  "Number of columns must be greater than zero")]
    #[test_case(0, 0 => matches Err(HintPIRError::InvalidMatrixDimension);  "Both number of rows and columns must be greater than zero")]
    fn new_empty_matrix_constructor_api(num_rows: u32, num_cols: u32) -> Result<Matrix, HintPIRError> {
        Matrix::new(num_rows, num_cols)
    }

    #[test_case(16, 16, vec![0u32; 256] => matches Ok(_);  "Non-zero number of rows and columns are valid")]
    #[test_case(0, 16, vec![] => matches Err(HintPIRError::InvalidMatrixDimension);  "Number of rows must be greater than zero")]
    #[test_case(16, 0, vec![] => matches Err(HintPIRError::InvalidMatrixDimension);  "Number of columns must be greater than zero")]
    #[test_case(16, 16, vec![0u32; 255] => matches Err(HintPIRError::InvalidNumberOfElementsInMatrix);  "Number of elements must be equal to number of rows times number of columns")]
    fn from_values_matrix_constructor_api(num_rows: u32, num_cols: u32, elems: Vec<u32>) -> Result<Matrix, HintPIRError> {
        Matrix::from_values(num_rows, num_cols, elems)
    }

    #[test_case((64, 1), (1, 64) => matches Ok(_); "Matrix multiplication should work for valid dimensions")]
    #[test_case((64, 1), (64, 1) => matches Err(HintPIRError::IncompatibleDimensionForMatrixMultiplication); "Matrix multiplication should not work for incompatible dimensions")]
    fn matrix_multiplication_failures(lhs_mat_dim: (u32, u32), rhs_mat_dim: (u32, u32)) -> Result<Matrix, HintPIRError> {
        let lhs_mat = Matrix::new(lhs_mat_dim.0, lhs_mat_dim.1)?;
        let rhs_mat = Matrix::new(rhs_mat_dim.0, rhs_mat_dim.1)?;

        lhs_mat * rhs_mat
    }

    #[test]
    fn matrix_multiplication_is_correct() {
        const NUM_ATTEMPT_MATRIX_MULTIPLICATIONS: usize = 20;
        const MIN_MATRIX_DIM: u32 = 1;
        const MAX_MATRIX_DIM: u32 = 256;

        let mut rng = ChaCha8Rng::from_os_rng();

        let mut seed = [0u8; SEED_BYTE_LEN];
        rng.fill_bytes(&mut seed);

        for _ in 0..NUM_ATTEMPT_MATRIX_MULTIPLICATIONS {
            let num_rows = rng.random_range(MIN_MATRIX_DIM..=MAX_MATRIX_DIM);
            let num_cols = rng.random_range(MIN_MATRIX_DIM..=MAX_MATRIX_DIM);

            let matrix_a = Matrix::generate_from_seed(num_rows, num_cols, &seed).expect("Matrix must be generated from seed");
            let matrix_i = Matrix::identity(num_cols).expect("Identity matrix must be created");
            let matrix_i_prime = Matrix::identity(num_rows).expect("Identity matrix must be created");

            assert_eq!(matrix_a, (&matrix_a * &matrix_i).expect("Matrix multiplication must pass"));
            assert_eq!(matrix_a, (&matrix_i_prime * &matrix_a).expect("Matrix multiplication must pass"));
        }
    }

    #[test]
    fn matrix_multiplication_wraps_around() {
        let lhs = Matrix::from_values(1, 2, vec![u32::MAX, 2]).unwrap();
        let rhs = Matrix::from_values(2, 1, vec![3, 1u32 << 31]).unwrap();

        // (2^32 - 1) * 3 + 2 * 2^31 = 3 * 2^32 - 3 + 2^32 ≡ -3 (mod 2^32)
        let res = (&lhs * &rhs).unwrap();
        assert_eq!(res[(0, 0)], 3u32.wrapping_neg());
    }

    #[test]
    fn matrix_vector_products_agree_with_naive_computation() {
        let mut rng = ChaCha8Rng::from_os_rng();

        for _ in 0..20 {
            let num_rows = rng.random_range(1..=128u32);
            let num_cols = rng.random_range(1..=128u32);

            let mut seed = [0u8; SEED_BYTE_LEN];
            rng.fill_bytes(&mut seed);

            let mat = Matrix::generate_from_seed(num_rows, num_cols, &seed).unwrap();
            let col_vec = Vector::from_values((0..num_cols).map(|_| rng.random::<u32>()).collect()).unwrap();
            let row_vec = Vector::from_values((0..num_rows).map(|_| rng.random::<u32>()).collect()).unwrap();

            let expected_mv = (0..num_rows as usize)
                .map(|r| (0..num_cols as usize).fold(0u32, |acc, c| acc.wrapping_add(mat[(r, c)].wrapping_mul(col_vec[c]))))
                .collect::<Vec<u32>>();
            let expected_vm = (0..num_cols as usize)
                .map(|c| (0..num_rows as usize).fold(0u32, |acc, r| acc.wrapping_add(mat[(r, c)].wrapping_mul(row_vec[r]))))
                .collect::<Vec<u32>>();

            assert_eq!(mat.mul_vec(&col_vec).unwrap().as_slice(), expected_mv.as_slice());
            assert_eq!(mat.left_mul(&row_vec).unwrap().as_slice(), expected_vm.as_slice());

            // vᵗ · M = Mᵗ · v
            assert_eq!(mat.left_mul(&row_vec).unwrap(), mat.transpose().mul_vec(&row_vec).unwrap());
        }
    }

    #[test_case(4, 3, 3 => matches Ok(_); "Vector length matching number of columns")]
    #[test_case(4, 3, 4 => matches Err(HintPIRError::IncompatibleDimensionForMatrixVectorMultiplication); "Vector length matching number of rows")]
    #[test_case(4, 3, 5 => matches Err(HintPIRError::IncompatibleDimensionForMatrixVectorMultiplication); "Vector length matching neither dimension")]
    fn matrix_vector_dimension_checks(num_rows: u32, num_cols: u32, vec_len: usize) -> Result<Vector, HintPIRError> {
        let mat = Matrix::new(num_rows, num_cols)?;
        let vec = Vector::new(vec_len)?;

        mat.mul_vec(&vec)
    }

    #[test_case(4, 3, 4 => matches Ok(_); "Vector length matching number of rows")]
    #[test_case(4, 3, 3 => matches Err(HintPIRError::IncompatibleDimensionForVectorMatrixMultiplication); "Vector length matching number of columns")]
    #[test_case(4, 3, 5 => matches Err(HintPIRError::IncompatibleDimensionForVectorMatrixMultiplication); "Vector length matching neither dimension")]
    fn vector_matrix_dimension_checks(num_rows: u32, num_cols: u32, vec_len: usize) -> Result<Vector, HintPIRError> {
        let mat = Matrix::new(num_rows, num_cols)?;
        let vec = Vector::new(vec_len)?;

        mat.left_mul(&vec)
    }

    #[test]
    fn transpose_twice_is_identity() {
        let mut seed = [0u8; SEED_BYTE_LEN];
        ChaCha8Rng::from_os_rng().fill_bytes(&mut seed);

        let mat = Matrix::generate_from_seed(37, 91, &seed).unwrap();
        let transposed = mat.transpose();

        assert_eq!(transposed.num_rows(), 91);
        assert_eq!(transposed.num_cols(), 37);
        assert_eq!(transposed[(5, 7)], mat[(7, 5)]);
        assert_eq!(transposed.transpose(), mat);
    }

    #[test]
    fn matrix_generated_from_same_seed_is_same() {
        let seed_a = [7u8; SEED_BYTE_LEN];
        let seed_b = [8u8; SEED_BYTE_LEN];

        let mat_a = Matrix::generate_from_seed(64, 32, &seed_a).unwrap();
        let mat_a_prime = Matrix::generate_from_seed(64, 32, &seed_a).unwrap();
        let mat_b = Matrix::generate_from_seed(64, 32, &seed_b).unwrap();

        assert_eq!(mat_a, mat_a_prime);
        assert_ne!(mat_a, mat_b);
    }

    #[test]
    fn big_endian_serialized_matrix_can_be_deserialized() {
        let mat = Matrix::from_values(2, 2, vec![0x01020304, 5, 6, 0xffffffff]).unwrap();
        let bytes = mat.to_be_bytes();

        assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
        assert_eq!(Matrix::from_be_bytes(2, 2, &bytes), Ok(mat));
        assert_eq!(Matrix::from_be_bytes(2, 3, &bytes), Err(HintPIRError::InvalidNumberOfElementsInMatrix));
        assert_eq!(Matrix::from_be_bytes(2, 2, &bytes[1..]), Err(HintPIRError::InvalidNumberOfElementsInMatrix));
    }
}
