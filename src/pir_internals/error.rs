use std::{error::Error, fmt::Display};

#[derive(Debug, PartialEq)]
pub enum HintPIRError {
    // Matrix and vector
    InvalidMatrixDimension,
    IncompatibleDimensionForMatrixMultiplication,
    IncompatibleDimensionForMatrixVectorMultiplication,
    IncompatibleDimensionForVectorMatrixMultiplication,
    IncompatibleDimensionForVectorArithmetic,
    InvalidNumberOfElementsInMatrix,
    InvalidNumberOfElementsInVector,
    IndexOutOfBoundsInVector,

    // Configuration
    NonPositiveRecordCount,
    NonPositiveValueByteLength,
    InvalidLweDimension,
    InvalidGaussianSigma(f64),
    EpsilonExceedsDatasetSize { epsilon: usize, num_records: usize },
    EmptyKVDatabase,
    RecordCountMismatch { expected: usize, found: usize },
    ValueLengthMismatch { expected: usize, found: usize },

    // Protocol
    InvalidLayoutParams,
    InvalidLearnedIndexBytes,
    InvalidSeedLength,
    InvalidHintMatrix,
    InvalidQueryVector,
    InvalidResponseVector,
    StaleDatabaseVersion { requested: u64, current: u64 },
    TransportFailure(String),
}

impl Display for HintPIRError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidMatrixDimension => write!(f, "The number of rows and columns in the matrix must be non-zero."),
            Self::IncompatibleDimensionForMatrixMultiplication => write!(f, "The matrix dimensions do not allow multiplication."),
            Self::IncompatibleDimensionForMatrixVectorMultiplication => {
                write!(f, "The number of matrix columns must match the vector length for matrix-vector multiplication.")
            }
            Self::IncompatibleDimensionForVectorMatrixMultiplication => {
                write!(f, "The vector length must match the number of matrix rows for vector-matrix multiplication.")
            }
            Self::IncompatibleDimensionForVectorArithmetic => write!(f, "Vectors must have the same length to be added or subtracted."),
            Self::InvalidNumberOfElementsInMatrix => write!(f, "The matrix must have 'rows * columns' elements."),
            Self::InvalidNumberOfElementsInVector => write!(f, "The vector must have exactly the requested number of elements."),
            Self::IndexOutOfBoundsInVector => write!(f, "Index is out of bounds for the vector."),

            Self::NonPositiveRecordCount => write!(f, "Number of records in the key-value database must be positive."),
            Self::NonPositiveValueByteLength => write!(f, "Byte length of values must be positive."),
            Self::InvalidLweDimension => write!(f, "LWE dimension must be positive."),
            Self::InvalidGaussianSigma(sigma) => write!(f, "Gaussian standard deviation must be finite and positive, found {}.", sigma),
            Self::EpsilonExceedsDatasetSize { epsilon, num_records } => {
                write!(f, "Learned index error bound '{}' must not exceed the number of records '{}'.", epsilon, num_records)
            }
            Self::EmptyKVDatabase => write!(f, "Can not encode empty key-value database."),
            Self::RecordCountMismatch { expected, found } => {
                write!(f, "Key-value database was configured with '{}' records, but has '{}'.", expected, found)
            }
            Self::ValueLengthMismatch { expected, found } => write!(f, "Values must be '{}' bytes long, found a value of '{}' bytes.", expected, found),

            Self::InvalidLayoutParams => write!(f, "Received row-layout parameters are malformed."),
            Self::InvalidLearnedIndexBytes => write!(f, "Received learned index can't be deserialized."),
            Self::InvalidSeedLength => write!(f, "Received public seed must be 16 bytes long."),
            Self::InvalidHintMatrix => write!(f, "Unexpected number of elements in hint matrix."),
            Self::InvalidQueryVector => write!(f, "Unexpected dimension of query vector."),
            Self::InvalidResponseVector => write!(f, "Unexpected dimension of response vector."),
            Self::StaleDatabaseVersion { requested, current } => {
                write!(f, "Query addresses database version '{}', but current version is '{}'.", requested, current)
            }
            Self::TransportFailure(e) => write!(f, "Transport failed with: {}", e),
        }
    }
}

impl Error for HintPIRError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
