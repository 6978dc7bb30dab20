use crate::{
    HintPIRError,
    config::PirConfig,
    pir_internals::{
        branch_opt_util, database,
        layout::RowLayout,
        matrix::Matrix,
        params::SEED_BYTE_LEN,
        record::EncodedRecord,
        serialization,
        vector::Vector,
    },
};
use rand::prelude::*;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;
use std::collections::HashMap;

/// Everything the server sends to a client during the offline phase, in the order it is sent.
#[derive(Clone, Debug, PartialEq)]
pub struct OfflineMessages {
    /// Public parameters of the row layout: either `hash key || max bin size`, or the serialized learned index.
    pub layout_params: Vec<u8>,
    /// Seed from which both parties derive the public matrix `A`.
    pub seed: [u8; SEED_BYTE_LEN],
    /// One serialized `rows × dimension` hint matrix per byte-plane.
    pub hints: Vec<Vec<u8>>,
}

/// Represents the server in the hint-based keyword **P**rivate **I**nformation **R**etrieval scheme.
///
/// The server stores every byte-plane of the encoded database in transposed form, to optimize query response time.
#[derive(Clone, Debug)]
pub struct Server {
    config: PirConfig,
    rows: usize,
    columns: usize,
    /// Each plane is kept as a `columns × rows` matrix, so that answering a query streams rows of these matrices.
    transposed_db_planes: Vec<Matrix>,
}

impl Server {
    /// Sets up the keyword **P**rivate **I**nformation **R**etrieval scheme's server with a given key-value database.
    ///
    /// This function involves following steps:
    /// 1. **Database Validation:** The database must hold exactly `config.num_records()` entries, each value being
    ///    `config.value_byte_len()` bytes long.
    /// 2. **Row Layout:** Decides the `(row, column)` slot of every record, using the configured strategy, and computes its
    ///    public parameters.
    /// 3. **Database Encoding:** Every record becomes `digest || value`, and byte `p` of all records forms the `rows × columns`
    ///    plane `DB_p`. Empty slots are filled with the sentinel.
    /// 4. **Public Matrix Generation:** Expands the seed into the `columns × dimension` public matrix `A`.
    /// 5. **Hint Computation:** Computes `hint_p = DB_p · A` for every plane, in parallel.
    /// 6. **Transposition:** Only `DB_pᵗ` is retained, to optimize memory access pattern of `respond`.
    ///
    /// # Arguments
    ///
    /// * `config`: Out-of-band configuration, shared with clients.
    /// * `seed`: Public seed for generating matrix `A`.
    /// * `db`: The key-value database.
    ///
    /// # Returns
    ///
    /// The server, and the offline messages to be sent to every client.
    pub fn setup(config: &PirConfig, seed: &[u8; SEED_BYTE_LEN], db: HashMap<&[u8], &[u8]>) -> Result<(Server, OfflineMessages), HintPIRError> {
        if branch_opt_util::unlikely(db.is_empty()) {
            return Err(HintPIRError::EmptyKVDatabase);
        }
        if branch_opt_util::unlikely(db.len() != config.num_records()) {
            return Err(HintPIRError::RecordCountMismatch {
                expected: config.num_records(),
                found: db.len(),
            });
        }
        if let Some(value) = db.values().find(|value| value.len() != config.value_byte_len()) {
            branch_opt_util::cold();
            return Err(HintPIRError::ValueLengthMismatch {
                expected: config.value_byte_len(),
                found: value.len(),
            });
        }

        let kv_pairs = db.into_iter().collect::<Vec<(&[u8], &[u8])>>();
        let keys = kv_pairs.iter().map(|&(key, _)| key).collect::<Vec<&[u8]>>();

        let mut rng = ChaCha20Rng::from_os_rng();
        let layout = RowLayout::build(config, &keys, &mut rng)?;

        let records = kv_pairs.par_iter().map(|&(key, value)| EncodedRecord::encode(key, value)).collect::<Vec<EncodedRecord>>();
        let db_planes = database::encode_planes(&layout, &records, config.partition())?;

        let columns = u32::try_from(layout.columns()).map_err(|_| HintPIRError::InvalidMatrixDimension)?;
        let pub_mat_a = Matrix::generate_from_seed(columns, config.lwe().dimension as u32, seed)?;

        let hints = db_planes
            .par_iter()
            .map(|db_plane| (db_plane * &pub_mat_a).map(|hint| hint.to_be_bytes()))
            .collect::<Result<Vec<Vec<u8>>, HintPIRError>>()?;

        let transposed_db_planes = db_planes.into_par_iter().map(|db_plane| db_plane.transpose()).collect::<Vec<Matrix>>();

        tracing::info!(
            num_records = config.num_records(),
            partition = config.partition(),
            rows = layout.rows(),
            columns = layout.columns(),
            layout = ?config.layout(),
            "PIR server set up"
        );

        let server = Server {
            config: *config,
            rows: layout.rows(),
            columns: layout.columns(),
            transposed_db_planes,
        };
        let offline = OfflineMessages {
            layout_params: layout.params().to_vec(),
            seed: *seed,
            hints,
        };

        Ok((server, offline))
    }

    /// Responds to a client query.
    ///
    /// The query must be `columns` 32 -bit big-endian integers. For every plane, computes `ans_p = quᵗ · DB_pᵗ`, in parallel
    /// across planes, and returns the `partition` answer vectors, each `rows` elements long, concatenated plane after plane.
    pub fn respond(&self, query: &[u8]) -> Result<Vec<u8>, HintPIRError> {
        let query_vector = Vector::from_be_bytes(self.columns, query).map_err(|_| HintPIRError::InvalidQueryVector)?;

        let answers = self
            .transposed_db_planes
            .par_iter()
            .map(|db_plane| db_plane.left_mul(&query_vector))
            .collect::<Result<Vec<Vector>, HintPIRError>>()?;

        let response_words = answers.iter().flat_map(|answer| answer.as_slice().iter().copied()).collect::<Vec<u32>>();
        Ok(serialization::u32s_to_be_bytes(&response_words))
    }

    #[inline(always)]
    pub fn config(&self) -> &PirConfig {
        &self.config
    }

    #[inline(always)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline(always)]
    pub fn columns(&self) -> usize {
        self.columns
    }
}
