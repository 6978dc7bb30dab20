//! Placement of records inside the database matrix. The server decides, for every `(row, column)` slot, which record (if
//! any) it holds, and publishes just enough for the client to find the column of a key. The client never learns rows:
//! it reads back a whole column and recognizes its record by the key digest.

use super::{
    branch_opt_util, digest,
    error::HintPIRError,
    hash_bin::HashBin,
    learned_index::LearnedIndex,
    params::{EPSILON, EPSILON_RECURSIVE, HASH_KEY_BYTE_LEN, HEAD_GUARD_ROWS, TAIL_GUARD_ROWS},
    serialization::{ByteReader, ByteWriter},
};
use crate::config::{LayoutKind, PirConfig};
use rand::prelude::*;

const HASH_BIN_PARAMS_BYTE_LEN: usize = HASH_KEY_BYTE_LEN + std::mem::size_of::<u32>();

/// Rows per column in the learned index layout: `dataRows` own rows plus the guard rows on both sides.
///
/// Returns `(dataRows, rows)`.
pub fn learned_index_geometry(num_records: usize, columns: usize) -> (usize, usize) {
    let data_rows = num_records.div_ceil(columns).max(EPSILON + 2);
    (data_rows, HEAD_GUARD_ROWS + data_rows + TAIL_GUARD_ROWS)
}

/// Server-side view of the row layout.
pub struct RowLayout {
    rows: usize,
    columns: usize,
    /// Row-major, `slots[row * columns + column]` is the index of the record placed there.
    slots: Vec<Option<usize>>,
    params: Vec<u8>,
}

impl RowLayout {
    /// Places the records identified by `keys`, in the given order, using the strategy selected in `config`.
    /// Returned slots refer to positions in `keys`.
    pub fn build<R: CryptoRng + ?Sized>(config: &PirConfig, keys: &[&[u8]], rng: &mut R) -> Result<RowLayout, HintPIRError> {
        if branch_opt_util::unlikely(keys.is_empty()) {
            return Err(HintPIRError::EmptyKVDatabase);
        }

        match config.layout() {
            LayoutKind::HashBin => Self::build_hash_bin(config.columns(), keys, rng),
            LayoutKind::LearnedIndex => Self::build_learned_index(config.columns(), keys),
        }
    }

    fn build_hash_bin<R: CryptoRng + ?Sized>(columns: usize, keys: &[&[u8]], rng: &mut R) -> Result<RowLayout, HintPIRError> {
        let mut hash_key = [0u8; HASH_KEY_BYTE_LEN];
        rng.fill_bytes(&mut hash_key);

        let mut hash_bin = HashBin::new(hash_key, columns);
        keys.iter().enumerate().for_each(|(record_idx, key)| hash_bin.insert(key, record_idx));

        let rows = hash_bin.max_bin_size();
        let max_bin_size = u32::try_from(rows).map_err(|_| HintPIRError::InvalidMatrixDimension)?;

        let mut slots = vec![None; rows * columns];
        for (column, bin) in hash_bin.into_bins().into_iter().enumerate() {
            for (row, record_idx) in bin.into_iter().enumerate() {
                slots[row * columns + column] = Some(record_idx);
            }
        }

        let mut writer = ByteWriter::default();
        writer.put_bytes(&hash_key);
        writer.put_u32(max_bin_size);

        Ok(RowLayout {
            rows,
            columns,
            slots,
            params: writer.finish(),
        })
    }

    fn build_learned_index(columns: usize, keys: &[&[u8]]) -> Result<RowLayout, HintPIRError> {
        let num_records = keys.len();

        let mut by_digest = keys
            .iter()
            .enumerate()
            .map(|(record_idx, key)| (digest::numeric_key_digest(key), record_idx))
            .collect::<Vec<(u64, usize)>>();
        by_digest.sort_by_key(|&(digest, _)| digest);

        let sorted_digests = by_digest.iter().map(|&(digest, _)| digest).collect::<Vec<u64>>();
        let index = LearnedIndex::build(&sorted_digests, EPSILON, EPSILON_RECURSIVE)?;

        let (data_rows, rows) = learned_index_geometry(num_records, columns);

        // Row `r` of column `c` holds sorted position `c * dataRows + r - HEAD_GUARD_ROWS`, so that neighbouring columns
        // overlap by the guard rows.
        let mut slots = vec![None; rows * columns];
        for row in 0..rows {
            for column in 0..columns {
                let pos = (column * data_rows + row).checked_sub(HEAD_GUARD_ROWS);
                slots[row * columns + column] = pos.and_then(|pos| by_digest.get(pos)).map(|&(_, record_idx)| record_idx);
            }
        }

        Ok(RowLayout {
            rows,
            columns,
            slots,
            params: index.to_bytes(),
        })
    }

    #[inline(always)]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline(always)]
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Index of the record placed at `(row, column)`, or `None` for an empty slot.
    #[inline(always)]
    pub fn record_at(&self, row: usize, column: usize) -> Option<usize> {
        self.slots[row * self.columns + column]
    }

    /// Public parameters, which the client needs for mapping keys to columns.
    pub fn params(&self) -> &[u8] {
        &self.params
    }
}

/// Client-side view of the row layout, reconstructed from the public parameters.
#[derive(Clone, Debug)]
pub enum ClientLayout {
    HashBin {
        hash_key: [u8; HASH_KEY_BYTE_LEN],
        columns: usize,
        rows: usize,
    },
    LearnedIndex {
        index: LearnedIndex,
        columns: usize,
        data_rows: usize,
        rows: usize,
    },
}

impl ClientLayout {
    pub fn from_params(config: &PirConfig, params: &[u8]) -> Result<ClientLayout, HintPIRError> {
        let columns = config.columns();

        match config.layout() {
            LayoutKind::HashBin => {
                if branch_opt_util::unlikely(params.len() != HASH_BIN_PARAMS_BYTE_LEN) {
                    return Err(HintPIRError::InvalidLayoutParams);
                }

                let mut reader = ByteReader::new(params);
                let hash_key = reader
                    .take(HASH_KEY_BYTE_LEN)
                    .and_then(|bytes| <[u8; HASH_KEY_BYTE_LEN]>::try_from(bytes).ok())
                    .ok_or(HintPIRError::InvalidLayoutParams)?;
                let rows = reader.get_u32().ok_or(HintPIRError::InvalidLayoutParams)? as usize;

                // Every record lands in some bin, so no bin can be larger than the database.
                if branch_opt_util::unlikely(rows == 0 || rows > config.num_records()) {
                    return Err(HintPIRError::InvalidLayoutParams);
                }

                Ok(ClientLayout::HashBin { hash_key, columns, rows })
            }
            LayoutKind::LearnedIndex => {
                let index = LearnedIndex::from_bytes(params)?;
                if branch_opt_util::unlikely(index.num_keys() != config.num_records() || index.epsilon() != EPSILON) {
                    return Err(HintPIRError::InvalidLearnedIndexBytes);
                }

                let (data_rows, rows) = learned_index_geometry(config.num_records(), columns);
                Ok(ClientLayout::LearnedIndex {
                    index,
                    columns,
                    data_rows,
                    rows,
                })
            }
        }
    }

    #[inline(always)]
    pub fn rows(&self) -> usize {
        match self {
            ClientLayout::HashBin { rows, .. } | ClientLayout::LearnedIndex { rows, .. } => *rows,
        }
    }

    #[inline(always)]
    pub fn columns(&self) -> usize {
        match self {
            ClientLayout::HashBin { columns, .. } | ClientLayout::LearnedIndex { columns, .. } => *columns,
        }
    }

    /// Column which holds `key`, if it is in the database. For a key the learned index can rule out, a uniformly random
    /// column is returned, so that the query looks no different.
    pub fn column_of<R: Rng + ?Sized>(&self, key: &[u8], rng: &mut R) -> usize {
        match self {
            ClientLayout::HashBin { hash_key, columns, .. } => HashBin::bin_of(hash_key, *columns, key),
            ClientLayout::LearnedIndex {
                index, columns, data_rows, ..
            } => match index.search(digest::numeric_key_digest(key)) {
                Some(guess) => (guess / data_rows).min(columns - 1),
                None => rng.random_range(0..*columns),
            },
        }
    }
}

#[cfg(test)]
mod test {
    use crate::{
        config::{LayoutKind, LweParams, PirConfig},
        pir_internals::{
            digest,
            error::HintPIRError,
            layout::{ClientLayout, RowLayout, learned_index_geometry},
            params::{EPSILON, HEAD_GUARD_ROWS, TAIL_GUARD_ROWS},
        },
    };
    use rand::prelude::*;
    use rand_chacha::{ChaCha8Rng, ChaCha20Rng};
    use std::collections::HashSet;
    use test_case::test_case;

    fn random_keys(num_keys: usize) -> Vec<Vec<u8>> {
        let mut rng = ChaCha8Rng::from_os_rng();

        (0..num_keys)
            .map(|_| {
                let mut key = vec![0u8; 32];
                rng.fill_bytes(&mut key);
                key
            })
            .collect()
    }

    fn config(num_records: usize, layout: LayoutKind) -> PirConfig {
        PirConfig::new(num_records, 16, LweParams::default(), layout).expect("Valid configuration")
    }

    #[test_case(LayoutKind::HashBin, 1; "Hash-bin, single record")]
    #[test_case(LayoutKind::HashBin, 1000; "Hash-bin, 1000 records")]
    #[test_case(LayoutKind::LearnedIndex, 5; "Learned index, just above error bound")]
    #[test_case(LayoutKind::LearnedIndex, 1000; "Learned index, 1000 records")]
    #[test_case(LayoutKind::LearnedIndex, 20_000; "Learned index, 20k records")]
    fn every_key_is_found_in_its_predicted_column(layout: LayoutKind, num_records: usize) {
        let config = config(num_records, layout);
        let keys = random_keys(num_records);
        let key_refs = keys.iter().map(Vec::as_slice).collect::<Vec<&[u8]>>();

        let mut rng = ChaCha20Rng::from_os_rng();
        let server_layout = RowLayout::build(&config, &key_refs, &mut rng).expect("Layout must be built");
        let client_layout = ClientLayout::from_params(&config, server_layout.params()).expect("Params must be parsed");

        assert_eq!(server_layout.columns(), client_layout.columns());
        assert_eq!(server_layout.rows(), client_layout.rows());

        for (record_idx, key) in key_refs.iter().enumerate() {
            let column = client_layout.column_of(key, &mut rng);
            assert!((0..server_layout.rows()).any(|row| server_layout.record_at(row, column) == Some(record_idx)));
        }
    }

    #[test]
    fn hash_bin_layout_places_each_record_once() {
        let config = config(1000, LayoutKind::HashBin);
        let keys = random_keys(1000);
        let key_refs = keys.iter().map(Vec::as_slice).collect::<Vec<&[u8]>>();

        let layout = RowLayout::build(&config, &key_refs, &mut ChaCha20Rng::from_os_rng()).unwrap();

        let layout = &layout;
        let placed = (0..layout.rows())
            .flat_map(|row| (0..layout.columns()).filter_map(move |column| layout.record_at(row, column)))
            .collect::<Vec<usize>>();

        assert_eq!(placed.len(), 1000);
        assert_eq!(placed.into_iter().collect::<HashSet<usize>>().len(), 1000);
    }

    #[test]
    fn learned_index_columns_mirror_neighbours_in_guard_rows() {
        const NUM_RECORDS: usize = 1000;

        let config = config(NUM_RECORDS, LayoutKind::LearnedIndex);
        let keys = random_keys(NUM_RECORDS);
        let key_refs = keys.iter().map(Vec::as_slice).collect::<Vec<&[u8]>>();

        let layout = RowLayout::build(&config, &key_refs, &mut ChaCha20Rng::from_os_rng()).unwrap();
        let (data_rows, rows) = learned_index_geometry(NUM_RECORDS, config.columns());

        assert_eq!(layout.rows(), rows);
        assert_eq!(rows, data_rows + 2 * EPSILON + 3);

        let mut sorted = (0..NUM_RECORDS).collect::<Vec<usize>>();
        sorted.sort_by_key(|&idx| digest::numeric_key_digest(&keys[idx]));

        for column in 0..layout.columns() {
            for row in 0..rows {
                let pos = (column * data_rows + row) as isize - HEAD_GUARD_ROWS as isize;
                let expected = (0..NUM_RECORDS as isize).contains(&pos).then(|| sorted[pos as usize]);

                assert_eq!(layout.record_at(row, column), expected, "column = {}, row = {}", column, row);
            }
        }

        // First column's head guard and last column's tail guard are empty.
        assert!((0..HEAD_GUARD_ROWS).all(|row| layout.record_at(row, 0).is_none()));
        assert!((rows - TAIL_GUARD_ROWS..rows).all(|row| layout.record_at(row, layout.columns() - 1).is_none()));
    }

    #[test]
    fn any_prediction_within_epsilon_lands_in_a_column_holding_the_record() {
        const NUM_RECORDS: usize = 2000;

        let config = config(NUM_RECORDS, LayoutKind::LearnedIndex);
        let keys = random_keys(NUM_RECORDS);
        let key_refs = keys.iter().map(Vec::as_slice).collect::<Vec<&[u8]>>();

        let layout = RowLayout::build(&config, &key_refs, &mut ChaCha20Rng::from_os_rng()).unwrap();
        let (data_rows, _) = learned_index_geometry(NUM_RECORDS, config.columns());

        let mut sorted = (0..NUM_RECORDS).collect::<Vec<usize>>();
        sorted.sort_by_key(|&idx| digest::numeric_key_digest(&keys[idx]));

        for (pos, &record_idx) in sorted.iter().enumerate() {
            let lo = pos.saturating_sub(EPSILON);
            let hi = (pos + EPSILON).min(NUM_RECORDS - 1);

            for guess in lo..=hi {
                let column = guess / data_rows;
                assert!(
                    (0..layout.rows()).any(|row| layout.record_at(row, column) == Some(record_idx)),
                    "pos = {}, guess = {}",
                    pos,
                    guess
                );
            }
        }
    }

    #[test]
    fn keys_outside_learned_index_range_get_random_columns() {
        const NUM_RECORDS: usize = 1000;

        let mut keys = random_keys(3 * NUM_RECORDS);
        keys.sort_by_key(|key| digest::numeric_key_digest(key));

        let (below, rest) = keys.split_at(NUM_RECORDS);
        let (indexed, above) = rest.split_at(NUM_RECORDS);
        let key_refs = indexed.iter().map(Vec::as_slice).collect::<Vec<&[u8]>>();

        let config = config(NUM_RECORDS, LayoutKind::LearnedIndex);
        let mut rng = ChaCha20Rng::from_os_rng();

        let server_layout = RowLayout::build(&config, &key_refs, &mut rng).unwrap();
        let client_layout = ClientLayout::from_params(&config, server_layout.params()).unwrap();
        let columns = client_layout.columns();

        for key in [below.first(), below.last(), above.first(), above.last()].into_iter().flatten() {
            let picked = (0..64).map(|_| client_layout.column_of(key, &mut rng)).collect::<HashSet<usize>>();

            assert!(picked.iter().all(|&column| column < columns));
            assert!(picked.len() > 1, "column of an out-of-range key must not be fixed");
        }
    }

    #[test]
    fn malformed_hash_bin_params_are_rejected() {
        let config = config(1000, LayoutKind::HashBin);

        let mut params = vec![0u8; 16];
        params.extend_from_slice(&7u32.to_be_bytes());
        assert!(ClientLayout::from_params(&config, &params).is_ok());

        assert!(matches!(ClientLayout::from_params(&config, &params[..19]), Err(HintPIRError::InvalidLayoutParams)));

        let mut zero_rows = vec![0u8; 16];
        zero_rows.extend_from_slice(&0u32.to_be_bytes());
        assert!(matches!(ClientLayout::from_params(&config, &zero_rows), Err(HintPIRError::InvalidLayoutParams)));

        let mut too_many_rows = vec![0u8; 16];
        too_many_rows.extend_from_slice(&1001u32.to_be_bytes());
        assert!(matches!(ClientLayout::from_params(&config, &too_many_rows), Err(HintPIRError::InvalidLayoutParams)));
    }

    #[test]
    fn learned_index_params_must_match_configured_record_count() {
        let keys = random_keys(100);
        let key_refs = keys.iter().map(Vec::as_slice).collect::<Vec<&[u8]>>();

        let layout = RowLayout::build(&config(100, LayoutKind::LearnedIndex), &key_refs, &mut ChaCha20Rng::from_os_rng()).unwrap();

        assert!(matches!(
            ClientLayout::from_params(&config(101, LayoutKind::LearnedIndex), layout.params()),
            Err(HintPIRError::InvalidLearnedIndexBytes)
        ));
        assert!(matches!(
            ClientLayout::from_params(&config(100, LayoutKind::LearnedIndex), &layout.params()[1..]),
            Err(HintPIRError::InvalidLearnedIndexBytes)
        ));
    }
}
