use super::{digest, params::HASH_KEY_BYTE_LEN};

/// Assigns keys to bins using a keyed pseudorandom function, remembering, for every bin, the order in which its keys arrived.
/// Bins are filled in that order, so the row of a key inside its column is its arrival rank in the bin.
pub struct HashBin {
    hash_key: [u8; HASH_KEY_BYTE_LEN],
    bins: Vec<Vec<usize>>,
}

impl HashBin {
    /// `num_bins` must be non-zero.
    pub fn new(hash_key: [u8; HASH_KEY_BYTE_LEN], num_bins: usize) -> HashBin {
        HashBin {
            hash_key,
            bins: vec![Vec::new(); num_bins],
        }
    }

    #[inline]
    pub fn bin_of(hash_key: &[u8; HASH_KEY_BYTE_LEN], num_bins: usize, key: &[u8]) -> usize {
        (digest::keyed_prf(hash_key, key) % num_bins as u64) as usize
    }

    /// Places the record with index `record_idx`, identified by `key`, at the end of its bin.
    pub fn insert(&mut self, key: &[u8], record_idx: usize) {
        let bin = Self::bin_of(&self.hash_key, self.bins.len(), key);
        self.bins[bin].push(record_idx);
    }

    pub fn max_bin_size(&self) -> usize {
        self.bins.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn into_bins(self) -> Vec<Vec<usize>> {
        self.bins
    }
}
