//! Fixed-width big-endian wire encoding. Every integer crossing the wire is written as 4 or 8 bytes, most significant
//! byte first; matrices and vectors are flattened row-major, without any header.

/// Serializes a slice of 32 -bit unsigned integers as concatenated big-endian words.
///
/// # Arguments
///
/// * `words` - The words to serialize.
///
/// # Returns
///
/// A byte vector of length `4 * words.len()`.
#[inline]
pub fn u32s_to_be_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_be_bytes()).collect()
}

/// Deserializes concatenated big-endian 32 -bit words.
///
/// # Returns
///
/// `None` if the byte length is not a multiple of 4, otherwise the decoded words.
#[inline]
pub fn u32s_from_be_bytes(bytes: &[u8]) -> Option<Vec<u32>> {
    if bytes.len() % std::mem::size_of::<u32>() != 0 {
        return None;
    }

    Some(
        bytes
            .chunks_exact(std::mem::size_of::<u32>())
            .map(|word| u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
            .collect(),
    )
}

/// Appends big-endian encoded integers to a growing byte buffer.
#[derive(Default)]
pub struct ByteWriter {
    bytes: Vec<u8>,
}

impl ByteWriter {
    pub fn put_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.bytes.extend_from_slice(&v.to_be_bytes());
    }

    pub fn put_f64(&mut self, v: f64) {
        self.put_u64(v.to_bits());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

/// Cursor over a received byte buffer, reading big-endian integers. Every read returns `None` once the buffer runs out.
pub struct ByteReader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        ByteReader { bytes, offset: 0 }
    }

    pub fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(len)?;
        let taken = self.bytes.get(self.offset..end)?;

        self.offset = end;
        Some(taken)
    }

    pub fn get_u32(&mut self) -> Option<u32> {
        self.take(std::mem::size_of::<u32>())?.try_into().ok().map(u32::from_be_bytes)
    }

    pub fn get_u64(&mut self) -> Option<u64> {
        self.take(std::mem::size_of::<u64>())?.try_into().ok().map(u64::from_be_bytes)
    }

    pub fn get_f64(&mut self) -> Option<f64> {
        self.get_u64().map(f64::from_bits)
    }

    pub fn is_exhausted(&self) -> bool {
        self.offset == self.bytes.len()
    }
}
