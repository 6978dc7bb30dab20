//! Piecewise-linear learned index over sorted 64 -bit keys, in the spirit of the PGM-index.
//!
//! The leaf level is a sequence of linear segments, each predicting the position of any of its keys within `epsilon`.
//! Every level above indexes the first keys of the level below, with error bound `epsilon_recursive`, until a single
//! segment remains. A lookup walks the levels top-down. At internal levels the predicted window is verified, and a
//! binary search over the level takes over if the window does not hold the right segment, so lookups never depend on
//! floating point rounding for correctness.

use super::{
    branch_opt_util,
    error::HintPIRError,
    serialization::{ByteReader, ByteWriter},
};

const SEGMENT_BYTE_LEN: usize = 3 * std::mem::size_of::<u64>();

#[derive(Clone, Copy, Debug, PartialEq)]
struct Segment {
    first_key: u64,
    slope: f64,
    /// Position of `first_key` in the level below (or in the data, for leaf segments).
    intercept: u64,
}

impl Segment {
    #[inline(always)]
    fn predict(&self, key: u64) -> f64 {
        self.intercept as f64 + self.slope * key.saturating_sub(self.first_key) as f64
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LearnedIndex {
    epsilon: usize,
    epsilon_recursive: usize,
    num_keys: u64,
    first_key: u64,
    last_key: u64,
    /// `levels[0]` is the leaf level, `levels.last()` holds exactly one segment.
    levels: Vec<Vec<Segment>>,
}

impl LearnedIndex {
    /// Builds the index over non-empty, ascending `keys`.
    pub fn build(keys: &[u64], epsilon: usize, epsilon_recursive: usize) -> Result<LearnedIndex, HintPIRError> {
        if branch_opt_util::unlikely(keys.is_empty()) {
            return Err(HintPIRError::EmptyKVDatabase);
        }
        debug_assert!(keys.windows(2).all(|w| w[0] <= w[1]));

        let mut levels = vec![fit_segments(keys, epsilon)];

        while levels[levels.len() - 1].len() > 1 {
            let level_keys = levels[levels.len() - 1].iter().map(|seg| seg.first_key).collect::<Vec<u64>>();
            levels.push(fit_segments(&level_keys, epsilon_recursive));
        }

        Ok(LearnedIndex {
            epsilon,
            epsilon_recursive,
            num_keys: keys.len() as u64,
            first_key: keys[0],
            last_key: keys[keys.len() - 1],
            levels,
        })
    }

    #[inline(always)]
    pub fn epsilon(&self) -> usize {
        self.epsilon
    }

    #[inline(always)]
    pub fn num_keys(&self) -> usize {
        self.num_keys as usize
    }

    #[cfg(test)]
    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Approximate lookup. Returns `None` when `key` lies outside the range of indexed keys, i.e. it is certainly absent.
    /// Otherwise returns a position in `[0, num_keys)`, which, for every indexed key, is within `epsilon` of its position.
    pub fn search(&self, key: u64) -> Option<usize> {
        if key < self.first_key || key > self.last_key {
            return None;
        }

        let mut seg_idx = 0;
        for level in (1..self.levels.len()).rev() {
            let predicted = self.levels[level][seg_idx].predict(key);
            seg_idx = locate_segment(&self.levels[level - 1], key, predicted, self.epsilon_recursive);
        }

        let last_pos = self.num_keys as usize - 1;
        Some(clamp_prediction(self.levels[0][seg_idx].predict(key), last_pos))
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::default();

        writer.put_u32(self.epsilon as u32);
        writer.put_u32(self.epsilon_recursive as u32);
        writer.put_u64(self.num_keys);
        writer.put_u64(self.first_key);
        writer.put_u64(self.last_key);
        writer.put_u32(self.levels.len() as u32);

        for level in &self.levels {
            writer.put_u32(level.len() as u32);
            for seg in level {
                writer.put_u64(seg.first_key);
                writer.put_f64(seg.slope);
                writer.put_u64(seg.intercept);
            }
        }

        writer.finish()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<LearnedIndex, HintPIRError> {
        Self::parse(bytes).ok_or(HintPIRError::InvalidLearnedIndexBytes)
    }

    fn parse(bytes: &[u8]) -> Option<LearnedIndex> {
        let mut reader = ByteReader::new(bytes);

        let epsilon = reader.get_u32()? as usize;
        let epsilon_recursive = reader.get_u32()? as usize;
        let num_keys = reader.get_u64()?;
        let first_key = reader.get_u64()?;
        let last_key = reader.get_u64()?;
        let num_levels = reader.get_u32()? as usize;

        if num_keys == 0 || first_key > last_key || num_levels == 0 {
            return None;
        }

        let mut levels = Vec::with_capacity(num_levels.min(64));
        let mut positions_below = num_keys;

        for _ in 0..num_levels {
            let num_segments = reader.get_u32()? as usize;
            if num_segments == 0 || num_segments as u64 > positions_below {
                return None;
            }

            let mut level = Vec::with_capacity(num_segments.min(bytes.len() / SEGMENT_BYTE_LEN));
            for _ in 0..num_segments {
                let seg = Segment {
                    first_key: reader.get_u64()?,
                    slope: reader.get_f64()?,
                    intercept: reader.get_u64()?,
                };

                if !(seg.slope.is_finite() && seg.slope >= 0.0) || seg.intercept >= positions_below {
                    return None;
                }
                level.push(seg);
            }

            positions_below = num_segments as u64;
            levels.push(level);
        }

        if levels[levels.len() - 1].len() != 1 || !reader.is_exhausted() {
            return None;
        }

        Some(LearnedIndex {
            epsilon,
            epsilon_recursive,
            num_keys,
            first_key,
            last_key,
            levels,
        })
    }
}

/// Greedy shrinking-cone segmentation. Each segment is anchored at its first point, and is extended while some slope
/// keeps every covered point within `epsilon` of its true position.
fn fit_segments(keys: &[u64], epsilon: usize) -> Vec<Segment> {
    let eps = epsilon as f64;
    let mut segments = Vec::new();

    let mut start = 0;
    while start < keys.len() {
        let anchor_key = keys[start];

        let mut slope_lo = 0.0f64;
        let mut slope_hi = f64::INFINITY;

        let mut end = start + 1;
        while end < keys.len() {
            let dx = (keys[end] - anchor_key) as f64;
            let dy = (end - start) as f64;

            if dx == 0.0 {
                if dy > eps {
                    break;
                }
            } else {
                let next_lo = slope_lo.max((dy - eps) / dx);
                let next_hi = slope_hi.min((dy + eps) / dx);

                if next_lo > next_hi {
                    break;
                }

                slope_lo = next_lo;
                slope_hi = next_hi;
            }

            end += 1;
        }

        let slope = if slope_hi.is_finite() { (slope_lo + slope_hi) / 2.0 } else { slope_lo };
        segments.push(Segment {
            first_key: anchor_key,
            slope,
            intercept: start as u64,
        });

        start = end;
    }

    segments
}

#[inline(always)]
fn clamp_prediction(predicted: f64, last_pos: usize) -> usize {
    if predicted <= 0.0 {
        0
    } else {
        (predicted.round() as usize).min(last_pos)
    }
}

/// Finds the rightmost segment of `level` whose first key is not greater than `key`, looking around the predicted
/// position first. Requires `key >= level[0].first_key`.
fn locate_segment(level: &[Segment], key: u64, predicted: f64, epsilon: usize) -> usize {
    let last_idx = level.len() - 1;
    let guess = clamp_prediction(predicted, last_idx);

    let window_lo = guess.saturating_sub(epsilon + 1);
    let window_hi = (guess + epsilon + 1).min(last_idx);

    let is_target = |idx: usize| level[idx].first_key <= key && (idx == last_idx || level[idx + 1].first_key > key);

    match (window_lo..=window_hi).rev().find(|&idx| level[idx].first_key <= key) {
        Some(idx) if branch_opt_util::likely(is_target(idx)) => idx,
        _ => {
            branch_opt_util::cold();
            level.partition_point(|seg| seg.first_key <= key).saturating_sub(1)
        }
    }
}
