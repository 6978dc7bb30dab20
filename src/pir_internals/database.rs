use super::{branch_opt_util, error::HintPIRError, layout::RowLayout, matrix::Matrix, record::EncodedRecord};
use rayon::prelude::*;

/// Splits encoded records into byte-planes, following the row layout. Plane `p` is a `rows × columns` matrix whose
/// element at `(row, column)` is byte `p` of the record placed there, or the sentinel byte for an empty slot.
///
/// # Arguments
///
/// * `layout` - Placement of records, referring to positions in `records`.
/// * `records` - Encoded records, all `partition` bytes long.
/// * `partition` - Number of planes to build.
pub fn encode_planes(layout: &RowLayout, records: &[EncodedRecord], partition: usize) -> Result<Vec<Matrix>, HintPIRError> {
    if branch_opt_util::unlikely(records.iter().any(|record| record.partition() != partition)) {
        return Err(HintPIRError::InvalidNumberOfElementsInMatrix);
    }

    let rows = u32::try_from(layout.rows()).map_err(|_| HintPIRError::InvalidMatrixDimension)?;
    let columns = u32::try_from(layout.columns()).map_err(|_| HintPIRError::InvalidMatrixDimension)?;
    let sentinel = EncodedRecord::sentinel(partition);

    (0..partition)
        .into_par_iter()
        .map(|plane| {
            let elems = (0..layout.rows())
                .flat_map(|row| (0..layout.columns()).map(move |column| (row, column)))
                .map(|(row, column)| match layout.record_at(row, column) {
                    Some(record_idx) => records[record_idx].plane(plane) as u32,
                    None => sentinel.plane(plane) as u32,
                })
                .collect::<Vec<u32>>();

            Matrix::from_values(rows, columns, elems)
        })
        .collect()
}
