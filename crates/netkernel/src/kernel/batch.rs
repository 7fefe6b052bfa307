//! Per-batch staging: input rows into network tensors, network tensors into
//! output rows.

use std::ops::Range;
use crate::backend::Network;
use crate::column::Column;
use crate::descriptor::ModelDescriptor;
use crate::device::DeviceHandle;
use crate::error::{Error, Result};
use crate::memory::{CopyOp, MemoryStager, Row};
use crate::tensor::constant::{BATCH_DIM, ELEMENT_SIZE};

/// Split `input_count` frames into consecutive chunks of at most `batch_size`
pub fn batch_ranges(input_count: usize, batch_size: usize) -> impl Iterator<Item = Range<usize>> {
    (0..input_count)
        .step_by(batch_size.max(1))
        .map(move |start| start..(start + batch_size).min(input_count))
}

/// Set the batch dimension of every input tensor to `batch_count`
pub(crate) fn resize_batch<N: Network>(net: &mut N, descriptor: &ModelDescriptor, batch_count: usize) -> Result<()> {
    for name in &descriptor.input_layer_names {
        let blob = net.blob_mut(name)?;
        if blob.dim(BATCH_DIM) != batch_count {
            let mut shape = blob.shape().to_vec();
            shape[BATCH_DIM] = batch_count;
            blob.reshape(&shape);
        }
    }
    Ok(())
}

/// Concatenate the rows of `frames` from every input column into the
/// matching input tensor, one staged copy per frame
pub(crate) fn stage_inputs<N: Network>(
    net: &N,
    descriptor: &ModelDescriptor,
    stager: &dyn MemoryStager,
    input_columns: &[Column],
    frames: Range<usize>,
) -> Result<()> {
    for (column, name) in input_columns.iter().zip(&descriptor.input_layer_names) {
        let blob = net.blob(name)?;
        let mut offset = 0;
        let mut copies = Vec::with_capacity(frames.len());
        for row in &column.rows[frames.clone()] {
            copies.push(CopyOp::new(blob.row(offset, row.len())?, row.clone()));
            offset += row.len();
        }
        stager.stage(&copies)?;
    }
    Ok(())
}

/// Copy every output tensor into one freshly allocated block and append
/// `batch_count` rows per output layer to the matching output column,
/// output-major then frame-minor
pub(crate) fn collect_outputs<N: Network>(
    net: &N,
    descriptor: &ModelDescriptor,
    stager: &dyn MemoryStager,
    device: DeviceHandle,
    batch_count: usize,
    output_columns: &mut [Column],
) -> Result<()> {
    let num_outputs = descriptor.num_outputs();
    let mut sources = Vec::with_capacity(num_outputs);
    let mut total_size = 0;
    for name in &descriptor.output_layer_names {
        let blob = net.blob(name)?;
        let count = blob.count();
        if count % batch_count != 0 {
            return Err(Error::Contract(format!(
                "output layer '{name}' holds {count} elements, not divisible by batch of {batch_count}"
            )));
        }
        let output_size = count / batch_count * ELEMENT_SIZE;
        sources.push((blob.row(0, output_size * batch_count)?, output_size));
        total_size += output_size * batch_count;
    }

    let block = stager.allocate_block(device, total_size, num_outputs * batch_count)?;
    let mut copies = Vec::with_capacity(num_outputs);
    let mut rows = Vec::with_capacity(num_outputs);
    let mut cursor = 0;
    for (src, output_size) in sources {
        let span = output_size * batch_count;
        copies.push(CopyOp::new(Row::new(block.clone(), cursor, span)?, src));
        let layer_rows = (0..batch_count)
            .map(|b| Row::new(block.clone(), cursor + b * output_size, output_size))
            .collect::<Result<Vec<_>>>()?;
        rows.push(layer_rows);
        cursor += span;
    }
    stager.stage(&copies)?;

    for (column, layer_rows) in output_columns.iter_mut().zip(rows) {
        column.rows.extend(layer_rows);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_ranges_with_remainder() {
        let ranges: Vec<_> = batch_ranges(10, 4).collect();
        assert_eq!(ranges, vec![0..4, 4..8, 8..10]);
        let sizes: Vec<_> = ranges.iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
    }

    #[test]
    fn test_batch_ranges_exact_and_empty() {
        assert_eq!(batch_ranges(8, 4).count(), 2);
        assert_eq!(batch_ranges(0, 4).count(), 0);
        assert_eq!(batch_ranges(3, 8).collect::<Vec<_>>(), vec![0..3]);
    }
}
