//! Network-bound tensors.

pub mod constant;

use std::fmt;
use std::sync::Arc;
use tracing::debug;
use crate::device::DeviceHandle;
use crate::error::{Error, Result};
use crate::memory::{Block, Row};
use constant::ELEMENT_SIZE;

/// A named `f32` tensor bound to a network, backed by a single [`Block`]
pub struct Blob {
    name: String,
    shape: Vec<usize>,
    data: Arc<Block>,
    allocations: usize,
}

impl Blob {
    /// Allocate a zeroed tensor of `shape` on `device`
    pub fn new(name: impl Into<String>, device: DeviceHandle, shape: &[usize]) -> Self {
        let data = Block::new(device, byte_len(shape));
        Self {
            name: name.into(),
            shape: shape.to_vec(),
            data,
            allocations: 1,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Size of dimension `dim`, `0` when the tensor has fewer dimensions
    pub fn dim(&self, dim: usize) -> usize {
        self.shape.get(dim).copied().unwrap_or(0)
    }

    /// Number of elements
    pub fn count(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn byte_len(&self) -> usize {
        self.count() * ELEMENT_SIZE
    }

    pub fn device(&self) -> DeviceHandle {
        self.data.device()
    }

    pub fn data(&self) -> &Arc<Block> {
        &self.data
    }

    /// How many times storage has been allocated for this tensor
    pub fn allocations(&self) -> usize {
        self.allocations
    }

    /// Change the shape, reallocating storage only when the byte size
    /// changes. Returns whether the shape changed at all.
    pub fn reshape(&mut self, shape: &[usize]) -> bool {
        if self.shape == shape {
            return false;
        }
        let old = std::mem::replace(&mut self.shape, shape.to_vec());
        if self.data.len() != self.byte_len() {
            self.data = Block::new(self.data.device(), self.byte_len());
            self.allocations += 1;
        }
        debug!(blob = %self.name, from = ?old, to = ?self.shape, "reshaped blob");
        true
    }

    /// A row over `len` bytes of the tensor starting at `offset`
    pub fn row(&self, offset: usize, len: usize) -> Result<Row> {
        Row::new(self.data.clone(), offset, len)
            .map_err(|err| Error::Contract(format!("blob '{}': {err}", self.name)))
    }

    pub fn to_f32_vec(&self) -> Vec<f32> {
        let bytes = self.data.bytes();
        bytemuck::pod_collect_to_vec::<u8, f32>(bytes.as_slice())
    }

    /// Overwrite the tensor contents; `values` must match the element count
    pub fn write_f32(&mut self, values: &[f32]) -> Result<()> {
        if values.len() != self.count() {
            return Err(Error::Device(format!(
                "blob '{}' holds {} elements, got {}",
                self.name,
                self.count(),
                values.len()
            )));
        }
        self.data
            .bytes_mut()
            .copy_from_slice(bytemuck::cast_slice::<f32, u8>(values));
        Ok(())
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .field("device", &self.device())
            .finish()
    }
}

fn byte_len(shape: &[usize]) -> usize {
    shape.iter().product::<usize>() * ELEMENT_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_same_shape_is_noop() {
        let mut blob = Blob::new("data", DeviceHandle::cpu(), &[1, 3, 4, 4]);
        assert!(!blob.reshape(&[1, 3, 4, 4]));
        assert_eq!(blob.allocations(), 1);
    }

    #[test]
    fn test_reshape_reallocates_on_size_change() {
        let mut blob = Blob::new("data", DeviceHandle::gpu(0), &[1, 3, 4, 4]);
        assert!(blob.reshape(&[2, 3, 4, 4]));
        assert_eq!(blob.allocations(), 2);
        assert_eq!(blob.data().len(), 2 * 3 * 4 * 4 * ELEMENT_SIZE);
        assert_eq!(blob.device(), DeviceHandle::gpu(0));

        // same element count, new layout: storage is reused
        assert!(blob.reshape(&[2, 3, 2, 8]));
        assert_eq!(blob.allocations(), 2);
    }

    #[test]
    fn test_f32_roundtrip() {
        let mut blob = Blob::new("prob", DeviceHandle::cpu(), &[2, 2]);
        blob.write_f32(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(blob.to_f32_vec(), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(blob.write_f32(&[1.0]).unwrap_err().is_device());
    }

    #[test]
    fn test_row_out_of_range() {
        let blob = Blob::new("data", DeviceHandle::cpu(), &[1, 2]);
        assert!(blob.row(0, 8).is_ok());
        assert!(blob.row(4, 8).unwrap_err().is_contract());
    }
}
