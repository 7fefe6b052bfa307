//! Columnar batches exchanged with the pipeline.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use crate::device::DeviceHandle;
use crate::error::{Error, Result};
use crate::memory::Row;

/// Geometry of the frames currently flowing through a kernel
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct FrameInfo {
    pub width: i32,
    pub height: i32,
}

impl FrameInfo {
    /// Encoded size of a frame-info row
    pub const SIZE: usize = std::mem::size_of::<FrameInfo>();

    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Little-endian `width, height`
    pub fn to_bytes(&self) -> [u8; 8] {
        let le = Self {
            width: self.width.to_le(),
            height: self.height.to_le(),
        };
        bytemuck::cast(le)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(Error::Contract(format!(
                "frame info row is {} bytes, expected {}",
                bytes.len(),
                Self::SIZE
            )));
        }
        let raw: FrameInfo = bytemuck::pod_read_unaligned(bytes);
        Ok(Self {
            width: i32::from_le(raw.width),
            height: i32::from_le(raw.height),
        })
    }

    /// A row holding this geometry, resident on `device`
    pub fn to_row(&self, device: DeviceHandle) -> Row {
        Row::from_bytes(device, &self.to_bytes())
    }
}

/// An ordered sequence of rows: one data channel across a run of frames
#[derive(Clone, Debug, Default)]
pub struct Column {
    pub rows: Vec<Row>,
}

impl Column {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The unit of kernel input and output
pub type BatchedColumns = Vec<Column>;

/// Allocate `count` empty columns
pub fn empty_columns(count: usize) -> BatchedColumns {
    (0..count).map(|_| Column::new()).collect()
}

/// A column carrying `frames` copies of `info`, as produced by a decoder
pub fn frame_info_column(info: FrameInfo, frames: usize, device: DeviceHandle) -> Column {
    Column::from_rows((0..frames).map(|_| info.to_row(device)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_info_encoding() {
        let info = FrameInfo::new(640, 480);
        let bytes = info.to_bytes();
        assert_eq!(&bytes[..4], &640i32.to_le_bytes());
        assert_eq!(FrameInfo::from_bytes(&bytes).unwrap(), info);
        assert!(FrameInfo::from_bytes(&bytes[..5]).unwrap_err().is_contract());
    }

    #[test]
    fn test_frame_info_column() {
        let column = frame_info_column(FrameInfo::new(2, 3), 4, DeviceHandle::gpu(0));
        assert_eq!(column.len(), 4);
        assert_eq!(column.rows[3].device(), DeviceHandle::gpu(0));
        assert_eq!(FrameInfo::from_bytes(&column.rows[0].to_vec()).unwrap(), FrameInfo::new(2, 3));
    }
}
