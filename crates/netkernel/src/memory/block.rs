use std::fmt;
use std::sync::Arc;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;
use crate::device::DeviceHandle;
use crate::error::{Error, Result};

/// One contiguous allocation on a device.
///
/// Blocks are shared through `Arc`; the storage is released once the last
/// [`Row`] (or tensor) referencing it is dropped. Accelerator blocks are
/// mirrored in host memory, the backend moves them onto the device when it
/// runs the network.
pub struct Block {
    id: Uuid,
    device: DeviceHandle,
    bytes: RwLock<Vec<u8>>,
}

impl Block {
    /// Allocate a zeroed block of `len` bytes on `device`
    pub fn new(device: DeviceHandle, len: usize) -> Arc<Self> {
        Self::from_vec(device, vec![0; len])
    }

    /// Wrap existing bytes as a block on `device`
    pub fn from_vec(device: DeviceHandle, bytes: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            device,
            bytes: RwLock::new(bytes),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device(&self) -> DeviceHandle {
        self.device
    }

    pub fn len(&self) -> usize {
        self.bytes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn bytes(&self) -> RwLockReadGuard<'_, Vec<u8>> {
        self.bytes.read()
    }

    pub(crate) fn bytes_mut(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.bytes.write()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("len", &self.len())
            .finish()
    }
}

/// A byte range inside a [`Block`]: one frame's worth of data in a column
#[derive(Clone)]
pub struct Row {
    block: Arc<Block>,
    offset: usize,
    len: usize,
}

impl Row {
    /// Reference `len` bytes of `block` starting at `offset`
    pub fn new(block: Arc<Block>, offset: usize, len: usize) -> Result<Self> {
        let end = offset.checked_add(len).ok_or_else(|| {
            Error::Contract(format!("row range {offset}+{len} overflows"))
        })?;
        let capacity = block.len();
        if end > capacity {
            return Err(Error::Contract(format!(
                "row range {offset}..{end} exceeds block {} of {capacity} bytes",
                block.id()
            )));
        }
        Ok(Self { block, offset, len })
    }

    /// A row spanning the whole block
    pub fn whole(block: Arc<Block>) -> Self {
        let len = block.len();
        Self {
            block,
            offset: 0,
            len,
        }
    }

    /// Copy `bytes` into a fresh single-row block on `device`
    pub fn from_bytes(device: DeviceHandle, bytes: &[u8]) -> Self {
        Self::whole(Block::from_vec(device, bytes.to_vec()))
    }

    pub fn block(&self) -> &Arc<Block> {
        &self.block
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn device(&self) -> DeviceHandle {
        self.block.device()
    }

    /// Whether both rows reference the same allocation
    pub fn shares_block(&self, other: &Row) -> bool {
        Arc::ptr_eq(&self.block, &other.block)
    }

    /// Read the row back into host memory
    pub fn to_vec(&self) -> Vec<u8> {
        self.block.bytes()[self.offset..self.offset + self.len].to_vec()
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("block", &self.block.id())
            .field("device", &self.device())
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}
