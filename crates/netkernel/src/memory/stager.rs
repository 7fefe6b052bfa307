use std::sync::Arc;
use tracing::trace;
use crate::device::DeviceHandle;
use crate::error::{Error, Result};
use super::block::{Block, Row};

/// A single `src -> dst` transfer. Both rows must have the same length.
#[derive(Clone, Debug)]
pub struct CopyOp {
    pub dst: Row,
    pub src: Row,
}

impl CopyOp {
    pub fn new(dst: Row, src: Row) -> Self {
        Self { dst, src }
    }
}

/// Moves bytes between host and device memory.
///
/// A single [`stage`](MemoryStager::stage) call may carry many copies so an
/// implementation can amortize per-copy overhead across a whole batch.
pub trait MemoryStager: Send + Sync {
    /// Perform every copy in `copies`, in order
    fn stage(&self, copies: &[CopyOp]) -> Result<()>;

    /// Allocate one block of `total_bytes` that the caller will carve into
    /// `row_count` rows
    fn allocate_block(&self, device: DeviceHandle, total_bytes: usize, row_count: usize) -> Result<Arc<Block>>;
}

/// Stager for host blocks and host-mirrored accelerator blocks
#[derive(Clone, Copy, Debug, Default)]
pub struct HostStager;

impl MemoryStager for HostStager {
    fn stage(&self, copies: &[CopyOp]) -> Result<()> {
        let mut total = 0usize;
        for op in copies {
            copy_row(&op.dst, &op.src)?;
            total += op.src.len();
        }
        trace!(copies = copies.len(), bytes = total, "staged");
        Ok(())
    }

    fn allocate_block(&self, device: DeviceHandle, total_bytes: usize, row_count: usize) -> Result<Arc<Block>> {
        let block = Block::new(device, total_bytes);
        trace!(%device, bytes = total_bytes, rows = row_count, block = %block.id(), "allocated block");
        Ok(block)
    }
}

fn copy_row(dst: &Row, src: &Row) -> Result<()> {
    if dst.len() != src.len() {
        return Err(Error::Contract(format!(
            "copy of {} bytes from {} into {}-byte destination on {}",
            src.len(),
            src.device(),
            dst.len(),
            dst.device()
        )));
    }
    let len = src.len();
    if dst.shares_block(src) {
        let mut bytes = dst.block().bytes_mut();
        bytes.copy_within(src.offset()..src.offset() + len, dst.offset());
        return Ok(());
    }
    let from = src.block().bytes();
    let mut to = dst.block().bytes_mut();
    to[dst.offset()..dst.offset() + len].copy_from_slice(&from[src.offset()..src.offset() + len]);
    Ok(())
}
