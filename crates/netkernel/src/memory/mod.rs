//! # Device memory
//!
//! Column rows reference ranges of reference-counted [`Block`]s rather than
//! raw pointers. A block lives as long as any row or tensor points into it.
//!
//! The [`MemoryStager`] trait performs every transfer the kernels need:
//! staging input rows into network tensors, and copying network outputs into
//! freshly allocated output blocks.

mod block;
mod stager;

pub use block::{Block, Row};
pub use stager::{CopyOp, HostStager, MemoryStager};
