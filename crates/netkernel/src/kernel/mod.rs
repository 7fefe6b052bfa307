//! # Kernels
//!
//! A kernel is the unit of work the pipeline schedules: it is told about
//! frame geometry changes and then executed over batches of columns.
//!
//! ## Module Structure
//!
//! * [`net`] - The network kernel: shape planning on geometry changes and the
//!   batched forward loop.
//!
//! * [`batch`] - Batch partitioning and the staging of rows into and out of
//!   network tensors.
//!
//! * [`registry`] - Maps a kernel name and device type to a constructor, so
//!   CPU and accelerator variants are selected by configuration.

pub mod batch;
pub mod net;
pub mod registry;

use crate::column::{Column, FrameInfo};
use crate::descriptor::ModelDescriptor;
use crate::device::DeviceHandle;
use crate::error::Result;

pub use net::NetKernel;
pub use registry::{KernelFactory, KernelRegistry, NET_KERNEL};

/// The capability set every kernel provides.
///
/// Calls are never concurrent: a kernel instance is owned by one worker and
/// each method takes `&mut self`.
pub trait Kernel: Send {
    /// Called whenever the geometry of upstream frames changes
    fn on_geometry_change(&mut self, frame_info: FrameInfo) -> Result<()>;

    /// Consume `input_columns` and append results to `output_columns`
    fn execute(&mut self, input_columns: &[Column], output_columns: &mut [Column]) -> Result<()>;
}

/// Arguments of the network kernel
#[derive(Clone, Debug)]
pub struct NetArgs {
    pub descriptor: ModelDescriptor,
    /// Number of frames per forward pass
    pub batch_size: usize,
}

/// Everything needed to construct one kernel instance
#[derive(Clone, Debug)]
pub struct KernelConfig {
    pub device: DeviceHandle,
    /// Names of the output columns registered for this kernel
    pub output_columns: Vec<String>,
    pub args: NetArgs,
}
