//! # Netkernel
//!
//! Batched neural-network inference kernels over columnar video frames.
//!
//! ## Overview
//!
//! A pipeline hands a kernel columns of rows, one row per frame. The network
//! kernel binds those columns to the input layers of a pretrained network,
//! runs the network in fixed-size batches, and appends one row per frame and
//! output layer to its output columns.
//!
//! Key components include:
//!
//! - A model descriptor parsed from TOML, naming the network's files, layers
//!   and preprocessing rules
//! - A shape planner deriving the network's input geometry from the frame size
//! - Reference-counted memory blocks and a staging interface for copies
//!   between devices
//! - A backend-agnostic network abstraction, with an optional candle backend
//! - A registry selecting kernel constructors by name and device type
//!
//! ## Architecture
//!
//! ### Assumptions
//! Network input tensors are laid out as `[batch, channel, height, width]`:
//!  - The `0th` dimension is reserved as the batch dimension
//!  - The last input column of every execution carries frame geometry
//!
//! ### Lifecycle
//!
//! A kernel is constructed from a [`kernel::KernelConfig`], told about the
//! frame geometry through [`kernel::Kernel::on_geometry_change`], and then
//! executed any number of times. A [`worker::KernelWorker`] runs a kernel on
//! its own thread for async callers.
//!
//! ## Features
//!
//! - **candle** - Enables the candle network backend

pub mod backend;
pub mod column;
pub mod config;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod kernel;
pub mod memory;
pub mod profiler;
pub mod shape;
pub mod tensor;
pub mod worker;

/// Constants for client reference
pub use tensor::constant;

pub use column::{BatchedColumns, Column, FrameInfo};
pub use config::KernelSettings;
pub use descriptor::{MeanImage, ModelDescriptor};
pub use device::{DeviceContext, DeviceHandle, DeviceType, HostContext};
pub use error::{Error, Result};
pub use kernel::{Kernel, KernelConfig, KernelRegistry, NetArgs, NetKernel};
pub use memory::{Block, HostStager, MemoryStager, Row};
pub use worker::KernelWorker;
