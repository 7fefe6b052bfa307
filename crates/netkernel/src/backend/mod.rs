//! # Network Backend
//!
//! This module provides a unified interface for inference engines, allowing
//! kernels to drive any network in a backend-agnostic manner.

//! ## Feature Flags
//!
//! - `candle`: Enables a backend running candle graphs on a candle device
//!
//! ## Usage
//!
//! Users of this crate bring their inference engine by:
//!
//! 1. Implementing [`Network`] over their engine's tensors
//! 2. Implementing [`NetworkLoader`] to build it from a descriptor
//! 3. Registering the loader with a kernel registry
//!
//! or by enabling the `candle` feature and supplying a graph.

mod core_trait;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Candle network backend implementation.
///
/// This module is only available when the `candle` feature flag is enabled.
/// It binds descriptor layers to the inputs and outputs of a candle graph,
/// running on the CPU or a CUDA device.
pub mod candle;

pub use core_trait::*;

#[cfg(test)]
/// Mock network implementation.
///
/// Produces outputs derived from the first element of every input frame
pub(crate) mod mock_network;
