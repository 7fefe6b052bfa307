use std::collections::HashMap;
use crate::descriptor::ModelDescriptor;
use crate::device::DeviceHandle;
use crate::error::{Error, Result};
use crate::tensor::Blob;

/// The trait that must be fulfilled by an inference engine to be driven by a kernel.
///
/// A network exposes its input and output tensors as named [`Blob`]s. Kernels
/// write staged frames into the input blobs, call [`forward`](Network::forward),
/// and read results back out of the output blobs.
pub trait Network: Send + 'static {
    /// Look up a tensor by layer name
    fn blob(&self, name: &str) -> Result<&Blob>;

    /// Look up a tensor by layer name for reshaping or writing
    fn blob_mut(&mut self, name: &str) -> Result<&mut Blob>;

    /// Run the forward pass over the current contents of the input blobs,
    /// leaving results in the output blobs. Blocks until complete.
    fn forward(&mut self) -> Result<()>;
}

/// Creates networks from descriptor files
pub trait NetworkLoader: Send + Sync + 'static {
    type Network: Network;

    /// Load the network definition and trained weights named by `descriptor`
    /// onto `device`
    fn load(&self, descriptor: &ModelDescriptor, device: DeviceHandle) -> Result<Self::Network>;
}

/// Name-indexed tensor storage shared by network implementations
#[derive(Debug, Default)]
pub struct Blobs {
    by_name: HashMap<String, Blob>,
}

impl Blobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, blob: Blob) {
        self.by_name.insert(blob.name().to_string(), blob);
    }

    pub fn get(&self, name: &str) -> Result<&Blob> {
        self.by_name.get(name).ok_or_else(|| unknown(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut Blob> {
        self.by_name.get_mut(name).ok_or_else(|| unknown(name))
    }
}

fn unknown(name: &str) -> Error {
    Error::Contract(format!("network has no layer named '{name}'"))
}
