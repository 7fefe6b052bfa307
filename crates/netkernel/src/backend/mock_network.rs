use crate::descriptor::ModelDescriptor;
use crate::device::DeviceHandle;
use crate::error::{Error, Result};
use crate::tensor::Blob;
use crate::tensor::constant::BATCH_DIM;
use super::{Blobs, Network, NetworkLoader};

// A simple mock network for testing.
//
// Output layer `k` produces `output_lengths[k]` elements per frame. Element `e`
// of frame `b` is `first element of input frame b + 1000 * k + e`, which makes
// frame order and layer separation visible in the results.
#[derive(Debug)]
pub struct MockNetwork {
    pub(crate) blobs: Blobs,
    pub(crate) inputs: Vec<String>,
    pub(crate) outputs: Vec<String>,
    pub(crate) output_lengths: Vec<usize>,
    /// Batch size of every forward pass, in call order
    pub(crate) forwards: Vec<usize>,
    /// Fail the forward pass with this index (0-based)
    pub(crate) fail_forward: Option<usize>,
}

impl MockNetwork {
    pub fn new(
        descriptor: &ModelDescriptor,
        device: DeviceHandle,
        input_shape: &[usize],
        output_lengths: &[usize],
    ) -> Self {
        let mut blobs = Blobs::new();
        for name in &descriptor.input_layer_names {
            blobs.insert(Blob::new(name.clone(), device, input_shape));
        }
        for (name, len) in descriptor.output_layer_names.iter().zip(output_lengths) {
            blobs.insert(Blob::new(name.clone(), device, &[input_shape[BATCH_DIM], *len]));
        }
        Self {
            blobs,
            inputs: descriptor.input_layer_names.clone(),
            outputs: descriptor.output_layer_names.clone(),
            output_lengths: output_lengths.to_vec(),
            forwards: vec![],
            fail_forward: None,
        }
    }
}

impl Network for MockNetwork {
    fn blob(&self, name: &str) -> Result<&Blob> {
        self.blobs.get(name)
    }

    fn blob_mut(&mut self, name: &str) -> Result<&mut Blob> {
        self.blobs.get_mut(name)
    }

    fn forward(&mut self) -> Result<()> {
        if self.fail_forward == Some(self.forwards.len()) {
            return Err(Error::Device("mock forward failure".into()));
        }
        let input = self.blobs.get(&self.inputs[0])?;
        let batch = input.dim(BATCH_DIM);
        let per_frame = input.count() / batch.max(1);
        let values = input.to_f32_vec();
        let firsts: Vec<f32> = (0..batch).map(|b| values[b * per_frame]).collect();

        for (k, (name, len)) in self.outputs.iter().zip(&self.output_lengths).enumerate() {
            let out: Vec<f32> = firsts
                .iter()
                .flat_map(|first| (0..*len).map(move |e| first + 1000.0 * k as f32 + e as f32))
                .collect();
            let blob = self.blobs.get_mut(name)?;
            blob.reshape(&[batch, *len]);
            blob.write_f32(&out)?;
        }
        self.forwards.push(batch);
        Ok(())
    }
}

/// Loads [`MockNetwork`]s with a fixed input shape
pub struct MockLoader {
    pub input_shape: Vec<usize>,
    pub output_lengths: Vec<usize>,
}

impl NetworkLoader for MockLoader {
    type Network = MockNetwork;

    fn load(&self, descriptor: &ModelDescriptor, device: DeviceHandle) -> Result<MockNetwork> {
        Ok(MockNetwork::new(descriptor, device, &self.input_shape, &self.output_lengths))
    }
}
