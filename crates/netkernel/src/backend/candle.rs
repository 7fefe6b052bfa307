use std::collections::HashMap;
use std::marker::PhantomData;
use candle_core::{DType, Device, Tensor};
use tracing::info;
use crate::descriptor::ModelDescriptor;
use crate::device::{DeviceHandle, DeviceType};
use crate::error::{Error, Result};
use crate::tensor::Blob;
use super::{Blobs, Network, NetworkLoader};

/// A candle computation from the network's input tensors to its output
/// tensors, in descriptor layer order
pub trait Graph: Send + 'static {
    fn forward(&self, inputs: &[Tensor]) -> candle_core::Result<Vec<Tensor>>;
}

impl<F> Graph for F
where F: Fn(&[Tensor]) -> candle_core::Result<Vec<Tensor>> + Send + 'static
{
    fn forward(&self, inputs: &[Tensor]) -> candle_core::Result<Vec<Tensor>> {
        self(inputs)
    }
}

/// Map a device handle onto the candle device it names
pub fn candle_device(device: DeviceHandle) -> Result<Device> {
    match device.device_type {
        DeviceType::Cpu => Ok(Device::Cpu),
        DeviceType::Gpu => Ok(Device::new_cuda(device.id as usize)?),
    }
}

/// A [`Network`] whose forward pass is a candle [`Graph`].
///
/// Blobs hold the host mirror of every bound tensor; `forward` uploads the
/// inputs to the candle device, runs the graph, and downloads the outputs.
pub struct CandleNetwork<G> {
    device: Device,
    graph: G,
    blobs: Blobs,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl<G: Graph> CandleNetwork<G> {
    /// Bind `graph` to the layers named by `descriptor`.
    ///
    /// `input_shapes` gives the native shape of every input layer, in order.
    pub fn new(
        descriptor: &ModelDescriptor,
        device: DeviceHandle,
        input_shapes: &[Vec<usize>],
        graph: G,
    ) -> Result<Self> {
        if input_shapes.len() != descriptor.num_inputs() {
            return Err(Error::Contract(format!(
                "{} input shapes given for {} input layers",
                input_shapes.len(),
                descriptor.num_inputs()
            )));
        }
        let mut blobs = Blobs::new();
        for (name, shape) in descriptor.input_layer_names.iter().zip(input_shapes) {
            blobs.insert(Blob::new(name.clone(), device, shape));
        }
        for name in &descriptor.output_layer_names {
            blobs.insert(Blob::new(name.clone(), device, &[0]));
        }
        Ok(Self {
            device: candle_device(device)?,
            graph,
            blobs,
            inputs: descriptor.input_layer_names.clone(),
            outputs: descriptor.output_layer_names.clone(),
        })
    }
}

impl<G: Graph> Network for CandleNetwork<G> {
    fn blob(&self, name: &str) -> Result<&Blob> {
        self.blobs.get(name)
    }

    fn blob_mut(&mut self, name: &str) -> Result<&mut Blob> {
        self.blobs.get_mut(name)
    }

    fn forward(&mut self) -> Result<()> {
        let mut inputs = Vec::with_capacity(self.inputs.len());
        for name in &self.inputs {
            let blob = self.blobs.get(name)?;
            inputs.push(Tensor::from_vec(blob.to_f32_vec(), blob.shape(), &self.device)?);
        }

        let outputs = self.graph.forward(&inputs)?;
        if outputs.len() != self.outputs.len() {
            return Err(Error::Device(format!(
                "graph produced {} outputs for {} output layers",
                outputs.len(),
                self.outputs.len()
            )));
        }

        for (name, tensor) in self.outputs.iter().zip(outputs) {
            let dims = tensor.dims().to_vec();
            let values = tensor.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
            let blob = self.blobs.get_mut(name)?;
            blob.reshape(&dims);
            blob.write_f32(&values)?;
        }
        Ok(())
    }
}

/// Loads [`CandleNetwork`]s: weights come from the descriptor's safetensors
/// file, the graph from `build`
pub struct CandleLoader<G, F> {
    input_shapes: Vec<Vec<usize>>,
    build: F,
    _marker: PhantomData<fn() -> G>,
}

impl<G, F> CandleLoader<G, F>
where G: Graph,
      F: Fn(HashMap<String, Tensor>, &Device) -> Result<G> + Send + Sync + 'static
{
    pub fn new(input_shapes: Vec<Vec<usize>>, build: F) -> Self {
        Self {
            input_shapes,
            build,
            _marker: PhantomData,
        }
    }
}

impl<G, F> NetworkLoader for CandleLoader<G, F>
where G: Graph,
      F: Fn(HashMap<String, Tensor>, &Device) -> Result<G> + Send + Sync + 'static
{
    type Network = CandleNetwork<G>;

    fn load(&self, descriptor: &ModelDescriptor, device: DeviceHandle) -> Result<Self::Network> {
        let candle = candle_device(device)?;
        let weights = candle_core::safetensors::load(&descriptor.weights_path, &candle)?;
        info!(
            weights = %descriptor.weights_path.display(),
            tensors = weights.len(),
            %device,
            "loaded network weights"
        );
        let graph = (self.build)(weights, &candle)?;
        CandleNetwork::new(descriptor, device, &self.input_shapes, graph)
    }
}
