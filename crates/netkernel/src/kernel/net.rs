use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use crate::backend::{Network, NetworkLoader};
use crate::column::{Column, FrameInfo};
use crate::descriptor::ModelDescriptor;
use crate::device::{DeviceContext, DeviceHandle};
use crate::error::{Error, Result};
use crate::memory::{CopyOp, MemoryStager, Row};
use crate::profiler::Profiler;
use crate::shape::{derive_input_shape, DerivedInputShape};
use crate::tensor::constant::BATCH_DIM;
use super::batch::{batch_ranges, collect_outputs, resize_batch, stage_inputs};
use super::{Kernel, KernelConfig};

/// Profiler label of the forward pass
pub const NET_FORWARD_LABEL: &str = "net:forward";

/// A kernel running a pretrained network over batches of frames.
///
/// Input columns are bound positionally to the descriptor's input layers and
/// must be followed by one frame-info column. Output columns are bound
/// positionally to the output layers.
pub struct NetKernel<N> {
    device: DeviceHandle,
    descriptor: ModelDescriptor,
    batch_size: usize,
    net: N,
    context: Arc<dyn DeviceContext>,
    stager: Arc<dyn MemoryStager>,
    frame_info: Option<FrameInfo>,
    profiler: Option<Arc<Profiler>>,
}

impl<N: Network> NetKernel<N> {
    /// Validate `config`, then load the network through `loader`
    pub fn load<L>(
        config: &KernelConfig,
        loader: &L,
        context: Arc<dyn DeviceContext>,
        stager: Arc<dyn MemoryStager>,
    ) -> Result<Self>
    where L: NetworkLoader<Network = N>
    {
        validate(config)?;
        context.set_active_device(config.device)?;
        let net = loader.load(&config.args.descriptor, config.device)?;
        info!(
            model = %config.args.descriptor.model_path.display(),
            device = %config.device,
            batch_size = config.args.batch_size,
            "loaded network"
        );
        Self::new(config, net, context, stager)
    }

    /// Wrap an already loaded network
    pub fn new(
        config: &KernelConfig,
        mut net: N,
        context: Arc<dyn DeviceContext>,
        stager: Arc<dyn MemoryStager>,
    ) -> Result<Self> {
        validate(config)?;
        context.set_active_device(config.device)?;
        let descriptor = config.args.descriptor.clone();
        let batch_size = config.args.batch_size;

        let input = net.blob_mut(&descriptor.input_layer_names[0])?;
        if input.shape().is_empty() {
            return Err(Error::Contract(format!(
                "input layer '{}' has no dimensions",
                input.name()
            )));
        }
        let mut shape = input.shape().to_vec();
        shape[BATCH_DIM] = batch_size;
        input.reshape(&shape);

        Ok(Self {
            device: config.device,
            descriptor,
            batch_size,
            net,
            context,
            stager,
            frame_info: None,
            profiler: None,
        })
    }

    /// Record forward-pass durations on `profiler`
    pub fn with_profiler(mut self, profiler: Arc<Profiler>) -> Self {
        self.profiler = Some(profiler);
        self
    }

    pub fn network(&self) -> &N {
        &self.net
    }

    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }

    /// Geometry last passed to [`Kernel::on_geometry_change`]
    pub fn frame_info(&self) -> Option<FrameInfo> {
        self.frame_info
    }

    fn set_device(&self) -> Result<()> {
        self.context.set_active_device(self.device)
    }

    /// Every frame-info row must match the geometry the network was shaped for
    fn check_frame_info(&self, column: &Column, input_count: usize) -> Result<()> {
        let expected = self.frame_info.ok_or_else(|| {
            Error::Contract("frames arrived before any geometry was set".into())
        })?;
        if column.len() != input_count {
            return Err(Error::Contract(format!(
                "frame info column has {} rows for {input_count} frames",
                column.len()
            )));
        }
        for (i, row) in column.rows.iter().enumerate() {
            if row.device() != self.device {
                return Err(Error::Contract(format!(
                    "frame info row {i} is on {} but the kernel runs on {}",
                    row.device(),
                    self.device
                )));
            }
            let actual = FrameInfo::from_bytes(&self.read_host(row)?)?;
            if actual != expected {
                return Err(Error::Contract(format!(
                    "frame {i} is {}x{} but the network is shaped for {}x{}",
                    actual.width, actual.height, expected.width, expected.height
                )));
            }
        }
        Ok(())
    }

    fn read_host(&self, row: &Row) -> Result<Vec<u8>> {
        if !row.device().is_gpu() {
            return Ok(row.to_vec());
        }
        let block = self.stager.allocate_block(DeviceHandle::cpu(), row.len(), 1)?;
        let host = Row::whole(block);
        self.stager.stage(&[CopyOp::new(host.clone(), row.clone())])?;
        Ok(host.to_vec())
    }
}

impl<N: Network> Kernel for NetKernel<N> {
    fn on_geometry_change(&mut self, frame_info: FrameInfo) -> Result<()> {
        self.set_device()?;
        let input = self.net.blob_mut(&self.descriptor.input_layer_names[0])?;
        let derived = DerivedInputShape {
            batch_size: self.batch_size,
            ..derive_input_shape(frame_info, &self.descriptor, input.shape())?
        };
        if input.reshape(&derived.dims()) {
            info!(
                frame_width = frame_info.width,
                frame_height = frame_info.height,
                shape = ?derived.dims(),
                "reshaped network input"
            );
        }
        self.frame_info = Some(frame_info);
        Ok(())
    }

    fn execute(&mut self, input_columns: &[Column], output_columns: &mut [Column]) -> Result<()> {
        self.set_device()?;
        let num_inputs = self.descriptor.num_inputs();
        let num_outputs = self.descriptor.num_outputs();
        if input_columns.len() < num_inputs + 1 {
            return Err(Error::Contract(format!(
                "{} input columns given, expected {num_inputs} plus frame info",
                input_columns.len()
            )));
        }
        if output_columns.len() < num_outputs {
            return Err(Error::Contract(format!(
                "{} output columns given for {num_outputs} output layers",
                output_columns.len()
            )));
        }

        let input_count = input_columns[0].len();
        for (column, name) in input_columns.iter().zip(&self.descriptor.input_layer_names) {
            if column.len() != input_count {
                return Err(Error::Contract(format!(
                    "input column for layer '{name}' has {} rows, expected {input_count}",
                    column.len()
                )));
            }
        }
        if let Some(frame_column) = input_columns.last() {
            self.check_frame_info(frame_column, input_count)?;
        }

        let start_lengths: Vec<usize> = output_columns.iter().map(Column::len).collect();
        let result = self.execute_batches(input_columns, output_columns, input_count);
        if result.is_err() {
            for (column, len) in output_columns.iter_mut().zip(start_lengths) {
                column.rows.truncate(len);
            }
        }
        result
    }
}

impl<N: Network> NetKernel<N> {
    /// Run every batch, appending rows to `output_columns` as each completes
    fn execute_batches(
        &mut self,
        input_columns: &[Column],
        output_columns: &mut [Column],
        input_count: usize,
    ) -> Result<()> {
        for frames in batch_ranges(input_count, self.batch_size) {
            let batch_count = frames.len();
            debug!(start = frames.start, batch_count, "executing batch");

            resize_batch(&mut self.net, &self.descriptor, batch_count)?;
            stage_inputs(&self.net, &self.descriptor, self.stager.as_ref(), input_columns, frames)?;

            let net_start = Instant::now();
            self.net.forward()?;
            if let Some(profiler) = &self.profiler {
                profiler.add_interval(NET_FORWARD_LABEL, net_start, Instant::now());
            }

            collect_outputs(
                &self.net,
                &self.descriptor,
                self.stager.as_ref(),
                self.device,
                batch_count,
                output_columns,
            )?;
        }
        Ok(())
    }
}

fn validate(config: &KernelConfig) -> Result<()> {
    if config.args.batch_size == 0 {
        return Err(Error::config("kernel.batch_size", "must be at least 1"));
    }
    let intended = config.args.descriptor.num_outputs();
    let actual = config.output_columns.len();
    if intended != actual {
        return Err(Error::Contract(format!(
            "# output columns in net descriptor ({intended}) does not match number of \
             output columns registered for the kernel ({actual})"
        )));
    }
    Ok(())
}
