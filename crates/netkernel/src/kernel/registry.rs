use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use crate::backend::NetworkLoader;
use crate::device::{DeviceContext, DeviceType};
use crate::error::{Error, Result};
use crate::memory::MemoryStager;
use super::{Kernel, KernelConfig, NetKernel};

/// Registry name of the network kernel
pub const NET_KERNEL: &str = "Net";

/// Builds a kernel instance from its configuration
pub type KernelFactory = Box<dyn Fn(&KernelConfig) -> Result<Box<dyn Kernel>> + Send + Sync>;

/// Kernel constructors keyed by kernel name and device type
#[derive(Default)]
pub struct KernelRegistry {
    factories: HashMap<(String, DeviceType), KernelFactory>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` for `name` on `device_type`, replacing any previous one
    pub fn register<F>(&mut self, name: &str, device_type: DeviceType, factory: F)
    where F: Fn(&KernelConfig) -> Result<Box<dyn Kernel>> + Send + Sync + 'static
    {
        debug!(kernel = name, ?device_type, "registered kernel");
        self.factories.insert((name.to_string(), device_type), Box::new(factory));
    }

    /// Register the network kernel for `device_type`, loading networks with `loader`
    pub fn register_net<L: NetworkLoader>(
        &mut self,
        name: &str,
        device_type: DeviceType,
        loader: Arc<L>,
        context: Arc<dyn DeviceContext>,
        stager: Arc<dyn MemoryStager>,
    ) {
        self.register(name, device_type, move |config| {
            let kernel = NetKernel::load(config, loader.as_ref(), context.clone(), stager.clone())?;
            Ok(Box::new(kernel) as Box<dyn Kernel>)
        });
    }

    pub fn contains(&self, name: &str, device_type: DeviceType) -> bool {
        self.factories.contains_key(&(name.to_string(), device_type))
    }

    /// Construct kernel `name` for the device named in `config`
    pub fn create(&self, name: &str, config: &KernelConfig) -> Result<Box<dyn Kernel>> {
        let device_type = config.device.device_type;
        let factory = self
            .factories
            .get(&(name.to_string(), device_type))
            .ok_or_else(|| {
                Error::config(
                    "kernel.name",
                    format!("no kernel '{name}' registered for {device_type:?}"),
                )
            })?;
        factory(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock_network::MockLoader;
    use crate::column::{empty_columns, frame_info_column, Column, FrameInfo};
    use crate::descriptor::parse_descriptor;
    use crate::descriptor::tests::MINIMAL;
    use crate::device::{DeviceHandle, HostContext};
    use crate::kernel::NetArgs;
    use crate::memory::{HostStager, Row};

    fn registry() -> KernelRegistry {
        let loader = Arc::new(MockLoader {
            input_shape: vec![1, 1, 1, 1],
            output_lengths: vec![2],
        });
        let mut registry = KernelRegistry::new();
        for device_type in [DeviceType::Cpu, DeviceType::Gpu] {
            registry.register_net(
                NET_KERNEL,
                device_type,
                loader.clone(),
                Arc::new(HostContext),
                Arc::new(HostStager),
            );
        }
        registry
    }

    fn config(device: DeviceHandle) -> KernelConfig {
        KernelConfig {
            device,
            output_columns: vec!["prob".into()],
            args: NetArgs {
                descriptor: parse_descriptor(MINIMAL).unwrap(),
                batch_size: 2,
            },
        }
    }

    #[test]
    fn test_create_by_device_type() {
        let registry = registry();
        assert!(registry.contains(NET_KERNEL, DeviceType::Cpu));
        assert!(registry.contains(NET_KERNEL, DeviceType::Gpu));

        for device in [DeviceHandle::cpu(), DeviceHandle::gpu(0)] {
            let mut kernel = registry.create(NET_KERNEL, &config(device)).unwrap();
            kernel.on_geometry_change(FrameInfo::new(1, 1)).unwrap();
            let inputs = vec![
                Column::from_rows(vec![Row::from_bytes(device, &7f32.to_le_bytes())]),
                frame_info_column(FrameInfo::new(1, 1), 1, device),
            ];
            let mut outputs = empty_columns(1);
            kernel.execute(&inputs, &mut outputs).unwrap();
            assert_eq!(outputs[0].len(), 1);
            assert_eq!(outputs[0].rows[0].device(), device);
        }
    }

    #[test]
    fn test_unknown_kernel() {
        let registry = registry();
        let err = registry.create("Histogram", &config(DeviceHandle::cpu())).err().unwrap();
        assert_eq!(err.config_key(), Some("kernel.name"));

        let mut cpu_only = KernelRegistry::new();
        cpu_only.register(NET_KERNEL, DeviceType::Cpu, |_| {
            Err(crate::error::Error::Device("unavailable".into()))
        });
        assert!(cpu_only.create(NET_KERNEL, &config(DeviceHandle::gpu(0))).err().unwrap().is_config());
        assert!(cpu_only.create(NET_KERNEL, &config(DeviceHandle::cpu())).err().unwrap().is_device());
    }
}
