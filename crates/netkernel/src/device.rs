//! Device placement.
//!
//! The active accelerator is process-wide state in most drivers, and other
//! kernel instances in the same process may change it at any time. Kernels
//! therefore hold a [`DeviceContext`] and select their device again at the
//! start of every operation that touches device memory or the network.

use std::fmt;
use serde::{Deserialize, Serialize};
use crate::error::Result;

/// Kind of memory space a buffer lives in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    /// Host memory
    Cpu,
    /// Accelerator memory
    Gpu,
}

/// A concrete device: memory space plus device index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceHandle {
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    #[serde(default)]
    pub id: u32,
}

impl DeviceHandle {
    pub const CPU: DeviceHandle = DeviceHandle {
        device_type: DeviceType::Cpu,
        id: 0,
    };

    pub fn cpu() -> Self {
        Self::CPU
    }

    pub fn gpu(id: u32) -> Self {
        Self {
            device_type: DeviceType::Gpu,
            id,
        }
    }

    pub fn is_gpu(&self) -> bool {
        self.device_type == DeviceType::Gpu
    }
}

impl Default for DeviceHandle {
    fn default() -> Self {
        Self::CPU
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.device_type {
            DeviceType::Cpu => write!(f, "cpu:{}", self.id),
            DeviceType::Gpu => write!(f, "gpu:{}", self.id),
        }
    }
}

/// Binding to the driver's notion of the active device
pub trait DeviceContext: Send + Sync {
    /// Make `device` the active device for the calling thread
    fn set_active_device(&self, device: DeviceHandle) -> Result<()>;
}

/// Context for processes without an accelerator driver.
///
/// Selecting the host is a no-op; selecting an accelerator only records the
/// request in the log, since blocks for accelerator devices are mirrored in
/// host memory by the backend.
#[derive(Clone, Copy, Debug, Default)]
pub struct HostContext;

impl DeviceContext for HostContext {
    fn set_active_device(&self, device: DeviceHandle) -> Result<()> {
        if device.is_gpu() {
            tracing::trace!(%device, "selecting mirrored accelerator");
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(DeviceHandle::cpu().to_string(), "cpu:0");
        assert_eq!(DeviceHandle::gpu(3).to_string(), "gpu:3");
    }

    #[test]
    fn test_deserialize_handle() {
        #[derive(Deserialize)]
        struct Wrapper {
            device: DeviceHandle,
        }
        let parsed: Wrapper = toml::from_str("device = { type = \"gpu\", id = 2 }").unwrap();
        assert_eq!(parsed.device, DeviceHandle::gpu(2));

        let parsed: Wrapper = toml::from_str("device = { type = \"cpu\" }").unwrap();
        assert_eq!(parsed.device, DeviceHandle::cpu());
    }
}
