//! Kernel settings documents.
//!
//! ```toml
//! [kernel]
//! name = "Net"
//! batch_size = 4
//! descriptor = "nets/resnet.toml"
//! output_columns = ["prob"]
//! device = { type = "gpu", id = 0 }
//! ```

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::descriptor::ModelDescriptor;
use crate::device::DeviceHandle;
use crate::error::{Error, Result};
use crate::kernel::{KernelConfig, NetArgs, NET_KERNEL};

/// Key reported when the settings document itself cannot be read or parsed
pub const SETTINGS_KEY: &str = "<settings>";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KernelSettings {
    pub kernel: KernelSection,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KernelSection {
    /// Registry name of the kernel
    #[serde(default = "default_kernel_name")]
    pub name: String,
    pub batch_size: usize,
    /// Path of the model descriptor document
    pub descriptor: PathBuf,
    pub output_columns: Vec<String>,
    #[serde(default)]
    pub device: DeviceHandle,
}

fn default_kernel_name() -> String {
    NET_KERNEL.to_string()
}

impl KernelSettings {
    pub fn parse(document: &str) -> Result<Self> {
        toml::from_str(document).map_err(|err| Error::config(SETTINGS_KEY, err.message().to_string()))
    }

    /// Read a settings file. A relative descriptor path is resolved against
    /// the directory holding the settings file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|err| {
            Error::config(SETTINGS_KEY, format!("cannot read {}: {err}", path.display()))
        })?;
        let mut settings = Self::parse(&document)?;
        if settings.kernel.descriptor.is_relative() {
            if let Some(dir) = path.parent() {
                settings.kernel.descriptor = dir.join(&settings.kernel.descriptor);
            }
        }
        Ok(settings)
    }

    /// Load the descriptor and assemble the kernel configuration
    pub fn into_config(self) -> Result<KernelConfig> {
        let section = self.kernel;
        if section.batch_size == 0 {
            return Err(Error::config("kernel.batch_size", "must be at least 1"));
        }
        let descriptor = ModelDescriptor::from_path(&section.descriptor)?;
        tracing::debug!(
            kernel = %section.name,
            device = %section.device,
            batch_size = section.batch_size,
            "loaded kernel settings"
        );
        Ok(KernelConfig {
            device: section.device,
            output_columns: section.output_columns,
            args: NetArgs {
                descriptor,
                batch_size: section.batch_size,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use crate::descriptor::tests::MINIMAL;
    use crate::device::DeviceType;

    #[test]
    fn test_parse_defaults() {
        let settings = KernelSettings::parse(
            r#"
            [kernel]
            batch_size = 8
            descriptor = "net.toml"
            output_columns = ["prob"]
            "#,
        )
        .unwrap();
        assert_eq!(settings.kernel.name, NET_KERNEL);
        assert_eq!(settings.kernel.device, DeviceHandle::cpu());
        assert_eq!(settings.kernel.batch_size, 8);
    }

    #[test]
    fn test_parse_device() {
        let settings = KernelSettings::parse(
            r#"
            [kernel]
            name = "Net"
            batch_size = 1
            descriptor = "net.toml"
            output_columns = ["a", "b"]
            device = { type = "gpu", id = 2 }
            "#,
        )
        .unwrap();
        assert_eq!(settings.kernel.device.device_type, DeviceType::Gpu);
        assert_eq!(settings.kernel.device.id, 2);
        assert_eq!(settings.kernel.output_columns.len(), 2);
    }

    #[test]
    fn test_parse_errors() {
        let err = KernelSettings::parse("[kernel]\nbatch_size = 1").unwrap_err();
        assert_eq!(err.config_key(), Some(SETTINGS_KEY));

        let err = KernelSettings::parse("not toml =").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_from_path_resolves_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let mut descriptor = std::fs::File::create(dir.path().join("net.toml")).unwrap();
        descriptor.write_all(MINIMAL.as_bytes()).unwrap();
        let settings_path = dir.path().join("kernel.toml");
        std::fs::write(
            &settings_path,
            "[kernel]\nbatch_size = 4\ndescriptor = \"net.toml\"\noutput_columns = [\"prob\"]\n",
        )
        .unwrap();

        let config = KernelSettings::from_path(&settings_path).unwrap().into_config().unwrap();
        assert_eq!(config.args.batch_size, 4);
        assert_eq!(config.args.descriptor.model_path, Path::new("m.net"));
        assert_eq!(config.output_columns, vec!["prob".to_string()]);
    }

    #[test]
    fn test_into_config_errors() {
        let settings = KernelSettings::parse(
            "[kernel]\nbatch_size = 0\ndescriptor = \"x.toml\"\noutput_columns = []\n",
        )
        .unwrap();
        assert_eq!(settings.into_config().unwrap_err().config_key(), Some("kernel.batch_size"));

        let settings = KernelSettings::parse(
            "[kernel]\nbatch_size = 1\ndescriptor = \"/nonexistent/net.toml\"\noutput_columns = []\n",
        )
        .unwrap();
        assert!(settings.into_config().unwrap_err().is_config());
    }

    #[test]
    fn test_missing_settings_file() {
        let err = KernelSettings::from_path("/nonexistent/kernel.toml").unwrap_err();
        assert_eq!(err.config_key(), Some(SETTINGS_KEY));
    }
}
