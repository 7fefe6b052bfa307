//! Error types shared by every kernel operation.
//!
//! Nothing in this crate recovers from an error mid-call. Each variant carries
//! enough context (key path, layer name, dimension) for the caller to report
//! the fault and decide whether to stop the pipeline.

use thiserror::Error;

/// Result type for kernel operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error raised by descriptor parsing, kernel construction or execution
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or incomplete configuration document
    #[error("configuration error at '{key}': {message}")]
    Config {
        /// Dotted key path of the offending entry, e.g. `net.output_layers`
        key: String,
        /// What is wrong with it
        message: String,
    },

    /// The calling pipeline broke the kernel's contract
    #[error("contract violation: {0}")]
    Contract(String),

    /// Accelerator or runtime failure during a copy or the forward pass
    #[error("device error: {0}")]
    Device(String),
}

impl Error {
    pub(crate) fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            key: key.into(),
            message: message.into(),
        }
    }

    pub(crate) fn missing(key: impl Into<String>, what: &str) -> Self {
        Error::config(key, format!("missing {what}"))
    }

    /// Returns true if the error is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. })
    }

    /// Returns true if the error is a contract violation
    pub fn is_contract(&self) -> bool {
        matches!(self, Error::Contract(_))
    }

    /// Returns true if the error is a device error
    pub fn is_device(&self) -> bool {
        matches!(self, Error::Device(_))
    }

    /// Key path named by a configuration error
    pub fn config_key(&self) -> Option<&str> {
        match self {
            Error::Config { key, .. } => Some(key),
            _ => None,
        }
    }
}

#[cfg(feature = "candle")]
impl From<candle_core::Error> for Error {
    fn from(err: candle_core::Error) -> Self {
        Error::Device(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_key() {
        let err = Error::missing("net.output_layers", "names of output layers");
        assert!(err.is_config());
        assert_eq!(err.config_key(), Some("net.output_layers"));
        assert_eq!(
            err.to_string(),
            "configuration error at 'net.output_layers': missing names of output layers"
        );
    }

    #[test]
    fn test_kind_predicates() {
        assert!(Error::Contract("x".into()).is_contract());
        assert!(Error::Device("x".into()).is_device());
        assert_eq!(Error::Device("x".into()).config_key(), None);
    }
}
