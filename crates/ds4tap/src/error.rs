use std::path::PathBuf;

use ds4tap_device::{TargetDevice, TransportError};
use thiserror::Error;

use crate::config::BackendKind;
use crate::record::RecordError;

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("yaml deserialize error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unsupported config version: {0}")]
    UnsupportedVersion(u8),
    #[error("invalid {field}: {value:?}")]
    InvalidValue { field: &'static str, value: String },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failures that stop the process before or while a session runs.
#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error("no controller matching {:04x}:{:04x} found", .0.vendor_id, .0.product_id)]
    DeviceNotFound(TargetDevice),
    #[error("{0:?} backend is not available in this build")]
    BackendUnavailable(BackendKind),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("device error: {0}")]
    Transport(#[from] TransportError),
    #[error("failed to set Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("record error: {0}")]
    Record(#[from] RecordError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StartupError {
    /// Process exit code. A missing controller is told apart from other
    /// failures.
    pub(crate) fn exit_code(&self) -> u8 {
        match self {
            StartupError::DeviceNotFound(_) => 2,
            _ => 1,
        }
    }
}
