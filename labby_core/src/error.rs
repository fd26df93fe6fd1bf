use thiserror::Error;

/// Errors returned by `DeviceController` and the experiment runner.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LabbyError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device {device} does not support {command}")]
    UnsupportedCommand { device: String, command: String },
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    #[error("hardware error on {device}: {message}")]
    Hardware { device: String, message: String },
    #[error("timeout talking to {device}")]
    Timeout { device: String },
    #[error("interrupted")]
    Interrupted,
    #[error("experiment error: {0}")]
    Experiment(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("device {0:?} is configured more than once")]
    DuplicateDevice(String),
    #[error("device {device:?} is configured as {configured} but driver {driver} builds a {actual}")]
    DeviceTypeMismatch {
        device: String,
        driver: String,
        configured: String,
        actual: String,
    },
    #[error("cannot create device {device:?}: {message}")]
    Driver { device: String, message: String },
}

pub type Result<T> = std::result::Result<T, LabbyError>;
