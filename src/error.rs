//! Error taxonomy shared by the sensor, transformation and pipeline layers

use std::time::Duration;

use thiserror::Error;

use crate::sensor::Channel;

/// Errors raised by a sensor backend
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("no device at index {index} ({installed} installed)")]
    Unavailable { index: u32, installed: u32 },

    #[error("{0}")]
    Rejected(String),

    #[error("no capture within {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),
}

/// Coarse classification used for logging and process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DeviceUnavailable,
    ConfigurationRejected,
    CaptureTimeout,
    CaptureUnavailable,
    ConfigurationMismatch,
    MissingChannel,
    Render,
    Config,
    InvalidState,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("depth sensor unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("camera configuration rejected: {0}")]
    ConfigurationRejected(String),

    #[error("timed out waiting for a capture ({attempts} attempts)")]
    CaptureTimeout { attempts: u32 },

    #[error("capture unavailable after {attempts} attempts: {reason}")]
    CaptureUnavailable { attempts: u32, reason: String },

    #[error("{what} image is {width}x{height}, expected {expected_width}x{expected_height}")]
    ConfigurationMismatch {
        what: &'static str,
        width: u32,
        height: u32,
        expected_width: u32,
        expected_height: u32,
    },

    #[error("{0} image missing from capture")]
    MissingChannel(Channel),

    #[error("render surface: {0}")]
    Render(String),

    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("pipeline is {actual}, expected {expected}")]
    InvalidState {
        actual: &'static str,
        expected: &'static str,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            Error::ConfigurationRejected(_) => ErrorKind::ConfigurationRejected,
            Error::CaptureTimeout { .. } => ErrorKind::CaptureTimeout,
            Error::CaptureUnavailable { .. } => ErrorKind::CaptureUnavailable,
            Error::ConfigurationMismatch { .. } => ErrorKind::ConfigurationMismatch,
            Error::MissingChannel(_) => ErrorKind::MissingChannel,
            Error::Render(_) => ErrorKind::Render,
            Error::Config(_) => ErrorKind::Config,
            Error::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }

    /// Process exit status for this error (0 is reserved for a clean quit)
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::DeviceUnavailable => 2,
            ErrorKind::ConfigurationRejected => 3,
            ErrorKind::CaptureTimeout => 4,
            ErrorKind::CaptureUnavailable => 5,
            ErrorKind::ConfigurationMismatch => 6,
            ErrorKind::Render => 7,
            ErrorKind::Config => 8,
            ErrorKind::InvalidState => 9,
            ErrorKind::MissingChannel => 10,
        }
    }
}

/// A single sensor failure; the pipeline's capture retry reports its own attempt count.
impl From<SensorError> for Error {
    fn from(err: SensorError) -> Self {
        match err {
            SensorError::Unavailable { .. } => Error::DeviceUnavailable(err.to_string()),
            SensorError::Rejected(reason) => Error::ConfigurationRejected(reason),
            SensorError::Timeout(_) => Error::CaptureTimeout { attempts: 1 },
            SensorError::Failed(reason) => Error::CaptureUnavailable {
                attempts: 1,
                reason,
            },
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
