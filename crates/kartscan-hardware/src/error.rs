//! Error types for transport operations.
//!
//! This module defines error types specific to reader transports, covering
//! disconnection, failed port setup and link-level I/O faults.

/// Result type alias for transport operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during transport operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Transport is not connected or has been closed.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Link-level communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// Port could not be opened.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Invalid transport settings.
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// Error reported by the serial port driver.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Create a new configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Whether the transport is gone for good, as opposed to a transient fault.
    pub fn is_disconnected(&self) -> bool {
        match self {
            Self::Disconnected { .. } => true,
            Self::Serial(e) => e.kind() == serialport::ErrorKind::NoDevice,
            _ => false,
        }
    }
}
