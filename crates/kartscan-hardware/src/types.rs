//! Serial link settings.

use kartscan_core::constants::{DEFAULT_BAUD_RATE, DEFAULT_SERIAL_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for opening a reader's serial port.
///
/// RDM6300 readers talk 9600 baud, 8 data bits, no parity, one stop bit,
/// which is all this crate configures; only the rate and timeout vary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    /// Device path (e.g. `/dev/ttyUSB0`, `/dev/serial0`, `COM3`).
    pub port: String,

    /// Line speed in bits per second.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Driver read timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_SERIAL_TIMEOUT_MS
}

impl SerialSettings {
    /// Settings for `port` with the reader's default rate and timeout.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_SERIAL_TIMEOUT_MS,
        }
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Read timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
