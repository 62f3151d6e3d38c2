//! Serial port transport for RDM6300 readers.
//!
//! Wraps a [`serialport`] handle configured 8N1 with a short read timeout.
//! Every read asks the driver how many bytes are queued first and only reads
//! those, so calls return immediately even though the driver API is
//! blocking.

use std::io::{ErrorKind, Read};

use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, info};

use crate::{HardwareError, Result, traits::Transport, types::SerialSettings};

/// Transport backed by an operating system serial port.
pub struct SerialTransport {
    /// Open port; `None` once closed.
    port: Option<Box<dyn SerialPort>>,

    /// Settings the port was opened with.
    settings: SerialSettings,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("settings", &self.settings)
            .field("open", &self.port.is_some())
            .finish()
    }
}

impl SerialTransport {
    /// Open the port described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns `HardwareError::ConfigurationError` for an empty path or a
    /// zero baud rate, and `HardwareError::InitializationFailed` if the
    /// driver cannot open the port.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kartscan_hardware::{SerialSettings, SerialTransport};
    ///
    /// let transport = SerialTransport::open(SerialSettings::new("/dev/ttyUSB0"))?;
    /// # Ok::<(), kartscan_hardware::HardwareError>(())
    /// ```
    pub fn open(settings: SerialSettings) -> Result<Self> {
        if settings.port.trim().is_empty() {
            return Err(HardwareError::configuration("serial port path is empty"));
        }
        if settings.baud_rate == 0 {
            return Err(HardwareError::configuration(format!(
                "baud rate for {} must be positive",
                settings.port
            )));
        }

        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.timeout())
            .open()
            .map_err(|e| {
                HardwareError::initialization_failed(format!("{}: {e}", settings.port))
            })?;

        info!(
            port = %settings.port,
            baud_rate = settings.baud_rate,
            "Opened serial port"
        );

        Ok(Self {
            port: Some(port),
            settings,
        })
    }

    /// Settings the port was opened with.
    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    /// Whether the port is still open.
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| HardwareError::disconnected(&self.settings.port))
    }
}

impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.settings.port
    }

    async fn bytes_pending(&mut self) -> Result<usize> {
        let pending = self.port_mut()?.bytes_to_read()?;
        Ok(pending as usize)
    }

    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        if max == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; max];
        match self.port_mut()?.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reset_input_buffer(&mut self) -> Result<()> {
        self.port_mut()?.clear(ClearBuffer::Input)?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!(port = %self.settings.port, "Closed serial port");
        }
        Ok(())
    }
}

/// Names of the serial ports the operating system reports.
///
/// # Errors
///
/// Returns an error if port enumeration is not supported or fails.
pub fn available_ports() -> Result<Vec<String>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .collect())
}
