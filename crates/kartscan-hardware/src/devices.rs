//! Enum wrapper for transport dispatch.
//!
//! Native `async fn` in traits (RPITIT - Rust Edition 2024) are not
//! object-safe, so a poller cannot hold `Box<dyn Transport>`. [`AnyTransport`]
//! provides concrete type dispatch instead, letting serial and mock links
//! share one collection.
//!
//! # Examples
//!
//! ```
//! use kartscan_hardware::devices::AnyTransport;
//! use kartscan_hardware::mock::MockTransport;
//! use kartscan_hardware::traits::Transport;
//!
//! let (transport, _handle) = MockTransport::new("reader1");
//! let any = AnyTransport::from(transport);
//! assert_eq!(any.name(), "reader1");
//! ```

use crate::mock::MockTransport;
use crate::serial::SerialTransport;
use crate::traits::Transport;
use crate::Result;

/// Enum wrapper for transport dispatch.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyTransport {
    /// Operating system serial port.
    Serial(SerialTransport),

    /// Mock link for development and testing.
    Mock(MockTransport),
}

impl Transport for AnyTransport {
    fn name(&self) -> &str {
        match self {
            Self::Serial(transport) => transport.name(),
            Self::Mock(transport) => transport.name(),
        }
    }

    async fn bytes_pending(&mut self) -> Result<usize> {
        match self {
            Self::Serial(transport) => transport.bytes_pending().await,
            Self::Mock(transport) => transport.bytes_pending().await,
        }
    }

    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        match self {
            Self::Serial(transport) => transport.read(max).await,
            Self::Mock(transport) => transport.read(max).await,
        }
    }

    async fn reset_input_buffer(&mut self) -> Result<()> {
        match self {
            Self::Serial(transport) => transport.reset_input_buffer().await,
            Self::Mock(transport) => transport.reset_input_buffer().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            Self::Serial(transport) => transport.close().await,
            Self::Mock(transport) => transport.close().await,
        }
    }
}

impl From<SerialTransport> for AnyTransport {
    fn from(transport: SerialTransport) -> Self {
        Self::Serial(transport)
    }
}

impl From<MockTransport> for AnyTransport {
    fn from(transport: MockTransport) -> Self {
        Self::Mock(transport)
    }
}
