//! Reader transport layer for kartscan.
//!
//! This crate provides the byte pipes between RFID readers and the poller:
//! a [`Transport`] trait, a serial port implementation, a mock for tests and
//! development, and an enum wrapper for dispatch.
//!
//! # Design Philosophy
//!
//! - **Async-first**: All I/O operations use native `async fn` in traits
//!   (Rust 1.90 + Edition 2024 RPITIT).
//! - **Non-blocking reads**: callers ask how many bytes are pending and read
//!   only those, so a silent reader never stalls the polling loop.
//! - **Error-aware**: All operations return [`Result<T>`][error::Result] with
//!   a [`HardwareError`] describing the failure.
//!
//! # Example
//!
//! ```no_run
//! use kartscan_hardware::{AnyTransport, SerialSettings, SerialTransport, Transport};
//!
//! # async fn example() -> kartscan_hardware::Result<()> {
//! let serial = SerialTransport::open(SerialSettings::new("/dev/ttyUSB0"))?;
//! let mut reader = AnyTransport::from(serial);
//!
//! let pending = reader.bytes_pending().await?;
//! let bytes = reader.read(pending).await?;
//! # Ok(())
//! # }
//! ```

pub mod devices;
pub mod error;
pub mod mock;
pub mod serial;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use devices::AnyTransport;
pub use error::{HardwareError, Result};
pub use serial::{SerialTransport, available_ports};
pub use traits::Transport;
pub use types::SerialSettings;
