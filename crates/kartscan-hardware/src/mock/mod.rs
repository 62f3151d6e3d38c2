//! Mock transport for testing and development.
//!
//! This module provides a simulated reader link that can be fed bytes and
//! faults programmatically without requiring physical hardware.

pub mod transport;

pub use transport::{MockTransport, MockTransportHandle, MockTransportStats};
