//! RDM6300 wire protocol for kartscan.
//!
//! - [`packet`]: the fixed-size frame, its checksum and validation
//! - [`framer`]: per-reader accumulation buffer turning a noisy byte stream
//!   into validated tag identifiers
//! - [`codec`]: tokio-util codec over the framer for async byte streams

pub mod codec;
pub mod framer;
pub mod packet;

pub use codec::TagCodec;
pub use framer::{FramerConfig, FramerStats, PacketFramer};
pub use packet::{Packet, PacketError, encode, xor_checksum};
