//! Scan pipeline for kartscan: polling, deduplication and delivery.
//!
//! This crate composes the protocol framer and the reader transports into
//! the service loop:
//!
//! ```text
//! Transport ──► PacketFramer ──► CooldownCache ──► EventSink
//!  (per source)   (per source)       (shared)
//! ```
//!
//! - [`cooldown`]: time-windowed suppression of repeated reads
//! - [`source`]: a reader, its framer and its counters
//! - [`poller`]: the polling loop across all sources
//! - [`sink`]: where accepted scans go

pub mod cooldown;
pub mod poller;
pub mod sink;
pub mod source;

pub use cooldown::CooldownCache;
pub use poller::{DualReaderPoller, PollerConfig, PollerStats};
pub use sink::{ChannelSink, EventSink, JsonLinesSink, MemorySink, SinkError};
pub use source::{PollOutcome, ReaderSource, SourceStats, SourceStatus};
