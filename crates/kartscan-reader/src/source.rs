//! One reader as seen by the poller.
//!
//! A [`ReaderSource`] pairs an optional transport with the framer that owns
//! its accumulation buffer. A source whose transport failed to open stays in
//! the poller as an absent source, so reader numbering and statistics remain
//! stable.

use kartscan_core::{SourceId, TagId};
use kartscan_hardware::{AnyTransport, HardwareError, Transport};
use kartscan_protocol::{FramerConfig, PacketFramer};
use serde::Serialize;

/// Per-source counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Bytes read from the transport.
    pub bytes_read: u64,

    /// Tags produced by the framer.
    pub tags_decoded: u64,

    /// Tags dropped because they were in cooldown.
    pub tags_suppressed: u64,

    /// Events accepted by the sink.
    pub events_published: u64,

    /// Events the sink rejected.
    pub publish_failures: u64,

    /// Input buffer resets forced by overflow.
    pub overflow_resets: u64,

    /// Failed reads and failed buffer resets.
    pub read_errors: u64,

    /// Cycles skipped because the transport reported an error.
    pub degraded_cycles: u64,
}

/// Outcome of polling one source for one cycle.
#[derive(Debug)]
pub enum PollOutcome {
    /// No transport is attached.
    Absent,

    /// The transport reported an error; the source is skipped this cycle.
    Degraded(HardwareError),

    /// Pending bytes exceeded the threshold and all buffers were reset.
    Overflow {
        /// Bytes that were waiting when the reset was triggered.
        pending: usize,
    },

    /// Bytes were processed but no tag completed.
    Idle,

    /// The framer produced a validated tag.
    Tag(TagId),
}

/// Buffer levels reported by the periodic status log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStatus {
    /// Bytes waiting in the transport, if it could be queried.
    pub pending: Option<usize>,

    /// Bytes held by the framer.
    pub buffered: usize,
}

/// A reader, its framer, and its counters.
#[derive(Debug)]
pub struct ReaderSource {
    id: SourceId,
    transport: Option<AnyTransport>,
    framer: PacketFramer,
    stats: SourceStats,
    degraded: bool,
}

impl ReaderSource {
    /// Create a source around an open transport.
    pub fn new(id: SourceId, transport: AnyTransport, framer: FramerConfig) -> Self {
        Self::with_transport(id, Some(transport), framer)
    }

    /// Create a source whose reader is not available.
    pub fn absent(id: SourceId, framer: FramerConfig) -> Self {
        Self::with_transport(id, None, framer)
    }

    /// Create a source with an optional transport.
    pub fn with_transport(
        id: SourceId,
        transport: Option<AnyTransport>,
        framer: FramerConfig,
    ) -> Self {
        Self {
            id,
            transport,
            framer: PacketFramer::with_config(framer),
            stats: SourceStats::default(),
            degraded: false,
        }
    }

    /// Source identifier.
    pub fn id(&self) -> &SourceId {
        &self.id
    }

    /// Whether a transport is attached.
    pub fn is_present(&self) -> bool {
        self.transport.is_some()
    }

    /// Whether the last poll ended in a transport error.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Name of the attached transport.
    pub fn transport_name(&self) -> Option<&str> {
        self.transport.as_ref().map(|t| t.name())
    }

    /// The source's framer.
    pub fn framer(&self) -> &PacketFramer {
        &self.framer
    }

    /// Counters.
    pub fn stats(&self) -> SourceStats {
        self.stats
    }

    pub(crate) fn stats_mut(&mut self) -> &mut SourceStats {
        &mut self.stats
    }

    /// Run one poll step: overflow check, read, one framer step.
    ///
    /// Pending bytes are checked before reading. Above
    /// `overflow_threshold`, the transport's input buffer and the framer
    /// buffer are both cleared and nothing is read this cycle. Otherwise the
    /// pending bytes are read (possibly none) and fed to the framer, which
    /// advances already-buffered data even when nothing new arrived.
    pub async fn poll(&mut self, overflow_threshold: usize) -> PollOutcome {
        let Some(transport) = self.transport.as_mut() else {
            return PollOutcome::Absent;
        };

        let pending = match transport.bytes_pending().await {
            Ok(pending) => pending,
            Err(e) => return self.degrade(e),
        };

        if pending > overflow_threshold {
            self.stats.overflow_resets += 1;
            self.framer.clear();
            if let Err(e) = transport.reset_input_buffer().await {
                self.stats.read_errors += 1;
                return self.degrade(e);
            }
            self.degraded = false;
            return PollOutcome::Overflow { pending };
        }

        let bytes = if pending > 0 {
            match transport.read(pending).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.stats.read_errors += 1;
                    return self.degrade(e);
                }
            }
        } else {
            Vec::new()
        };

        self.degraded = false;
        self.stats.bytes_read += bytes.len() as u64;

        match self.framer.feed(&bytes) {
            Some(tag) => {
                self.stats.tags_decoded += 1;
                PollOutcome::Tag(tag)
            }
            None => PollOutcome::Idle,
        }
    }

    /// Current buffer levels, or `None` for an absent source.
    pub async fn status(&mut self) -> Option<SourceStatus> {
        let transport = self.transport.as_mut()?;
        let pending = transport.bytes_pending().await.ok();
        Some(SourceStatus {
            pending,
            buffered: self.framer.buffered(),
        })
    }

    /// Close the transport and drop any partial frame.
    ///
    /// # Errors
    ///
    /// Returns the transport's error if closing fails; the source is
    /// detached either way.
    pub async fn close(&mut self) -> Result<(), HardwareError> {
        self.framer.clear();
        match self.transport.take() {
            Some(mut transport) => transport.close().await,
            None => Ok(()),
        }
    }

    fn degrade(&mut self, error: HardwareError) -> PollOutcome {
        self.degraded = true;
        self.stats.degraded_cycles += 1;
        PollOutcome::Degraded(error)
    }
}
