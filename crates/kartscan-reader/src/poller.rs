//! Dual reader polling loop.
//!
//! [`DualReaderPoller`] drives every configured [`ReaderSource`] on a fixed
//! cadence, consults one shared [`CooldownCache`], and publishes accepted
//! scans to an [`EventSink`].
//!
//! # Cycle
//!
//! ```text
//! for each source:
//!     poll source (overflow check, read, one framer step)
//!     tag? -> cooldown check_and_record -> publish ScanEvent
//!     sleep stagger_delay before the next source
//! every cleanup_cycles:      evict stale cooldown entries
//! every status_log_cycles:   log pending and buffered bytes per source
//! sleep poll_interval
//! ```
//!
//! The cooldown cache is shared by all sources: a tag read by reader 1 and
//! then by reader 2 inside the window produces a single event.
//!
//! Nothing in the loop is fatal. Transport faults degrade the source for one
//! cycle; sink faults drop the event.
//!
//! # Example
//!
//! ```no_run
//! use kartscan_core::SourceId;
//! use kartscan_hardware::{AnyTransport, SerialSettings, SerialTransport};
//! use kartscan_reader::{DualReaderPoller, MemorySink, PollerConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> kartscan_core::Result<()> {
//! let mut poller = DualReaderPoller::new(PollerConfig::default(), MemorySink::new())?;
//!
//! let reader1 = SerialTransport::open(SerialSettings::new("/dev/ttyUSB0")).ok();
//! poller.add_source(SourceId::new("reader1")?, reader1.map(AnyTransport::from))?;
//!
//! let shutdown = CancellationToken::new();
//! poller.run(shutdown).await;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use kartscan_core::{
    Error, Result, ScanEvent, SourceId,
    constants::{
        DEFAULT_CLEANUP_CYCLES, DEFAULT_COOLDOWN_SECS, DEFAULT_OVERFLOW_THRESHOLD,
        DEFAULT_POLL_INTERVAL_MS, DEFAULT_STAGGER_DELAY_MS, DEFAULT_STATUS_LOG_CYCLES,
    },
};
use kartscan_hardware::AnyTransport;
use kartscan_protocol::FramerConfig;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::cooldown::CooldownCache;
use crate::sink::EventSink;
use crate::source::{PollOutcome, ReaderSource, SourceStats};

/// Polling cadence, suppression window and framing parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Pause after each cycle, in milliseconds.
    pub poll_interval_ms: u64,

    /// Pause between two adjacent sources within a cycle, in milliseconds.
    pub stagger_delay_ms: u64,

    /// Cooldown window, in milliseconds.
    pub cooldown_ms: u64,

    /// Pending transport bytes above which buffers are reset.
    pub overflow_threshold: usize,

    /// Cycles between cooldown cache cleanups.
    pub cleanup_cycles: u64,

    /// Cycles between status log lines.
    pub status_log_cycles: u64,

    /// Framing parameters for every source.
    pub framer: FramerConfig,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            stagger_delay_ms: DEFAULT_STAGGER_DELAY_MS,
            cooldown_ms: DEFAULT_COOLDOWN_SECS * 1000,
            overflow_threshold: DEFAULT_OVERFLOW_THRESHOLD,
            cleanup_cycles: DEFAULT_CLEANUP_CYCLES,
            status_log_cycles: DEFAULT_STATUS_LOG_CYCLES,
            framer: FramerConfig::default(),
        }
    }
}

impl PollerConfig {
    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a cycle count is zero or the framing
    /// parameters are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.cleanup_cycles == 0 {
            return Err(Error::Config("cleanup_cycles must be positive".into()));
        }
        if self.status_log_cycles == 0 {
            return Err(Error::Config("status_log_cycles must be positive".into()));
        }
        self.framer.validate()
    }

    /// Pause after each cycle.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Pause between adjacent sources.
    pub fn stagger_delay(&self) -> Duration {
        Duration::from_millis(self.stagger_delay_ms)
    }

    /// Cooldown window.
    pub fn cooldown_window(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Snapshot of poller counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollerStats {
    /// Completed polling cycles.
    pub cycles: u64,

    /// Tags currently tracked by the cooldown cache.
    pub cooldown_entries: usize,

    /// Per-source counters, in polling order.
    pub sources: Vec<(SourceId, SourceStats)>,
}

impl PollerStats {
    /// Counters of one source.
    pub fn source(&self, id: &str) -> Option<&SourceStats> {
        self.sources
            .iter()
            .find(|(source, _)| source.as_str() == id)
            .map(|(_, stats)| stats)
    }

    /// Events published across all sources.
    pub fn events_published(&self) -> u64 {
        self.sources.iter().map(|(_, s)| s.events_published).sum()
    }
}

/// Polling loop over a set of reader sources.
#[derive(Debug)]
pub struct DualReaderPoller<S> {
    sources: Vec<ReaderSource>,
    cooldown: CooldownCache,
    sink: S,
    config: PollerConfig,
    cycles: u64,
}

impl<S: EventSink> DualReaderPoller<S> {
    /// Create a poller with no sources.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if `config` fails validation.
    pub fn new(config: PollerConfig, sink: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            sources: Vec::new(),
            cooldown: CooldownCache::new(config.cooldown_window()),
            sink,
            config,
            cycles: 0,
        })
    }

    /// Register a source, polled after those added before it.
    ///
    /// `None` registers an absent source, skipped every cycle.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a source with the same id exists.
    pub fn add_source(&mut self, id: SourceId, transport: Option<AnyTransport>) -> Result<()> {
        if self.sources.iter().any(|s| s.id() == &id) {
            return Err(Error::Config(format!("duplicate reader id: {id}")));
        }

        match transport.as_ref() {
            Some(_) => debug!(source = %id, "Registered reader source"),
            None => warn!(source = %id, "Reader unavailable, source will be skipped"),
        }

        self.sources
            .push(ReaderSource::with_transport(id, transport, self.config.framer));
        Ok(())
    }

    /// Registered sources, in polling order.
    pub fn sources(&self) -> &[ReaderSource] {
        &self.sources
    }

    /// Number of sources with a transport attached.
    pub fn present_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.is_present()).count()
    }

    /// The shared cooldown cache.
    pub fn cooldown(&self) -> &CooldownCache {
        &self.cooldown
    }

    /// The event sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Configuration in use.
    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Counter snapshot.
    pub fn stats(&self) -> PollerStats {
        PollerStats {
            cycles: self.cycles,
            cooldown_entries: self.cooldown.len(),
            sources: self
                .sources
                .iter()
                .map(|s| (s.id().clone(), s.stats()))
                .collect(),
        }
    }

    /// Run a single polling cycle, returning the events it published.
    ///
    /// Includes the stagger delays between sources but not the trailing poll
    /// interval, so tests can drive the loop cycle by cycle.
    pub async fn poll_cycle(&mut self) -> Vec<ScanEvent> {
        self.cycle(&CancellationToken::new()).await
    }

    /// Poll until `shutdown` is cancelled, then close every transport.
    ///
    /// Cancellation is observed between cycles and during every sleep, so
    /// shutdown completes within one source poll. Partial frames are
    /// discarded.
    pub async fn run(&mut self, shutdown: CancellationToken) -> PollerStats {
        info!(
            sources = self.sources.len(),
            present = self.present_sources(),
            cooldown_ms = self.config.cooldown_ms,
            poll_interval_ms = self.config.poll_interval_ms,
            "Reader poller started"
        );

        while !shutdown.is_cancelled() {
            self.cycle(&shutdown).await;
            if !sleep_unless_cancelled(self.config.poll_interval(), &shutdown).await {
                break;
            }
        }

        self.close().await;
        let stats = self.stats();
        info!(
            cycles = stats.cycles,
            events = stats.events_published(),
            "Reader poller stopped"
        );
        stats
    }

    /// Close every transport.
    ///
    /// Close failures are logged; sources are detached regardless.
    pub async fn close(&mut self) {
        for source in &mut self.sources {
            let present = source.is_present();
            match source.close().await {
                Ok(()) if present => info!(source = %source.id(), "Reader closed"),
                Ok(()) => {}
                Err(e) => warn!(source = %source.id(), error = %e, "Failed to close reader"),
            }
        }
    }

    async fn cycle(&mut self, shutdown: &CancellationToken) -> Vec<ScanEvent> {
        self.cycles += 1;
        let mut published = Vec::new();

        for index in 0..self.sources.len() {
            if index > 0 && !sleep_unless_cancelled(self.config.stagger_delay(), shutdown).await {
                break;
            }
            if let Some(event) = self.poll_source(index).await {
                published.push(event);
            }
        }

        if self.cycles % self.config.cleanup_cycles == 0 {
            let removed = self.cooldown.cleanup(now());
            if removed > 0 {
                debug!(
                    removed,
                    remaining = self.cooldown.len(),
                    "Evicted expired cooldown entries"
                );
            }
        }

        if self.cycles % self.config.status_log_cycles == 0 {
            self.log_status().await;
        }

        published
    }

    async fn poll_source(&mut self, index: usize) -> Option<ScanEvent> {
        let source = &mut self.sources[index];
        let was_degraded = source.is_degraded();

        let tag = match source.poll(self.config.overflow_threshold).await {
            PollOutcome::Absent | PollOutcome::Idle => None,
            PollOutcome::Degraded(error) => {
                if was_degraded {
                    debug!(source = %source.id(), %error, "Reader still failing");
                } else {
                    warn!(
                        source = %source.id(),
                        %error,
                        disconnected = error.is_disconnected(),
                        "Reader error, skipping this cycle"
                    );
                }
                None
            }
            PollOutcome::Overflow { pending } => {
                warn!(
                    source = %source.id(),
                    pending,
                    threshold = self.config.overflow_threshold,
                    "Reader input overflow, buffers cleared"
                );
                None
            }
            PollOutcome::Tag(tag) => Some(tag),
        };

        if was_degraded && !source.is_degraded() {
            info!(source = %source.id(), "Reader recovered");
        }

        let tag = tag?;
        if !self.cooldown.check_and_record(&tag, now()) {
            source.stats_mut().tags_suppressed += 1;
            debug!(source = %source.id(), tag = %tag, "Tag in cooldown, ignored");
            return None;
        }

        let event = ScanEvent::new(source.id().clone(), tag);
        match self.sink.publish(&event).await {
            Ok(()) => {
                source.stats_mut().events_published += 1;
                info!(source = %event.source, tag = %event.tag, "Tag scanned");
                Some(event)
            }
            Err(error) => {
                source.stats_mut().publish_failures += 1;
                warn!(
                    source = %event.source,
                    tag = %event.tag,
                    %error,
                    "Failed to publish scan, event dropped"
                );
                None
            }
        }
    }

    async fn log_status(&mut self) {
        for source in &mut self.sources {
            let Some(status) = source.status().await else {
                continue;
            };
            if status.pending.unwrap_or(0) == 0 && status.buffered == 0 {
                continue;
            }
            debug!(
                source = %source.id(),
                pending = ?status.pending,
                buffered = status.buffered,
                "Reader status"
            );
            trace!(
                source = %source.id(),
                buffer = %hex(source.framer().buffer()),
                "Reader buffer content"
            );
        }
    }
}

/// Current instant on the tokio clock, so paused-time tests control it.
fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

/// Sleep for `duration`; returns `false` if `shutdown` fired first.
async fn sleep_unless_cancelled(duration: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
