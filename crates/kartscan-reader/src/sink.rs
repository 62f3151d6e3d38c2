//! Destinations for accepted scan events.
//!
//! The poller hands every accepted [`ScanEvent`] to an [`EventSink`]. Delivery
//! is at-most-once: a failed publish is logged by the poller and the event is
//! dropped, so a slow or absent consumer never stalls reader polling.
//!
//! - [`ChannelSink`]: forwards into a bounded tokio channel
//! - [`JsonLinesSink`]: writes one JSON object per line to any writer
//! - [`MemorySink`]: records events in memory, for tests

#![allow(async_fn_in_trait)]

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use kartscan_core::ScanEvent;
use serde::Serialize;
use tokio::sync::mpsc;

/// Errors that can occur while publishing an event.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Consumer is not reachable right now.
    #[error("Sink disconnected: {0}")]
    Disconnected(String),

    /// Consumer has gone away for good.
    #[error("Sink closed")]
    Closed,

    /// Consumer is not keeping up.
    #[error("Sink full")]
    Full,

    /// Writing the event failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Event could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Consumer of accepted scan events.
pub trait EventSink: Send {
    /// Deliver one event.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the event could not be delivered. The
    /// caller does not retry.
    async fn publish(&mut self, event: &ScanEvent) -> Result<(), SinkError>;
}

/// Sink forwarding events into a bounded tokio channel.
///
/// Publishing never waits: a full channel fails with [`SinkError::Full`].
///
/// # Example
///
/// ```
/// use kartscan_core::{ScanEvent, SourceId, TagId};
/// use kartscan_reader::{ChannelSink, EventSink};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let (mut sink, mut rx) = ChannelSink::new(16);
/// let event = ScanEvent::new(
///     SourceId::new("reader1").unwrap(),
///     TagId::new("AABBCCDDEE").unwrap(),
/// );
///
/// sink.publish(&event).await.unwrap();
/// assert_eq!(rx.recv().await.unwrap(), event);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<ScanEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver consuming its events.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ScanEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    async fn publish(&mut self, event: &ScanEvent) -> Result<(), SinkError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })
    }
}

/// Wire shape of a published scan.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanMessage<'a> {
    cart_id: &'a str,
    tag_id: &'a str,
    source: &'a str,
    timestamp: DateTime<Utc>,
}

/// Sink writing newline-delimited JSON.
///
/// Each line carries the cart identifier alongside the event:
///
/// ```text
/// {"cartId":"1234","tagId":"AABBCCDDEE","source":"reader1","timestamp":"2025-01-15T12:30:00Z"}
/// ```
///
/// Writes are synchronous and run on the polling task, and every line is
/// flushed. The writer must not block for long: stdout or a local file
/// behind a [`BufWriter`](std::io::BufWriter), not a network peer.
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: W,
    cart_id: String,
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Create a sink writing to `writer` on behalf of `cart_id`.
    pub fn new(writer: W, cart_id: impl Into<String>) -> Self {
        Self {
            writer,
            cart_id: cart_id.into(),
        }
    }

    /// Cart identifier stamped on every line.
    pub fn cart_id(&self) -> &str {
        &self.cart_id
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
    async fn publish(&mut self, event: &ScanEvent) -> Result<(), SinkError> {
        let message = ScanMessage {
            cart_id: &self.cart_id,
            tag_id: event.tag.as_str(),
            source: event.source.as_str(),
            timestamp: event.timestamp,
        };
        serde_json::to_writer(&mut self.writer, &message)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// In-memory sink for tests.
///
/// Clones share the same event log, so a test can keep one clone while the
/// poller owns another. While disconnected, publishing fails and nothing is
/// recorded.
#[derive(Debug, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<ScanEvent>>>,
    connected: Arc<AtomicBool>,
}

impl MemorySink {
    /// Create a connected, empty sink.
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Switch between accepting and rejecting events.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Snapshot of recorded events, oldest first.
    pub fn events(&self) -> Vec<ScanEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for MemorySink {
    async fn publish(&mut self, event: &ScanEvent) -> Result<(), SinkError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(SinkError::Disconnected("memory sink offline".to_string()));
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        Ok(())
    }
}
