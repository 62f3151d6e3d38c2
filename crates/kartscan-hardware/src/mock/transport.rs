//! Mock reader transport.
//!
//! The transport and its handle are connected by an unbounded channel: the
//! handle queues bytes and faults, and the transport moves them into its
//! simulated input buffer each time it is polled. Counters shared between
//! the two let tests observe resets and closes after the transport has been
//! handed to a poller.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use kartscan_core::TagId;
use kartscan_protocol::encode;
use tokio::sync::mpsc;

use crate::{HardwareError, Result, traits::Transport};

/// Mock transport for testing and development.
///
/// # Examples
///
/// ```
/// use kartscan_core::TagId;
/// use kartscan_hardware::mock::MockTransport;
/// use kartscan_hardware::traits::Transport;
///
/// #[tokio::main]
/// async fn main() -> kartscan_hardware::Result<()> {
///     let (mut transport, handle) = MockTransport::new("reader1");
///
///     // Present a tag: the handle queues its 14-byte frame
///     handle.present_tag(&TagId::new("1A2B3C4D5E").unwrap())?;
///
///     assert_eq!(transport.bytes_pending().await?, 14);
///     let bytes = transport.read(14).await?;
///     assert_eq!(&bytes[..], b"\x021A2B3C4D5E1E\x03");
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockTransport {
    /// Channel receiver for link events
    event_rx: mpsc::UnboundedReceiver<LinkEvent>,

    /// Transport name
    name: String,

    /// Simulated driver input buffer
    input: VecDeque<u8>,

    /// Fault to report on the next operation
    pending_fault: Option<String>,

    /// Device unplugged
    unplugged: bool,

    /// Counters shared with the handle
    stats: Arc<MockTransportStats>,
}

impl MockTransport {
    /// Create a new mock transport.
    ///
    /// Returns a tuple of (MockTransport, MockTransportHandle) where the
    /// handle can be used to simulate reader output.
    pub fn new(name: impl Into<String>) -> (Self, MockTransportHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let name = name.into();
        let stats = Arc::new(MockTransportStats::default());

        let transport = Self {
            event_rx,
            name: name.clone(),
            input: VecDeque::new(),
            pending_fault: None,
            unplugged: false,
            stats: Arc::clone(&stats),
        };

        let handle = MockTransportHandle {
            event_tx,
            name,
            stats,
        };

        (transport, handle)
    }

    /// Move queued link events into the simulated input buffer.
    fn pump(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                LinkEvent::Bytes(bytes) => {
                    if !self.unplugged {
                        self.input.extend(bytes);
                    }
                }
                LinkEvent::Fault(message) => self.pending_fault = Some(message),
                LinkEvent::Unplug => self.unplugged = true,
            }
        }
    }

    /// Run pending events and report the transport's health.
    fn check(&mut self) -> Result<()> {
        if self.stats.closed.load(Ordering::SeqCst) {
            return Err(HardwareError::disconnected(&self.name));
        }
        self.pump();
        if self.unplugged {
            return Err(HardwareError::disconnected(&self.name));
        }
        if let Some(message) = self.pending_fault.take() {
            return Err(HardwareError::communication(message));
        }
        Ok(())
    }
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    async fn bytes_pending(&mut self) -> Result<usize> {
        self.check()?;
        Ok(self.input.len())
    }

    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        self.check()?;
        let count = max.min(self.input.len());
        let bytes: Vec<u8> = self.input.drain(..count).collect();
        self.stats
            .bytes_read
            .fetch_add(bytes.len() as u64, Ordering::SeqCst);
        Ok(bytes)
    }

    async fn reset_input_buffer(&mut self) -> Result<()> {
        self.check()?;
        self.input.clear();
        self.stats.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.stats.closed.store(true, Ordering::SeqCst);
        self.input.clear();
        Ok(())
    }
}

/// Internal event type for the mock transport.
#[derive(Debug, Clone)]
enum LinkEvent {
    Bytes(Vec<u8>),
    Fault(String),
    Unplug,
}

/// Counters observed through [`MockTransportHandle`].
#[derive(Debug, Default)]
pub struct MockTransportStats {
    bytes_read: AtomicU64,
    resets: AtomicU64,
    closed: AtomicBool,
}

/// Handle for controlling a mock transport.
///
/// Cloned handles feed the same transport.
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    /// Channel sender for link events
    event_tx: mpsc::UnboundedSender<LinkEvent>,

    /// Transport name
    name: String,

    /// Counters shared with the transport
    stats: Arc<MockTransportStats>,
}

impl MockTransportHandle {
    /// Queue raw bytes as if the reader had sent them.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub fn send_bytes(&self, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.send(LinkEvent::Bytes(bytes.into()))
    }

    /// Queue the wire frame a reader emits for `tag`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub fn present_tag(&self, tag: &TagId) -> Result<()> {
        self.send_bytes(encode(tag))
    }

    /// Make the next transport operation fail with a communication error.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub fn inject_fault(&self, message: impl Into<String>) -> Result<()> {
        self.send(LinkEvent::Fault(message.into()))
    }

    /// Simulate the device being unplugged; every later operation fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport has been dropped.
    pub fn unplug(&self) -> Result<()> {
        self.send(LinkEvent::Unplug)
    }

    /// Total bytes handed out by `read`.
    pub fn bytes_read(&self) -> u64 {
        self.stats.bytes_read.load(Ordering::SeqCst)
    }

    /// Number of input buffer resets.
    pub fn resets(&self) -> u64 {
        self.stats.resets.load(Ordering::SeqCst)
    }

    /// Whether the transport has been closed.
    pub fn is_closed(&self) -> bool {
        self.stats.closed.load(Ordering::SeqCst)
    }

    /// Get the transport name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, event: LinkEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .map_err(|_| HardwareError::disconnected(format!("{} event channel closed", self.name)))
    }
}
