//! Transport trait definition.
//!
//! A transport is the byte pipe between one RFID reader and the poller. It
//! only needs to answer "how many bytes are waiting", hand those bytes over
//! without blocking, and drop its input buffer on request.
//!
//! The trait uses native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;

/// Byte source attached to one reader.
///
/// # Object Safety and Dynamic Dispatch
///
/// **NOTE**: This trait is NOT object-safe because `async fn` methods return
/// `impl Future`. Use generic type parameters, or the enum wrapper in the
/// [`devices`](crate::devices) module when transports of different kinds
/// must live in one collection:
///
/// ```no_run
/// use kartscan_hardware::devices::AnyTransport;
/// use kartscan_hardware::mock::MockTransport;
/// use kartscan_hardware::traits::Transport;
///
/// # async fn example() -> kartscan_hardware::Result<()> {
/// let (transport, _handle) = MockTransport::new("reader1");
/// let mut any = AnyTransport::Mock(transport);
///
/// let pending = any.bytes_pending().await?;
/// let bytes = any.read(pending).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Examples
///
/// ```no_run
/// use kartscan_hardware::traits::Transport;
/// use kartscan_hardware::error::Result;
///
/// async fn read_available<T: Transport>(transport: &mut T) -> Result<Vec<u8>> {
///     let pending = transport.bytes_pending().await?;
///     if pending == 0 {
///         return Ok(Vec::new());
///     }
///     transport.read(pending).await
/// }
/// ```
pub trait Transport: Send {
    /// Human-readable name, usually the port path.
    fn name(&self) -> &str;

    /// Number of received bytes waiting in the input buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or the driver cannot
    /// report its queue length.
    async fn bytes_pending(&mut self) -> Result<usize>;

    /// Read up to `max` bytes that are already waiting.
    ///
    /// Returns an empty vector when nothing is available; never waits for
    /// more data to arrive.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or the read fails.
    async fn read(&mut self, max: usize) -> Result<Vec<u8>>;

    /// Discard everything in the input buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is disconnected or the driver rejects
    /// the request.
    async fn reset_input_buffer(&mut self) -> Result<()>;

    /// Release the underlying device.
    ///
    /// Further calls on a closed transport fail with
    /// [`HardwareError::Disconnected`](crate::HardwareError::Disconnected).
    /// Closing twice is not an error.
    async fn close(&mut self) -> Result<()>;
}
