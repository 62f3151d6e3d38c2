//! Core constants for the RDM6300 reader protocol and the scan pipeline.
//!
//! This module defines the protocol-level constants and the default tuning
//! values used throughout kartscan. Keeping them in one place lets the framer,
//! the poller and the configuration loader agree on the same numbers.
//!
//! # Protocol Structure
//!
//! An RDM6300-class reader emits one fixed-size frame per tag read:
//!
//! ```text
//! <STX> T T T T T T T T T T C C <ETX>
//!  0x02 \____ tag (hex) ___/ \ck/  0x03
//! ```
//!
//! Where:
//! - `<STX>` - Start of text marker (0x02)
//! - `T` - Ten ASCII hexadecimal characters encoding five tag bytes
//! - `C` - Two ASCII hexadecimal characters, XOR of the five tag bytes
//! - `<ETX>` - End of text marker (0x03)
//!
//! # Usage
//!
//! ```
//! use kartscan_core::constants::*;
//!
//! assert_eq!(FRAME_SIZE, 1 + TAG_ID_LENGTH + CHECKSUM_LENGTH + 1);
//!
//! use std::time::Duration;
//! let cooldown = Duration::from_secs(DEFAULT_COOLDOWN_SECS);
//! assert_eq!(cooldown.as_secs(), 3);
//! ```

// ============================================================================
// Message Framing
// ============================================================================

/// Start of text marker that opens every frame.
///
/// # Examples
///
/// ```
/// use kartscan_core::constants::START_BYTE;
///
/// let frame = b"\x021A2B3C4D5E1E\x03";
/// assert_eq!(frame[0], START_BYTE);
/// ```
pub const START_BYTE: u8 = 0x02; // STX

/// End of text marker that closes every frame.
///
/// # Examples
///
/// ```
/// use kartscan_core::constants::{END_BYTE, FRAME_SIZE};
///
/// let frame = b"\x021A2B3C4D5E1E\x03";
/// assert_eq!(frame[FRAME_SIZE - 1], END_BYTE);
/// ```
pub const END_BYTE: u8 = 0x03; // ETX

/// Number of ASCII characters in the tag field of a standard frame.
pub const TAG_ID_LENGTH: usize = 10;

/// Number of ASCII characters in the checksum field.
pub const CHECKSUM_LENGTH: usize = 2;

/// Bytes in a frame that are not part of the tag field.
///
/// Start marker, two checksum characters and the end marker.
pub const FRAME_OVERHEAD: usize = 1 + CHECKSUM_LENGTH + 1;

/// Total size of a standard RDM6300 frame in bytes.
pub const FRAME_SIZE: usize = TAG_ID_LENGTH + FRAME_OVERHEAD;

/// Smallest frame size accepted by protocol variants (two tag characters).
pub const MIN_FRAME_SIZE: usize = FRAME_OVERHEAD + MIN_TAG_ID_LENGTH;

// ============================================================================
// Identifier Constraints
// ============================================================================

/// Minimum length of a tag identifier in hex characters.
pub const MIN_TAG_ID_LENGTH: usize = 2;

/// Maximum length of a tag identifier in hex characters.
///
/// Generous enough for 125 kHz variants that carry longer identifiers.
pub const MAX_TAG_ID_LENGTH: usize = 64;

/// Maximum length of a reader source identifier.
pub const MAX_SOURCE_ID_LENGTH: usize = 32;

// ============================================================================
// Framer Buffering
// ============================================================================

/// Bytes an incomplete frame may occupy before it is treated as corrupted.
pub const DEFAULT_SLACK_THRESHOLD: usize = 50;

/// Hard ceiling for a source's accumulation buffer.
///
/// When appending new bytes pushes the buffer past this size the whole
/// buffer is discarded.
pub const DEFAULT_MAX_BUFFER: usize = 1024; // 1 KB

// ============================================================================
// Polling Defaults
// ============================================================================

/// Pause between two polling cycles, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 40;

/// Pause between polling two adjacent readers inside one cycle, in milliseconds.
///
/// Physically adjacent 125 kHz readers interfere with each other; the small
/// stagger keeps their reads apart.
pub const DEFAULT_STAGGER_DELAY_MS: u64 = 10;

/// Pending OS-level bytes on a transport above which its buffers are reset.
pub const DEFAULT_OVERFLOW_THRESHOLD: usize = 100;

/// Number of polling cycles between two cooldown cache cleanups.
pub const DEFAULT_CLEANUP_CYCLES: u64 = 100;

/// Number of polling cycles between two reader status log lines.
pub const DEFAULT_STATUS_LOG_CYCLES: u64 = 200;

// ============================================================================
// Cooldown
// ============================================================================

/// Window during which a repeated read of the same tag is suppressed, in seconds.
///
/// RDM6300 readers repeat a tag's frame continuously while it stays in the
/// field, which easily amounts to dozens of frames per second.
pub const DEFAULT_COOLDOWN_SECS: u64 = 3;

// ============================================================================
// Serial Link
// ============================================================================

/// Baud rate of RDM6300 readers.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Read timeout applied to serial ports, in milliseconds.
pub const DEFAULT_SERIAL_TIMEOUT_MS: u64 = 100;
