//! Wire frame of RDM6300-class readers.
//!
//! # Wire Format
//!
//! | Offset | Length | Meaning        | Encoding                              |
//! |--------|--------|----------------|---------------------------------------|
//! | 0      | 1      | Start marker   | `0x02`                                |
//! | 1-10   | 10     | Tag identifier | ASCII hex, case-insensitive on input  |
//! | 11-12  | 2      | Checksum       | ASCII hex, XOR of the five tag bytes  |
//! | 13     | 1      | End marker     | `0x03`                                |
//!
//! Protocol variants with longer tag fields keep the same layout: the tag
//! field spans everything between the start marker and the two checksum
//! characters.
//!
//! # Example
//!
//! ```
//! use kartscan_core::TagId;
//! use kartscan_protocol::{Packet, encode};
//!
//! let tag = TagId::new("1A2B3C4D5E").unwrap();
//! let bytes = encode(&tag);
//! assert_eq!(&bytes[..], b"\x021A2B3C4D5E1E\x03");
//!
//! let packet = Packet::new(&bytes).unwrap();
//! assert_eq!(packet.validate().unwrap(), tag);
//! ```

use kartscan_core::{
    TagId,
    constants::{CHECKSUM_LENGTH, END_BYTE, FRAME_OVERHEAD, MIN_FRAME_SIZE, START_BYTE},
};

/// Reasons a frame is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// Frame is too short or its tag field has an odd length.
    #[error("Invalid frame length: {0} bytes")]
    InvalidLength(usize),

    /// First byte is not the start marker.
    #[error("Frame does not begin with STX")]
    MissingStart,

    /// Last byte is not the end marker.
    #[error("Frame does not end with ETX")]
    MissingEnd,

    /// Tag field contains non-ASCII or non-hexadecimal bytes.
    #[error("Tag field is not ASCII hexadecimal")]
    InvalidTag,

    /// Checksum field contains non-ASCII or non-hexadecimal bytes.
    #[error("Checksum field is not ASCII hexadecimal")]
    InvalidChecksum,

    /// Checksum field does not match the XOR of the tag bytes.
    #[error("Checksum mismatch: expected {expected:02X}, got {actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },
}

/// A structurally complete frame borrowed from a reader's buffer.
///
/// Construction only checks the markers and the length; field contents are
/// checked by [`Packet::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    bytes: &'a [u8],
}

impl<'a> Packet<'a> {
    /// Wrap a complete frame, including both markers.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is shorter than the smallest variant,
    /// its tag field has an odd length, or either marker is missing.
    pub fn new(bytes: &'a [u8]) -> Result<Self, PacketError> {
        let len = bytes.len();
        if len < MIN_FRAME_SIZE || (len - FRAME_OVERHEAD) % 2 != 0 {
            return Err(PacketError::InvalidLength(len));
        }
        if bytes[0] != START_BYTE {
            return Err(PacketError::MissingStart);
        }
        if bytes[len - 1] != END_BYTE {
            return Err(PacketError::MissingEnd);
        }
        Ok(Self { bytes })
    }

    /// Check a complete frame and extract its tag id in one call.
    ///
    /// # Example
    ///
    /// ```
    /// use kartscan_protocol::{Packet, PacketError};
    ///
    /// let tag = Packet::decode(b"\x02AABBCCDDEEEE\x03").unwrap();
    /// assert_eq!(tag.as_str(), "AABBCCDDEE");
    ///
    /// let flipped = Packet::decode(b"\x02AABBCCDDEEEF\x03");
    /// assert!(matches!(flipped, Err(PacketError::ChecksumMismatch { .. })));
    /// ```
    pub fn decode(bytes: &'a [u8]) -> Result<TagId, PacketError> {
        Self::new(bytes)?.validate()
    }

    /// Raw tag field (between the start marker and the checksum).
    pub fn tag_field(&self) -> &'a [u8] {
        &self.bytes[1..self.checksum_offset()]
    }

    /// Raw two-character checksum field.
    pub fn checksum_field(&self) -> &'a [u8] {
        let start = self.checksum_offset();
        &self.bytes[start..start + CHECKSUM_LENGTH]
    }

    /// Whole frame, markers included.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Validate both fields and the checksum, yielding the tag id.
    ///
    /// # Errors
    ///
    /// Returns the first failed check in wire order: tag field, checksum
    /// field, checksum value.
    pub fn validate(&self) -> Result<TagId, PacketError> {
        let tag_field = self.tag_field();
        if !tag_field.iter().all(u8::is_ascii_hexdigit) {
            return Err(PacketError::InvalidTag);
        }

        let checksum_field = self.checksum_field();
        if !checksum_field.iter().all(u8::is_ascii_hexdigit) {
            return Err(PacketError::InvalidChecksum);
        }

        let tag = std::str::from_utf8(tag_field)
            .ok()
            .and_then(|s| TagId::new(s).ok())
            .ok_or(PacketError::InvalidTag)?;

        let actual = std::str::from_utf8(checksum_field)
            .ok()
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .ok_or(PacketError::InvalidChecksum)?;

        let expected = xor_checksum(&tag.to_bytes());
        if expected != actual {
            return Err(PacketError::ChecksumMismatch { expected, actual });
        }

        Ok(tag)
    }

    fn checksum_offset(&self) -> usize {
        self.bytes.len() - 1 - CHECKSUM_LENGTH
    }
}

/// XOR of all bytes, the reader's checksum rule.
///
/// # Example
///
/// ```
/// use kartscan_protocol::xor_checksum;
///
/// assert_eq!(xor_checksum(&[0xAA, 0xBB, 0xCC, 0xDD, 0xEE]), 0xEE);
/// ```
pub fn xor_checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

/// Build the wire frame a reader would emit for `tag`.
pub fn encode(tag: &TagId) -> Vec<u8> {
    let checksum = xor_checksum(&tag.to_bytes());
    let mut frame = Vec::with_capacity(tag.len() + FRAME_OVERHEAD);
    frame.push(START_BYTE);
    frame.extend_from_slice(tag.as_str().as_bytes());
    frame.extend_from_slice(format!("{checksum:02X}").as_bytes());
    frame.push(END_BYTE);
    frame
}
