//! Tokio codec for RDM6300 tag frames.
//!
//! `TagCodec` wraps a [`PacketFramer`] so that any async byte stream carrying
//! reader output (a serial port opened through an async adapter, a pipe, a
//! TCP bridge) can be turned into a stream of [`TagId`]s with
//! [`FramedRead`](tokio_util::codec::FramedRead).
//!
//! ```text
//! AsyncRead -> Decoder -> TagId (validated)
//! TagId -> Encoder -> AsyncWrite (STX/ETX framed)
//! ```
//!
//! Noise and corrupted frames are dropped by the framer exactly as in the
//! polling path; the codec never yields a decode error for malformed input.
//!
//! # Usage with Tokio FramedRead
//!
//! ```
//! use futures::StreamExt;
//! use tokio_util::codec::FramedRead;
//! use kartscan_protocol::TagCodec;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let wire: &[u8] = b"noise\x021A2B3C4D5E1E\x03\x02AABBCCDDEEEE\x03";
//! let mut tags = FramedRead::new(wire, TagCodec::new());
//!
//! assert_eq!(tags.next().await.unwrap().unwrap().as_str(), "1A2B3C4D5E");
//! assert_eq!(tags.next().await.unwrap().unwrap().as_str(), "AABBCCDDEE");
//! assert!(tags.next().await.is_none());
//! # }
//! ```

use bytes::BytesMut;
use kartscan_core::{Error, Result, TagId};
use tokio_util::codec::{Decoder, Encoder};

use crate::{FramerConfig, PacketFramer, encode};

/// Tokio codec yielding validated tag identifiers.
#[derive(Debug, Default)]
pub struct TagCodec {
    framer: PacketFramer,
}

impl TagCodec {
    /// Create a codec for standard 14-byte frames.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with custom framing parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the parameters fail validation.
    pub fn with_config(config: FramerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            framer: PacketFramer::with_config(config),
        })
    }

    /// The underlying framer, for buffer state and statistics.
    pub fn framer(&self) -> &PacketFramer {
        &self.framer
    }
}

impl Decoder for TagCodec {
    type Item = TagId;
    type Error = Error;

    /// Move bytes from `src` into the framer until a tag is found.
    ///
    /// Bytes are handed over in slices that fit the framer's buffer ceiling,
    /// so a large read never triggers an overflow discard by itself. When no
    /// tag is found `src` is left empty and any partial frame stays inside
    /// the framer.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<TagId>> {
        loop {
            if let Some(tag) = self.framer.next_tag() {
                return Ok(Some(tag));
            }
            if src.is_empty() {
                return Ok(None);
            }

            let room = self
                .framer
                .config()
                .max_buffer
                .saturating_sub(self.framer.buffered())
                .max(1);
            let chunk = src.split_to(room.min(src.len()));
            if let Some(tag) = self.framer.feed(&chunk) {
                return Ok(Some(tag));
            }
        }
    }
}

impl Encoder<TagId> for TagCodec {
    type Error = Error;

    fn encode(&mut self, item: TagId, dst: &mut BytesMut) -> Result<()> {
        dst.extend_from_slice(&encode(&item));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(s: &str) -> TagId {
        TagId::new(s).unwrap()
    }

    #[test]
    fn test_decode_complete_frame() {
        let mut codec = TagCodec::new();
        let mut buffer = BytesMut::from(&b"\x021A2B3C4D5E1E\x03"[..]);

        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(tag("1A2B3C4D5E")));
        assert!(buffer.is_empty());
        assert!(codec.decode(&mut buffer).unwrap().is_none());
    }

    #[test]
    fn test_decode_partial_frame_is_held() {
        let mut codec = TagCodec::new();
        let mut buffer = BytesMut::from(&b"\x02AABBCC"[..]);

        assert!(codec.decode(&mut buffer).unwrap().is_none());
        assert!(buffer.is_empty());
        assert_eq!(codec.framer().buffered(), 7);

        buffer.extend_from_slice(b"DDEEEE\x03");
        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(tag("AABBCCDDEE")));
    }

    #[test]
    fn test_decode_skips_corrupted_frame() {
        let mut codec = TagCodec::new();
        let mut buffer = BytesMut::from(&b"\x021A2B3C4D5E1F\x03\x02AABBCCDDEEEE\x03"[..]);

        assert_eq!(codec.decode(&mut buffer).unwrap(), Some(tag("AABBCCDDEE")));
        assert_eq!(codec.framer().stats().checksum_mismatch, 1);
    }

    #[test]
    fn test_large_read_does_not_overflow() {
        let mut codec = TagCodec::new();
        let mut buffer = BytesMut::new();
        for _ in 0..200 {
            buffer.extend_from_slice(&encode(&tag("1A2B3C4D5E")));
        }

        let mut count = 0;
        while let Some(decoded) = codec.decode(&mut buffer).unwrap() {
            assert_eq!(decoded, tag("1A2B3C4D5E"));
            count += 1;
        }

        assert_eq!(count, 200);
        assert_eq!(codec.framer().stats().overflows, 0);
    }

    #[test]
    fn test_encode_writes_wire_frame() {
        let mut codec = TagCodec::new();
        let mut buffer = BytesMut::new();

        codec.encode(tag("aabbccddee"), &mut buffer).unwrap();
        assert_eq!(&buffer[..], b"\x02AABBCCDDEEEE\x03");
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let config = FramerConfig {
            frame_size: 3,
            ..FramerConfig::default()
        };
        assert!(TagCodec::with_config(config).is_err());
    }
}
