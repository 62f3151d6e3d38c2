//! Packet framer for RDM6300 reader streams.
//!
//! This module provides a stateful framer that turns the bytes arriving from
//! one serial reader into validated tag identifiers. Bytes accumulate in a
//! per-reader buffer so that frames split across reads, garbage between
//! frames, and truncated frames are all handled without surfacing errors.
//!
//! # Recovery Rules
//!
//! Each parse step looks at the head of the buffer:
//!
//! ```text
//! no STX in buffer            -> discard everything
//! noise before STX            -> discard the noise
//! fewer than FRAME_SIZE bytes -> wait (discard if larger than the slack)
//! byte 13 is not ETX          -> drop one byte, look for the next STX
//! fields or checksum invalid  -> drop the whole frame
//! frame valid                 -> consume the frame, yield the tag
//! ```
//!
//! A start marker that is not confirmed by an end marker 13 bytes later is
//! treated as a stray `0x02` rather than a frame start, so recovery advances
//! one byte at a time and never skips over a real frame that begins inside
//! the false one.
//!
//! # Buffer Ceiling
//!
//! `feed` runs a single step, so a reader that sends faster than it is polled
//! builds a backlog. When an append pushes the buffer past `max_buffer`, the
//! whole backlog is parsed at once: decoded tags are queued and handed out by
//! later calls in stream order, junk is dropped, and at most one incomplete
//! frame stays buffered. Complete frames are never thrown away, so the tags
//! produced do not depend on how the stream was split into reads.
//!
//! # Usage
//!
//! ```
//! use kartscan_protocol::PacketFramer;
//!
//! let mut framer = PacketFramer::new();
//!
//! // Frame split across two serial reads
//! assert!(framer.feed(b"\x021A2B3C").is_none());
//! let tag = framer.feed(b"4D5E1E\x03").unwrap();
//! assert_eq!(tag.as_str(), "1A2B3C4D5E");
//! ```

use std::collections::VecDeque;

use bytes::{Buf, BytesMut};
use kartscan_core::{
    Error, Result, TagId,
    constants::{
        DEFAULT_MAX_BUFFER, DEFAULT_SLACK_THRESHOLD, END_BYTE, FRAME_OVERHEAD, FRAME_SIZE,
        MAX_TAG_ID_LENGTH, MIN_FRAME_SIZE, START_BYTE,
    },
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::packet::{Packet, PacketError};

/// Framing parameters.
///
/// The defaults describe the standard 14-byte RDM6300 frame; `frame_size` is
/// configurable for readers that carry longer identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramerConfig {
    /// Total frame size in bytes, markers included.
    pub frame_size: usize,

    /// Size above which an incomplete frame is treated as corrupted.
    pub slack_threshold: usize,

    /// Hard ceiling for the accumulation buffer.
    pub max_buffer: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            frame_size: FRAME_SIZE,
            slack_threshold: DEFAULT_SLACK_THRESHOLD,
            max_buffer: DEFAULT_MAX_BUFFER,
        }
    }
}

impl FramerConfig {
    /// Check that the parameters describe a decodable frame.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the frame is smaller than the smallest
    /// variant, if its tag field has an odd length or is longer than a tag id
    /// may be, or if the buffer ceiling cannot hold a single frame.
    ///
    /// # Example
    ///
    /// ```
    /// use kartscan_protocol::FramerConfig;
    ///
    /// assert!(FramerConfig::default().validate().is_ok());
    ///
    /// let odd = FramerConfig { frame_size: 15, ..FramerConfig::default() };
    /// assert!(odd.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < MIN_FRAME_SIZE {
            return Err(Error::Config(format!(
                "frame_size must be at least {MIN_FRAME_SIZE}, got {}",
                self.frame_size
            )));
        }
        if (self.frame_size - FRAME_OVERHEAD) % 2 != 0 {
            return Err(Error::Config(format!(
                "frame_size {} leaves an odd-length tag field",
                self.frame_size
            )));
        }
        if self.frame_size - FRAME_OVERHEAD > MAX_TAG_ID_LENGTH {
            return Err(Error::Config(format!(
                "frame_size {} leaves a tag field longer than {MAX_TAG_ID_LENGTH} characters",
                self.frame_size
            )));
        }
        if self.max_buffer < self.frame_size {
            return Err(Error::Config(format!(
                "max_buffer ({}) must hold at least one frame ({})",
                self.max_buffer, self.frame_size
            )));
        }
        Ok(())
    }
}

/// Counters describing what the framer discarded and produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FramerStats {
    /// Frames that passed validation.
    pub frames_decoded: u64,

    /// Start markers not followed by an end marker at the expected offset.
    pub misaligned: u64,

    /// Complete frames with a non-hexadecimal tag field.
    pub invalid_tag: u64,

    /// Complete frames with a non-hexadecimal checksum field.
    pub invalid_checksum: u64,

    /// Complete frames whose checksum did not match.
    pub checksum_mismatch: u64,

    /// Times the buffer crossed the ceiling or an incomplete frame outgrew
    /// the slack.
    pub overflows: u64,

    /// Total bytes discarded as noise or corrupted data.
    pub bytes_discarded: u64,
}

/// Outcome of one parse step.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    /// A validated tag was consumed from the buffer.
    Tag(TagId),

    /// Bytes were dropped; another step may find more.
    Progress,

    /// Nothing more can be done until new bytes arrive.
    NeedMore,
}

/// Stateful framer for one reader's byte stream.
///
/// `PacketFramer` owns its accumulation buffer exclusively. Malformed input
/// is never reported as an error: it is dropped and counted in
/// [`FramerStats`], and only validated tags leave the framer.
///
/// # Example
///
/// ```
/// use kartscan_protocol::PacketFramer;
///
/// let mut framer = PacketFramer::new();
///
/// // Noise, then a complete frame
/// let tag = framer.feed(b"\xFF\x10junk\x021A2B3C4D5E1E\x03");
/// assert_eq!(tag.unwrap().as_str(), "1A2B3C4D5E");
/// assert!(framer.is_empty());
/// ```
#[derive(Debug)]
pub struct PacketFramer {
    /// Bytes received but not yet consumed.
    buffer: BytesMut,

    /// Tags decoded ahead of time when the buffer crossed its ceiling.
    backlog: VecDeque<TagId>,

    /// Framing parameters.
    config: FramerConfig,

    /// Discard and decode counters.
    stats: FramerStats,
}

impl PacketFramer {
    /// Create a framer for standard 14-byte frames.
    pub fn new() -> Self {
        Self::with_config(FramerConfig::default())
    }

    /// Create a framer with custom parameters.
    ///
    /// The configuration is expected to have passed
    /// [`FramerConfig::validate`].
    pub fn with_config(config: FramerConfig) -> Self {
        Self {
            buffer: BytesMut::with_capacity(config.max_buffer),
            backlog: VecDeque::new(),
            config,
            stats: FramerStats::default(),
        }
    }

    /// Append newly received bytes and run one parse step.
    ///
    /// Returns at most one tag per call. Bytes that follow a decoded frame
    /// stay buffered for the next call, so a caller polling on a fixed
    /// cadence drains a burst one frame per cycle. Passing an empty slice
    /// advances the buffered data without appending anything.
    ///
    /// If the append takes the buffer past `max_buffer`, everything buffered
    /// is parsed immediately and the tags are queued for the following calls.
    ///
    /// # Example
    ///
    /// ```
    /// use kartscan_protocol::PacketFramer;
    ///
    /// let mut framer = PacketFramer::new();
    /// let two = b"\x021A2B3C4D5E1E\x03\x02AABBCCDDEEEE\x03";
    ///
    /// assert_eq!(framer.feed(two).unwrap().as_str(), "1A2B3C4D5E");
    /// assert_eq!(framer.feed(&[]).unwrap().as_str(), "AABBCCDDEE");
    /// assert!(framer.feed(&[]).is_none());
    /// ```
    pub fn feed(&mut self, bytes: &[u8]) -> Option<TagId> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > self.config.max_buffer {
            self.absorb_backlog();
        }

        match self.advance() {
            Step::Tag(tag) => Some(tag),
            Step::Progress | Step::NeedMore => None,
        }
    }

    /// Run parse steps over buffered bytes until a tag is found or no
    /// further progress is possible.
    pub fn next_tag(&mut self) -> Option<TagId> {
        loop {
            match self.advance() {
                Step::Tag(tag) => return Some(tag),
                Step::Progress => continue,
                Step::NeedMore => return None,
            }
        }
    }

    /// Extract every tag that the buffered bytes contain.
    ///
    /// # Example
    ///
    /// ```
    /// use kartscan_protocol::PacketFramer;
    ///
    /// let mut framer = PacketFramer::new();
    /// framer.feed(b"\x02\x021A2B3C4D5E1E\x03\x02AABBCCDDEEEE\x03");
    ///
    /// // The first call only dropped the stray 0x02
    /// let tags = framer.drain();
    /// assert_eq!(tags.len(), 2);
    /// ```
    pub fn drain(&mut self) -> Vec<TagId> {
        std::iter::from_fn(|| self.next_tag()).collect()
    }

    /// Discard all buffered bytes and queued tags.
    ///
    /// Used by the poller when a transport overflows; partial frame state is
    /// never carried over a reset.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.backlog.clear();
    }

    /// Number of bytes waiting in the accumulation buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no bytes are buffered and no tags are queued.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.backlog.is_empty()
    }

    /// Tags decoded from a backlog and not yet returned.
    pub fn queued(&self) -> usize {
        self.backlog.len()
    }

    /// Buffered bytes, for diagnostics.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Framing parameters in use.
    pub fn config(&self) -> &FramerConfig {
        &self.config
    }

    /// Discard and decode counters.
    pub fn stats(&self) -> FramerStats {
        self.stats
    }

    /// Queued tags precede every buffered byte in the stream.
    fn advance(&mut self) -> Step {
        match self.backlog.pop_front() {
            Some(tag) => Step::Tag(tag),
            None => self.step(),
        }
    }

    fn absorb_backlog(&mut self) {
        warn!(
            buffered = self.buffer.len(),
            max_buffer = self.config.max_buffer,
            "Accumulation buffer exceeded ceiling, parsing backlog"
        );
        self.stats.overflows += 1;
        loop {
            match self.step() {
                Step::Tag(tag) => self.backlog.push_back(tag),
                Step::Progress => {}
                Step::NeedMore => break,
            }
        }
    }

    fn step(&mut self) -> Step {
        if self.buffer.is_empty() {
            return Step::NeedMore;
        }

        let Some(stx_pos) = self.buffer.iter().position(|&b| b == START_BYTE) else {
            trace!(bytes = self.buffer.len(), "No start marker, discarding buffer");
            self.discard_buffer();
            return Step::NeedMore;
        };
        self.discard_front(stx_pos);

        let frame_size = self.config.frame_size;
        if self.buffer.len() < frame_size {
            if self.buffer.len() > self.config.slack_threshold {
                debug!(
                    buffered = self.buffer.len(),
                    slack = self.config.slack_threshold,
                    "Incomplete frame exceeded slack threshold, discarding"
                );
                self.stats.overflows += 1;
                self.discard_buffer();
            }
            return Step::NeedMore;
        }

        if self.buffer[frame_size - 1] != END_BYTE {
            trace!("Start marker without end marker, skipping one byte");
            self.stats.misaligned += 1;
            self.discard_front(1);
            return Step::Progress;
        }

        let frame = self.buffer.split_to(frame_size);
        let result = Packet::new(&frame).and_then(|packet| packet.validate());
        match result {
            Ok(tag) => {
                self.stats.frames_decoded += 1;
                Step::Tag(tag)
            }
            Err(error) => {
                trace!(%error, "Rejected frame");
                self.record_rejection(error);
                self.stats.bytes_discarded += frame_size as u64;
                Step::Progress
            }
        }
    }

    fn record_rejection(&mut self, error: PacketError) {
        match error {
            PacketError::InvalidTag => self.stats.invalid_tag += 1,
            PacketError::InvalidChecksum => self.stats.invalid_checksum += 1,
            PacketError::ChecksumMismatch { .. } => self.stats.checksum_mismatch += 1,
            // Markers and length were checked before the split.
            PacketError::InvalidLength(_) | PacketError::MissingStart | PacketError::MissingEnd => {
                self.stats.misaligned += 1
            }
        }
    }

    fn discard_front(&mut self, count: usize) {
        if count > 0 {
            self.buffer.advance(count);
            self.stats.bytes_discarded += count as u64;
        }
    }

    fn discard_buffer(&mut self) {
        self.stats.bytes_discarded += self.buffer.len() as u64;
        self.buffer.clear();
    }
}

impl Default for PacketFramer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::encode;

    fn tag(s: &str) -> TagId {
        TagId::new(s).unwrap()
    }

    /// Test helper: valid wire frame for a tag.
    fn frame(s: &str) -> Vec<u8> {
        encode(&tag(s))
    }

    #[test]
    fn test_new_framer() {
        let framer = PacketFramer::new();
        assert!(framer.is_empty());
        assert_eq!(framer.config().frame_size, 14);
        assert_eq!(framer.stats(), FramerStats::default());
    }

    #[test]
    fn test_complete_frame_single_feed() {
        let mut framer = PacketFramer::new();
        assert_eq!(framer.feed(&frame("1A2B3C4D5E")), Some(tag("1A2B3C4D5E")));
        assert!(framer.is_empty());
        assert_eq!(framer.stats().frames_decoded, 1);
    }

    #[test]
    fn test_empty_feed_on_empty_buffer() {
        let mut framer = PacketFramer::new();
        assert!(framer.feed(&[]).is_none());
        assert!(framer.is_empty());
    }

    #[test]
    fn test_lowercase_tag_is_uppercased() {
        let mut framer = PacketFramer::new();
        let result = framer.feed(b"\x02aabbccddeeee\x03");
        assert_eq!(result.unwrap().as_str(), "AABBCCDDEE");
    }

    #[test]
    fn test_noise_before_frame() {
        let mut framer = PacketFramer::new();
        let mut data = vec![0x11, 0x22, 0x33, 0x44, 0x55];
        data.extend_from_slice(&frame("1A2B3C4D5E"));

        assert_eq!(framer.feed(&data), Some(tag("1A2B3C4D5E")));
        assert!(framer.drain().is_empty());
        assert_eq!(framer.stats().bytes_discarded, 5);
    }

    #[test]
    fn test_pure_garbage_is_discarded() {
        let mut framer = PacketFramer::new();
        assert!(framer.feed(b"no start marker here").is_none());
        assert!(framer.is_empty());
    }

    #[test]
    fn test_partial_frame_is_retained() {
        let mut framer = PacketFramer::new();
        let data = frame("1A2B3C4D5E");

        assert!(framer.feed(&data[..9]).is_none());
        assert_eq!(framer.buffered(), 9);

        assert_eq!(framer.feed(&data[9..]), Some(tag("1A2B3C4D5E")));
    }

    #[test]
    fn test_byte_by_byte_feeding() {
        let mut framer = PacketFramer::new();
        let data = frame("AABBCCDDEE");

        let mut tags = Vec::new();
        for byte in &data {
            tags.extend(framer.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(tags, vec![tag("AABBCCDDEE")]);
    }

    #[test]
    fn test_false_start_drops_single_byte() {
        let mut framer = PacketFramer::new();
        let mut data = vec![START_BYTE];
        data.extend_from_slice(&frame("1A2B3C4D5E"));

        // Stray STX: byte 13 is the checksum's last char, not ETX
        assert!(framer.feed(&data).is_none());
        assert_eq!(framer.buffered(), 14);
        assert_eq!(framer.stats().misaligned, 1);

        assert_eq!(framer.feed(&[]), Some(tag("1A2B3C4D5E")));
    }

    #[test]
    fn test_trailing_bytes_stay_buffered() {
        let mut framer = PacketFramer::new();
        let mut data = frame("1A2B3C4D5E");
        data.extend_from_slice(&[START_BYTE, b'A', b'A']);

        assert_eq!(framer.feed(&data), Some(tag("1A2B3C4D5E")));
        assert_eq!(framer.buffer(), &[START_BYTE, b'A', b'A']);
    }

    #[test]
    fn test_checksum_mismatch_drops_frame() {
        let mut framer = PacketFramer::new();
        let mut bad = frame("1A2B3C4D5E");
        bad[12] = b'F';

        assert!(framer.feed(&bad).is_none());
        assert!(framer.is_empty());
        assert_eq!(framer.stats().checksum_mismatch, 1);
        assert_eq!(framer.stats().bytes_discarded, 14);
    }

    #[test]
    fn test_non_hex_tag_drops_frame() {
        let mut framer = PacketFramer::new();
        assert!(framer.feed(b"\x021A2B3C4D5X1E\x03").is_none());
        assert!(framer.is_empty());
        assert_eq!(framer.stats().invalid_tag, 1);
    }

    #[test]
    fn test_non_ascii_tag_drops_frame() {
        let mut framer = PacketFramer::new();
        assert!(framer.feed(b"\x021A2B\xC3\xA94D5E1E\x03").is_none());
        assert!(framer.is_empty());
        assert_eq!(framer.stats().invalid_tag, 1);
    }

    #[test]
    fn test_non_hex_checksum_drops_frame() {
        let mut framer = PacketFramer::new();
        assert!(framer.feed(b"\x021A2B3C4D5E1Z\x03").is_none());
        assert!(framer.is_empty());
        assert_eq!(framer.stats().invalid_checksum, 1);
    }

    #[test]
    fn test_multiple_frames_one_per_feed() {
        let mut framer = PacketFramer::new();
        let mut data = frame("1111111111");
        data.extend_from_slice(&frame("2222222222"));
        data.extend_from_slice(&frame("3333333333"));

        assert_eq!(framer.feed(&data), Some(tag("1111111111")));
        assert_eq!(framer.feed(&[]), Some(tag("2222222222")));
        assert_eq!(framer.feed(&[]), Some(tag("3333333333")));
        assert_eq!(framer.feed(&[]), None);
    }

    #[test]
    fn test_drain_collects_everything() {
        let mut framer = PacketFramer::new();
        let mut data = b"xx".to_vec();
        data.extend_from_slice(&frame("1111111111"));
        data.push(START_BYTE);
        data.extend_from_slice(&frame("2222222222"));
        data.extend_from_slice(b"\x02partial");

        framer.feed(&data);
        let mut tags = vec![tag("1111111111")];
        tags.extend(framer.drain());

        assert_eq!(tags, vec![tag("1111111111"), tag("2222222222")]);
        assert_eq!(framer.buffer(), b"\x02partial");
    }

    #[test]
    fn test_buffer_ceiling_drops_junk_but_keeps_partial_frame() {
        let config = FramerConfig {
            max_buffer: 32,
            ..FramerConfig::default()
        };
        let mut framer = PacketFramer::with_config(config);

        assert!(framer.feed(&[START_BYTE; 20]).is_none());
        assert!(framer.feed(&[START_BYTE; 20]).is_none());
        assert_eq!(framer.stats().overflows, 1);
        assert_eq!(framer.queued(), 0);
        // Only a run shorter than one frame can still start a frame
        assert_eq!(framer.buffered(), 13);

        framer.feed(&frame("1A2B3C4D5E"));
        assert_eq!(framer.drain(), vec![tag("1A2B3C4D5E")]);
    }

    #[test]
    fn test_buffer_ceiling_keeps_complete_frames() {
        let tags: Vec<TagId> = (0..80u32).map(|i| tag(&format!("{i:010X}"))).collect();
        let stream: Vec<u8> = tags.iter().flat_map(encode).collect();
        assert!(stream.len() > DEFAULT_MAX_BUFFER);

        let mut framer = PacketFramer::new();
        assert_eq!(framer.feed(&stream).as_ref(), Some(&tags[0]));
        assert_eq!(framer.buffered(), 0);
        assert_eq!(framer.queued(), 79);

        // Queued tags come out one per call, in stream order
        assert_eq!(framer.feed(&[]).as_ref(), Some(&tags[1]));
        assert_eq!(framer.drain(), tags[2..].to_vec());
        assert!(framer.is_empty());
        assert_eq!(framer.stats().frames_decoded, 80);
        assert_eq!(framer.stats().overflows, 1);
        assert_eq!(framer.stats().bytes_discarded, 0);
    }

    #[test]
    fn test_clear_drops_queued_tags() {
        let stream: Vec<u8> = (0..80u32)
            .flat_map(|i| frame(&format!("{i:010X}")))
            .collect();
        let mut framer = PacketFramer::new();
        framer.feed(&stream);
        assert!(framer.queued() > 0);

        framer.clear();
        assert!(framer.is_empty());
        assert!(framer.feed(&[]).is_none());
    }

    #[test]
    fn test_slack_threshold_discards_incomplete_frame() {
        // 64-byte variant: an incomplete frame can exceed the 50-byte slack
        let config = FramerConfig {
            frame_size: 64,
            ..FramerConfig::default()
        };
        config.validate().unwrap();
        let mut framer = PacketFramer::with_config(config);

        let mut partial = vec![START_BYTE];
        partial.extend_from_slice(&[b'A'; 40]);
        assert!(framer.feed(&partial).is_none());
        assert_eq!(framer.buffered(), 41);

        assert!(framer.feed(&[b'B'; 15]).is_none());
        assert!(framer.is_empty());
        assert_eq!(framer.stats().overflows, 1);
    }

    #[test]
    fn test_longer_variant_decodes() {
        let config = FramerConfig {
            frame_size: 20,
            ..FramerConfig::default()
        };
        let mut framer = PacketFramer::with_config(config);

        let long = tag("0102030405060708");
        assert_eq!(framer.feed(&encode(&long)), Some(long));
    }

    #[test]
    fn test_clear_discards_partial_frame() {
        let mut framer = PacketFramer::new();
        framer.feed(b"\x021A2B3C");
        framer.clear();
        assert!(framer.is_empty());

        // Remainder alone is noise
        assert!(framer.feed(b"4D5E1E\x03").is_none());
        assert!(framer.is_empty());
    }

    #[test]
    fn test_config_validation() {
        assert!(FramerConfig::default().validate().is_ok());

        let too_small = FramerConfig {
            frame_size: 5,
            ..FramerConfig::default()
        };
        assert!(too_small.validate().is_err());

        let tiny_buffer = FramerConfig {
            max_buffer: 10,
            ..FramerConfig::default()
        };
        assert!(tiny_buffer.validate().is_err());
    }

    #[test]
    fn test_config_rejects_tag_field_longer_than_tag_id() {
        let longest = FramerConfig {
            frame_size: MAX_TAG_ID_LENGTH + FRAME_OVERHEAD,
            ..FramerConfig::default()
        };
        assert!(longest.validate().is_ok());

        let too_long = FramerConfig {
            frame_size: MAX_TAG_ID_LENGTH + FRAME_OVERHEAD + 2,
            ..FramerConfig::default()
        };
        assert!(matches!(too_long.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_longest_variant_decodes() {
        let config = FramerConfig {
            frame_size: MAX_TAG_ID_LENGTH + FRAME_OVERHEAD,
            ..FramerConfig::default()
        };
        config.validate().unwrap();
        let mut framer = PacketFramer::with_config(config);

        let longest = tag(&"A1".repeat(MAX_TAG_ID_LENGTH / 2));
        assert_eq!(framer.feed(&encode(&longest)), Some(longest));
    }
}
