//! Common test utilities for protocol integration tests.
//!
//! Helpers build wire frames the way a reader emits them, plus a few
//! deliberately broken variants used by the recovery tests.

#![allow(dead_code)]

use kartscan_core::TagId;
use kartscan_protocol::{PacketFramer, encode};

/// Tag used by most scenarios.
pub const TAG_A: &str = "1A2B3C4D5E";

/// Second tag, distinct checksum.
pub const TAG_B: &str = "AABBCCDDEE";

/// Build a validated tag id.
pub fn tag(s: &str) -> TagId {
    TagId::new(s).unwrap()
}

/// Valid wire frame for a tag.
pub fn frame(s: &str) -> Vec<u8> {
    encode(&tag(s))
}

/// Valid frame with its checksum replaced by a different hex value.
pub fn corrupted_frame(s: &str) -> Vec<u8> {
    let mut bytes = frame(s);
    bytes[12] = match bytes[12] {
        b'F' => b'E',
        digit if digit.is_ascii_digit() => digit ^ 1,
        letter => letter + 1,
    };
    bytes
}

/// Feed `chunks` one at a time, collecting every tag the framer yields.
pub fn collect_chunked<'a>(
    framer: &mut PacketFramer,
    chunks: impl IntoIterator<Item = &'a [u8]>,
) -> Vec<TagId> {
    let mut tags = Vec::new();
    for chunk in chunks {
        tags.extend(framer.feed(chunk));
        tags.extend(framer.drain());
    }
    tags
}
