use crate::{
    Result,
    constants::{MAX_SOURCE_ID_LENGTH, MAX_TAG_ID_LENGTH, MIN_TAG_ID_LENGTH},
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated RFID tag identifier.
///
/// Always stored as upper-case hexadecimal with an even number of characters,
/// so that it decodes to whole bytes. Standard RDM6300 frames carry 10
/// characters (five bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TagId(String);

impl TagId {
    /// Create a new tag id with validation.
    ///
    /// The input is normalized to upper case before it is stored.
    ///
    /// # Errors
    /// Returns `Error::InvalidTagId` if:
    /// - The length is not between 2-64 characters or is odd
    /// - Any character is not a hexadecimal digit
    ///
    /// # Examples
    ///
    /// ```
    /// use kartscan_core::TagId;
    ///
    /// let tag = TagId::new("1a2b3c4d5e").unwrap();
    /// assert_eq!(tag.as_str(), "1A2B3C4D5E");
    ///
    /// assert!(TagId::new("XYZ").is_err());
    /// ```
    pub fn new(tag: &str) -> Result<Self> {
        let len = tag.len();
        if !(MIN_TAG_ID_LENGTH..=MAX_TAG_ID_LENGTH).contains(&len) {
            return Err(Error::InvalidTagId(format!(
                "Tag id must be {MIN_TAG_ID_LENGTH}-{MAX_TAG_ID_LENGTH} chars, got {len}"
            )));
        }

        if len % 2 != 0 {
            return Err(Error::InvalidTagId(format!(
                "Tag id must have an even number of hex digits, got {len}"
            )));
        }

        if !tag.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidTagId(format!(
                "Tag id must be hexadecimal: {tag:?}"
            )));
        }

        Ok(TagId(tag.to_ascii_uppercase()))
    }

    /// Get the tag id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the hexadecimal representation into raw bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use kartscan_core::TagId;
    ///
    /// let tag = TagId::new("AABBCCDDEE").unwrap();
    /// assert_eq!(tag.to_bytes(), vec![0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
    /// ```
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        // Validated on construction: even length, hex digits only.
        self.0
            .as_bytes()
            .chunks_exact(2)
            .map(|pair| (hex_value(pair[0]) << 4) | hex_value(pair[1]))
            .collect()
    }

    /// Number of hex characters in the tag id.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; a validated tag id is never empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TagId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TagId::new(s)
    }
}

impl TryFrom<String> for TagId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        TagId::new(&value)
    }
}

impl From<TagId> for String {
    fn from(tag: TagId) -> Self {
        tag.0
    }
}

/// Identity of a reader source (e.g. `reader1`).
///
/// 1-32 characters of ASCII letters, digits, `-` or `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SourceId(String);

impl SourceId {
    /// Create a new source id with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidSourceId` if the id is empty, longer than 32
    /// characters, or contains characters other than `[A-Za-z0-9_-]`.
    pub fn new(id: &str) -> Result<Self> {
        let id = id.trim();

        if id.is_empty() || id.len() > MAX_SOURCE_ID_LENGTH {
            return Err(Error::InvalidSourceId(format!(
                "Source id must be 1-{MAX_SOURCE_ID_LENGTH} chars, got {}",
                id.len()
            )));
        }

        if !id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(Error::InvalidSourceId(format!(
                "Source id may only contain letters, digits, '-' and '_': {id:?}"
            )));
        }

        Ok(SourceId(id.to_string()))
    }

    /// Get the source id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SourceId::new(s)
    }
}

impl TryFrom<String> for SourceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        SourceId::new(&value)
    }
}

impl From<SourceId> for String {
    fn from(id: SourceId) -> Self {
        id.0
    }
}

/// An accepted tag read, ready to be forwarded to the event sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    /// Reader that observed the tag.
    pub source: SourceId,

    /// Validated tag identifier.
    pub tag: TagId,

    /// Wall-clock time of acceptance.
    pub timestamp: DateTime<Utc>,
}

impl ScanEvent {
    /// Create a scan event stamped with the current time.
    pub fn new(source: SourceId, tag: TagId) -> Self {
        Self::with_timestamp(source, tag, Utc::now())
    }

    /// Create a scan event with an explicit timestamp.
    pub fn with_timestamp(source: SourceId, tag: TagId, timestamp: DateTime<Utc>) -> Self {
        Self {
            source,
            tag,
            timestamp,
        }
    }
}
