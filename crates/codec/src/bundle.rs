//! OSC bundles.

use std::sync::OnceLock;

use bytes::{BufMut, Bytes, BytesMut};

use crate::cursor;
use crate::error::EncodeError;
use crate::packet::Packet;
use crate::time_tag::TimeTag;

/// The eight byte marker every bundle starts with.
pub const BUNDLE_TAG: &[u8; 8] = b"#bundle\0";

/// Length of the marker plus the time-tag.
const HEADER_LEN: usize = 16;

/// An OSC bundle: a time-tag followed by any number of length-prefixed
/// messages or bundles.
///
/// Elements are copied into the bundle when appended, so later changes to a
/// message do not affect bundles it was already added to. Like
/// [`Message::to_bytes`](crate::Message::to_bytes), [`Bundle::to_bytes`]
/// hands out a shared buffer which is rebuilt only after a change.
///
/// ```
/// use codec::{Bundle, Message, TimeTag};
///
/// let mut bundle = Bundle::new();
/// bundle.append(&Message::new("/a").with(1));
/// bundle.append(&Bundle::new().with(&Message::new("/b")));
/// assert_eq!(bundle.time_tag(), TimeTag::IMMEDIATE);
/// assert_eq!(bundle.to_bytes().len() % 4, 0);
/// ```
#[derive(Debug, Clone)]
pub struct Bundle {
    buffer: BytesMut,
    /// The frozen encoding of `buffer`. Empty means it is stale.
    cache: OnceLock<Bytes>,
}

impl Bundle {
    /// An empty bundle to be executed immediately.
    pub fn new() -> Self {
        Self::with_time_tag(TimeTag::IMMEDIATE)
    }

    /// An empty bundle scheduled for `time_tag`.
    pub fn with_time_tag(time_tag: TimeTag) -> Self {
        let mut buffer = BytesMut::with_capacity(64);
        buffer.put_slice(BUNDLE_TAG);
        buffer.put_u64(time_tag.raw());
        Self {
            buffer,
            cache: OnceLock::new(),
        }
    }

    /// Builder form of [`Bundle::append`].
    pub fn with(mut self, element: &impl Packet) -> Self {
        self.append(element);
        self
    }

    /// Copy an encoded message or bundle into this bundle.
    ///
    /// # Panics
    ///
    /// If the element is 4 GiB or larger. [`Bundle::try_append`] reports
    /// that as an error instead.
    pub fn append(&mut self, element: &impl Packet) -> &mut Self {
        if let Err(e) = self.try_append(element) {
            panic!("cannot append to bundle: {e}");
        }
        self
    }

    /// Copy an encoded message or bundle into this bundle, failing if it is
    /// too long for its length prefix.
    pub fn try_append(&mut self, element: &impl Packet) -> Result<&mut Self, EncodeError> {
        let bytes = element.to_bytes();
        debug_assert_eq!(bytes.len() % 4, 0, "OSC elements are four byte aligned");
        let length = cursor::length_prefix(bytes.len())?;
        self.buffer.reserve(4 + bytes.len());
        self.buffer.put_u32(length);
        self.buffer.put_slice(&bytes);
        self.cache = OnceLock::new();
        Ok(self)
    }

    /// Overwrite the time-tag in place.
    pub fn set_time_tag(&mut self, time_tag: TimeTag) {
        self.buffer[8..HEADER_LEN].copy_from_slice(&time_tag.raw().to_be_bytes());
        self.cache = OnceLock::new();
    }

    /// When the bundle's contents are due.
    pub fn time_tag(&self) -> TimeTag {
        let mut raw = [0; 8];
        raw.copy_from_slice(&self.buffer[8..HEADER_LEN]);
        TimeTag::from_raw(u64::from_be_bytes(raw))
    }

    /// Size of the encoded bundle in bytes.
    pub fn encoded_len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the bundle has no elements.
    pub fn is_empty(&self) -> bool {
        self.buffer.len() == HEADER_LEN
    }

    /// Remove all elements and reset the time-tag to immediate. The bundle
    /// can be appended to straight away.
    pub fn clear(&mut self) {
        self.buffer.truncate(HEADER_LEN);
        self.set_time_tag(TimeTag::IMMEDIATE);
    }

    /// The encoded bundle.
    ///
    /// Repeated calls without a change in between return the same buffer.
    pub fn to_bytes(&self) -> Bytes {
        self.cache
            .get_or_init(|| Bytes::copy_from_slice(&self.buffer))
            .clone()
    }
}

/// Bundles compare by their encoded bytes.
impl PartialEq for Bundle {
    fn eq(&self, other: &Self) -> bool {
        self.buffer == other.buffer
    }
}

impl Eq for Bundle {}

impl Default for Bundle {
    fn default() -> Self {
        Self::new()
    }
}
