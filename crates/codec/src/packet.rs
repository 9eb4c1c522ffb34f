//! Packet level encoding and decoding.
//!
//! A packet is whatever arrives in one datagram or one stream frame: either a
//! single message or a bundle. Decoding flattens nested bundles into a list
//! of messages in wire order.

use bytes::Bytes;

use crate::bundle::{BUNDLE_TAG, Bundle};
use crate::cursor::Cursor;
use crate::error::DecodeError;
use crate::message::Message;
use crate::time_tag::TimeTag;

/// Default limit on how deeply bundles may be nested inside one another.
pub const DEFAULT_MAX_BUNDLE_DEPTH: usize = 32;

/// Something that can be sent as an OSC packet.
pub trait Packet {
    /// The complete encoded packet.
    fn to_bytes(&self) -> Bytes;
}

impl Packet for Message {
    fn to_bytes(&self) -> Bytes {
        Message::to_bytes(self)
    }
}

impl Packet for Bundle {
    fn to_bytes(&self) -> Bytes {
        Bundle::to_bytes(self)
    }
}

impl<P: Packet + ?Sized> Packet for &P {
    fn to_bytes(&self) -> Bytes {
        (**self).to_bytes()
    }
}

/// A decoded message together with the time-tag of the bundle it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedMessage {
    /// The innermost enclosing bundle's time-tag, or
    /// [`TimeTag::IMMEDIATE`] for a bare message.
    pub time_tag: TimeTag,
    /// The decoded message.
    pub message: Message,
}

/// Whether `data` starts with the bundle marker.
pub fn is_bundle(data: &[u8]) -> bool {
    data.starts_with(BUNDLE_TAG)
}

/// Decode a packet into its messages using the default nesting limit.
pub fn decode_packet(data: &[u8]) -> Result<Vec<Message>, DecodeError> {
    PacketDecoder::default().decode(data)
}

/// Decode a packet, keeping each message's bundle time-tag.
pub fn decode_packet_timed(data: &[u8]) -> Result<Vec<TimedMessage>, DecodeError> {
    PacketDecoder::default().decode_timed(data)
}

/// Packet decoder with a configurable bundle nesting limit.
#[derive(Debug, Clone, Copy)]
pub struct PacketDecoder {
    max_depth: usize,
}

impl PacketDecoder {
    /// A decoder which rejects bundles nested more than `max_depth` deep.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// The bundle nesting limit.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Decode `data` into messages in wire order. Either the whole packet
    /// decodes or an error is returned and nothing is produced.
    pub fn decode(&self, data: &[u8]) -> Result<Vec<Message>, DecodeError> {
        let timed = self.decode_timed(data)?;
        Ok(timed.into_iter().map(|t| t.message).collect())
    }

    /// Like [`PacketDecoder::decode`], keeping each message's bundle time-tag.
    pub fn decode_timed(&self, data: &[u8]) -> Result<Vec<TimedMessage>, DecodeError> {
        let mut out = Vec::new();
        self.decode_into(data, TimeTag::IMMEDIATE, 0, &mut out)?;
        tracing::trace!(len = data.len(), messages = out.len(), "decoded packet");
        Ok(out)
    }

    fn decode_into(
        &self,
        data: &[u8],
        time_tag: TimeTag,
        depth: usize,
        out: &mut Vec<TimedMessage>,
    ) -> Result<(), DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }
        if !is_bundle(data) {
            out.push(TimedMessage {
                time_tag,
                message: Message::decode(data)?,
            });
            return Ok(());
        }
        if depth >= self.max_depth {
            return Err(DecodeError::TooDeep {
                max: self.max_depth,
            });
        }

        let mut reader = Cursor::new(data);
        reader.take(BUNDLE_TAG.len())?;
        let time_tag = TimeTag::from_raw(reader.read_u64()?);
        while !reader.is_at_end() {
            let offset = reader.position();
            let length = reader.read_u32()? as usize;
            if length == 0 || length % 4 != 0 || length > reader.remaining() {
                return Err(DecodeError::InvalidElementLength { offset, length });
            }
            let element = reader.take(length)?;
            self.decode_into(element, time_tag, depth + 1, out)?;
        }
        Ok(())
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BUNDLE_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_bundles_flatten_in_order() {
        let a = Message::new("/a").with(1);
        let b = Message::new("/b").with("two");
        let c = Message::new("/c").with(3.0f64);
        let inner = Bundle::new().with(&b).with(&c);
        let outer = Bundle::new().with(&a).with(&inner);

        let decoded = decode_packet(&outer.to_bytes()).unwrap();
        assert_eq!(decoded, vec![a, b, c]);
    }

    #[test]
    fn time_tags_follow_innermost_bundle() {
        let outer_tag = TimeTag::from_parts(100, 0);
        let inner_tag = TimeTag::from_parts(200, 0);
        let inner = Bundle::with_time_tag(inner_tag).with(&Message::new("/inner"));
        let outer = Bundle::with_time_tag(outer_tag)
            .with(&Message::new("/outer"))
            .with(&inner);

        let decoded = decode_packet_timed(&outer.to_bytes()).unwrap();
        let tags: Vec<(TimeTag, &str)> = decoded
            .iter()
            .map(|t| (t.time_tag, t.message.address()))
            .collect();
        assert_eq!(tags, vec![(outer_tag, "/outer"), (inner_tag, "/inner")]);
    }

    #[test]
    fn bare_message_is_immediate() {
        let decoded = decode_packet_timed(&Message::new("/x").to_bytes()).unwrap();
        assert_eq!(decoded[0].time_tag, TimeTag::IMMEDIATE);
    }

    #[test]
    fn empty_bundle_yields_no_messages() {
        assert!(decode_packet(&Bundle::new().to_bytes()).unwrap().is_empty());
    }

    #[test]
    fn nesting_limit() {
        let mut bundle = Bundle::new().with(&Message::new("/deep"));
        for _ in 0..4 {
            bundle = Bundle::new().with(&bundle);
        }
        let bytes = bundle.to_bytes();
        assert!(PacketDecoder::new(5).decode(&bytes).is_ok());
        assert_eq!(
            PacketDecoder::new(4).decode(&bytes),
            Err(DecodeError::TooDeep { max: 4 })
        );
    }

    #[test]
    fn element_length_must_be_aligned() {
        let mut bytes = Bundle::new().with(&Message::new("/a")).to_bytes().to_vec();
        bytes[19] = 5;
        assert!(matches!(
            decode_packet(&bytes),
            Err(DecodeError::InvalidElementLength { offset: 16, length: 5 })
        ));
    }

    #[test]
    fn element_length_past_end() {
        let mut bytes = Bundle::new().with(&Message::new("/a")).to_bytes().to_vec();
        bytes[19] = 64;
        assert!(matches!(
            decode_packet(&bytes),
            Err(DecodeError::InvalidElementLength { length: 64, .. })
        ));
    }
}
