//! Length-prefixed framing for stream transports.
//!
//! A datagram carries exactly one packet, but a byte stream has no packet
//! boundaries. Each packet on a stream is therefore preceded by its length:
//!
//! ```text
//! u32 length (big-endian) | packet bytes
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::TransportError;

/// Default maximum frame size (16 MB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

const LENGTH_PREFIX: usize = 4;

/// Codec splitting a byte stream into length-prefixed packets.
///
/// The decoder keeps partial frames buffered until the rest arrives and may
/// yield several frames from a single read.
///
/// ```
/// use bytes::BytesMut;
/// use tokio_util::codec::Decoder;
/// use transport::FrameCodec;
///
/// let mut codec = FrameCodec::new();
/// let mut buf = BytesMut::from(&[0, 0, 0, 4, b'/', b'a', 0, 0][..]);
/// let frame = codec.decode(&mut buf).unwrap().unwrap();
/// assert_eq!(&frame[..], b"/a\0\0");
/// ```
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// A codec with the [`DEFAULT_MAX_FRAME_SIZE`] limit.
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Frames larger than `max_frame_size` are rejected with
    /// [`TransportError::FrameTooLarge`] in both directions.
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// A codec whose limit comes from `settings`.
    pub fn from_settings(settings: &config::TcpSettings) -> Self {
        Self::with_max_size(settings.max_frame_size)
    }

    /// The largest frame body accepted or produced.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let mut prefix = [0; LENGTH_PREFIX];
        prefix.copy_from_slice(&src[..LENGTH_PREFIX]);
        let length = u32::from_be_bytes(prefix) as usize;

        if length > self.max_frame_size {
            return Err(TransportError::FrameTooLarge {
                size: length,
                max: self.max_frame_size,
            });
        }

        let total_length = LENGTH_PREFIX + length;
        if src.len() < total_length {
            src.reserve(total_length - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX);
        let frame = src.split_to(length).freeze();
        tracing::trace!(len = length, "decoded frame");
        Ok(Some(frame))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let size = item.len();
        let length = match u32::try_from(size) {
            Ok(length) if size <= self.max_frame_size => length,
            _ => {
                return Err(TransportError::FrameTooLarge {
                    size,
                    max: self.max_frame_size.min(u32::MAX as usize),
                });
            }
        };

        dst.reserve(LENGTH_PREFIX + size);
        dst.put_u32(length);
        dst.put_slice(&item);
        Ok(())
    }
}
