//! Bounds-checked reading over a received packet.

use bytes::{BufMut, BytesMut};

use crate::error::{DecodeError, EncodeError};

/// Length of a string of `len` bytes once its terminator and padding are added.
pub(crate) fn padded_string_len(len: usize) -> usize {
    (len & !3) + 4
}

/// Length of `len` bytes padded up to a multiple of four.
pub(crate) fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

/// The 32-bit length prefix for an element of `len` bytes.
pub(crate) fn length_prefix(len: usize) -> Result<u32, EncodeError> {
    u32::try_from(len).map_err(|_| EncodeError::TooLong { length: len })
}

/// Write `bytes`, a terminating zero and padding up to a four byte boundary.
pub(crate) fn put_padded_str(buf: &mut BytesMut, bytes: &[u8]) {
    buf.put_slice(bytes);
    buf.put_bytes(0, padded_string_len(bytes.len()) - bytes.len());
}

/// Everything before the first zero byte of `s`.
///
/// A zero byte would terminate the string early on the wire.
pub(crate) fn until_nul(s: &str) -> &str {
    match s.find('\0') {
        Some(end) => &s[..end],
        None => s,
    }
}

/// A read position inside a packet. Every read checks the remaining length
/// before touching the buffer.
pub(crate) struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Consume `len` bytes.
    pub(crate) fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: len,
                available: self.remaining(),
            });
        }
        let buf = self.buf;
        let out = &buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let mut raw = [0; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(raw))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let mut raw = [0; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(raw))
    }

    /// Read a null-terminated, padded string. Returns the offset where it
    /// starts and its bytes without the terminator.
    pub(crate) fn read_padded_bytes(&mut self) -> Result<(usize, &'a [u8]), DecodeError> {
        let start = self.pos;
        let buf = self.buf;
        let rest = &buf[start..];
        let len = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::MissingTerminator { offset: start })?;
        self.take(padded_string_len(len))?;
        Ok((start, &rest[..len]))
    }

    /// Like [`Cursor::read_padded_bytes`] but also requires valid UTF-8.
    pub(crate) fn read_padded_str(&mut self) -> Result<(usize, &'a str), DecodeError> {
        let (start, bytes) = self.read_padded_bytes()?;
        let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8 { offset: start })?;
        Ok((start, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding() {
        assert_eq!(padded_string_len(0), 4);
        assert_eq!(padded_string_len(3), 4);
        assert_eq!(padded_string_len(4), 8);
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 4);
        assert_eq!(padded_len(4), 4);
        assert_eq!(padded_len(5), 8);
    }

    #[test]
    fn read_string_needs_terminator_in_bounds() {
        let mut cursor = Cursor::new(b"abcd");
        assert_eq!(
            cursor.read_padded_bytes(),
            Err(DecodeError::MissingTerminator { offset: 0 })
        );
    }

    #[test]
    fn read_string_needs_padding_in_bounds() {
        let mut cursor = Cursor::new(b"abcd\0");
        assert!(matches!(
            cursor.read_padded_bytes(),
            Err(DecodeError::Truncated { needed: 8, .. })
        ));
    }

    #[test]
    fn take_past_end_fails() {
        let mut cursor = Cursor::new(&[0, 0, 0]);
        assert!(cursor.read_u32().is_err());
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn length_prefix_limits() {
        assert_eq!(length_prefix(0), Ok(0));
        assert_eq!(length_prefix(u32::MAX as usize), Ok(u32::MAX));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn length_prefix_rejects_oversized() {
        let length = u32::MAX as usize + 1;
        assert_eq!(length_prefix(length), Err(EncodeError::TooLong { length }));
    }
}
