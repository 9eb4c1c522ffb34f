//! OSC messages.
//!
//! A message is an address plus an ordered list of typed arguments. Argument
//! payloads are stored in wire form in one buffer; the complete packet is
//! assembled lazily and cached until the next mutation.

use std::fmt;
use std::sync::OnceLock;

use bytes::{BufMut, Bytes, BytesMut};

use crate::argument::{ArgRef, Argument};
use crate::cursor::{self, Cursor};
use crate::error::{ArgumentError, DecodeError, EncodeError};
use crate::time_tag::TimeTag;
use crate::types::{ArgType, Midi, Value};

/// An OSC message.
///
/// Build one with [`Message::new`] and [`Message::append`] (or the
/// [`Message::with`] builder), then call [`Message::to_bytes`] to obtain the
/// encoded packet.
///
/// ```
/// use codec::Message;
///
/// let msg = Message::new("/mixer/fader").with(3).with(0.75f32);
/// assert_eq!(msg.type_tags(), ",if");
/// assert_eq!(msg.to_bytes().len() % 4, 0);
/// ```
///
/// The address must start with `/`, or the encoded message will not decode;
/// debug builds check this. After [`Message::clear`] give the message a new
/// address before encoding it. Strings (including the address) end at their
/// first zero byte.
#[derive(Debug, Clone, Default)]
pub struct Message {
    address: String,
    data: BytesMut,
    args: Vec<Argument>,
    /// The encoded packet. Empty means the cache is dirty.
    cache: OnceLock<Bytes>,
}

impl Message {
    /// An empty message for `address`.
    pub fn new(address: impl Into<String>) -> Self {
        let address = address.into();
        check_address(&address);
        Self {
            address,
            ..Self::default()
        }
    }

    /// Builder form of [`Message::append`].
    pub fn with<'v>(mut self, value: impl Into<Value<'v>>) -> Self {
        self.append(value);
        self
    }

    /// The address the message is sent to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Replace the address, keeping the arguments.
    pub fn set_address(&mut self, address: impl Into<String>) {
        let address = address.into();
        check_address(&address);
        self.address = address;
        self.invalidate();
    }

    /// Append an argument. Its type follows from the value:
    /// `i32`, `f32`, `f64`, `i64`, `&str`, `&[u8]` (blob), [`Midi`],
    /// [`TimeTag`], `bool`, `char`, or an explicit [`Value`].
    ///
    /// # Panics
    ///
    /// If a blob is 4 GiB or larger. Use [`Message::try_append_blob`] for
    /// blobs of untrusted size.
    pub fn append<'v>(&mut self, value: impl Into<Value<'v>>) -> &mut Self {
        let value = value.into();
        let mut offset = self.data.len();
        let size = match value {
            Value::Int32(v) => {
                self.data.put_i32(v);
                4
            }
            Value::Float32(v) => {
                self.data.put_f32(v);
                4
            }
            Value::Float64(v) => {
                self.data.put_f64(v);
                8
            }
            Value::Int64(v) => {
                self.data.put_i64(v);
                8
            }
            Value::String(s) => {
                let s = cursor::until_nul(s);
                cursor::put_padded_str(&mut self.data, s.as_bytes());
                s.len()
            }
            Value::Blob(b) => {
                let length = cursor::length_prefix(b.len())
                    .unwrap_or_else(|e| panic!("cannot append blob: {e}"));
                self.data.put_u32(length);
                offset += 4;
                self.data.put_slice(b);
                self.data.put_bytes(0, cursor::padded_len(b.len()) - b.len());
                b.len()
            }
            Value::Midi(m) => {
                self.data.put_slice(&m.to_bytes());
                4
            }
            Value::TimeTag(t) => {
                self.data.put_u64(t.raw());
                8
            }
            Value::Char(c) => {
                self.data.put_u32(u32::from(c));
                4
            }
            Value::Bool(_) | Value::Null | Value::Impulse => 0,
        };
        self.args.push(Argument {
            ty: value.arg_type(),
            offset,
            size,
        });
        self.invalidate();
        self
    }

    /// Append a blob. Panics under the same condition as [`Message::append`].
    pub fn append_blob(&mut self, blob: &[u8]) -> &mut Self {
        self.append(Value::Blob(blob))
    }

    /// Append a blob, failing if it is too long for its length prefix.
    pub fn try_append_blob(&mut self, blob: &[u8]) -> Result<&mut Self, EncodeError> {
        cursor::length_prefix(blob.len())?;
        Ok(self.append(Value::Blob(blob)))
    }

    /// Append a MIDI message from its four bytes.
    pub fn append_midi(&mut self, port: u8, status: u8, data1: u8, data2: u8) -> &mut Self {
        self.append(Midi::new(port, status, data1, data2))
    }

    /// Append a time-tag argument.
    pub fn append_time_tag(&mut self, time_tag: TimeTag) -> &mut Self {
        self.append(time_tag)
    }

    /// Append the current system time as a time-tag.
    pub fn append_current_time(&mut self) -> &mut Self {
        self.append(TimeTag::now())
    }

    /// Append a nil argument (`N`), which has no payload.
    pub fn append_null(&mut self) -> &mut Self {
        self.append(Value::Null)
    }

    /// Append an impulse argument (`I`), which has no payload.
    pub fn append_impulse(&mut self) -> &mut Self {
        self.append(Value::Impulse)
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether the message has no arguments.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// The argument at `index`, or [`ArgumentError::IndexOutOfBounds`].
    pub fn arg(&self, index: usize) -> Result<ArgRef<'_>, ArgumentError> {
        self.args
            .get(index)
            .map(|arg| ArgRef::new(self, *arg))
            .ok_or_else(|| ArgumentError::IndexOutOfBounds {
                address: self.address.clone(),
                index,
            })
    }

    /// Type of the argument at `index`.
    pub fn arg_type(&self, index: usize) -> Result<ArgType, ArgumentError> {
        self.arg(index).map(|arg| arg.arg_type())
    }

    /// All arguments in wire order.
    pub fn args(&self) -> impl Iterator<Item = ArgRef<'_>> {
        self.args.iter().map(move |arg| ArgRef::new(self, *arg))
    }

    /// The type tag string, including the leading `,`.
    pub fn type_tags(&self) -> String {
        std::iter::once(',')
            .chain(self.args.iter().map(|arg| char::from(arg.ty.tag())))
            .collect()
    }

    /// The encoded packet.
    ///
    /// The first call after a mutation builds and caches the packet; later
    /// calls return the cached buffer without copying.
    pub fn to_bytes(&self) -> Bytes {
        self.cache.get_or_init(|| self.encode()).clone()
    }

    /// Size of the encoded packet in bytes.
    pub fn encoded_len(&self) -> usize {
        match self.cache.get() {
            Some(cached) => cached.len(),
            None => {
                cursor::padded_string_len(cursor::until_nul(&self.address).len())
                    + cursor::padded_string_len(1 + self.args.len())
                    + self.data.len()
            }
        }
    }

    /// Whether the encoded packet is currently cached.
    pub fn is_cached(&self) -> bool {
        self.cache.get().is_some()
    }

    /// Reset the address and drop all arguments.
    pub fn clear(&mut self) {
        self.address.clear();
        self.data.clear();
        self.args.clear();
        self.invalidate();
    }

    /// Decode a single message (not a bundle) from `data`.
    ///
    /// Every read is checked against the length of `data`; malformed input
    /// produces an error rather than a partial message.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.is_empty() {
            return Err(DecodeError::Empty);
        }
        if data[0] != b'/' {
            return Err(DecodeError::InvalidAddress);
        }

        let mut reader = Cursor::new(data);
        let (_, address) = reader.read_padded_str()?;

        // some OSC 1.0 senders omit the type tag string for argument-less messages
        let tags: &[u8] = if reader.is_at_end() {
            &[]
        } else {
            let (_, tags) = reader.read_padded_bytes()?;
            tags.strip_prefix(b",").ok_or(DecodeError::MissingTypeTags)?
        };

        let payload_start = reader.position();
        let mut args = Vec::with_capacity(tags.len());
        for &tag in tags {
            let ty = ArgType::from_tag(tag).ok_or(DecodeError::UnknownTypeTag {
                tag: char::from(tag),
            })?;
            let (start, size) = match ty {
                ArgType::String => {
                    let (start, s) = reader.read_padded_str()?;
                    (start, s.len())
                }
                ArgType::Blob => {
                    let length = reader.read_u32()? as usize;
                    let start = reader.position();
                    if length > reader.remaining() {
                        return Err(DecodeError::BlobOutOfBounds {
                            offset: start,
                            length,
                        });
                    }
                    reader.take(cursor::padded_len(length))?;
                    (start, length)
                }
                ArgType::Char => {
                    let start = reader.position();
                    let value = reader.read_u32()?;
                    if char::from_u32(value).is_none() {
                        return Err(DecodeError::InvalidChar { value });
                    }
                    (start, 4)
                }
                _ => {
                    let start = reader.position();
                    let size = ty.fixed_size().unwrap_or_default();
                    reader.take(size)?;
                    (start, size)
                }
            };
            args.push(Argument {
                ty,
                offset: start - payload_start,
                size,
            });
        }

        let end = reader.position();
        Ok(Self {
            address: address.to_string(),
            data: BytesMut::from(&data[payload_start..end]),
            args,
            cache: OnceLock::from(Bytes::copy_from_slice(&data[..end])),
        })
    }

    pub(crate) fn payload(&self) -> &[u8] {
        &self.data
    }

    fn invalidate(&mut self) {
        self.cache = OnceLock::new();
    }

    fn encode(&self) -> Bytes {
        check_address(&self.address);
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        cursor::put_padded_str(&mut buf, cursor::until_nul(&self.address).as_bytes());
        let tags = self.type_tags();
        cursor::put_padded_str(&mut buf, tags.as_bytes());
        buf.put_slice(&self.data);
        tracing::trace!(address = %self.address, len = buf.len(), "encoded message");
        buf.freeze()
    }
}

fn check_address(address: &str) {
    debug_assert!(
        address.starts_with('/'),
        "OSC address must start with '/', got {address:?}"
    );
}

/// Messages compare by address and argument values, not by encoded bytes.
impl PartialEq for Message {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
            && self.args.len() == other.args.len()
            && self.args().zip(other.args()).all(|(a, b)| a == b)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.address, self.type_tags())?;
        for arg in self.args() {
            write!(f, " {}", arg.value())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_layout() {
        let msg = Message::new("/a");
        assert_eq!(msg.to_bytes().as_ref(), b"/a\0\0,\0\0\0");
    }

    #[test]
    fn int_and_string_layout() {
        let msg = Message::new("/foo").with(1000).with("hello");
        let expected: &[u8] = b"/foo\0\0\0\0,is\0\0\0\x03\xe8hello\0\0\0";
        assert_eq!(msg.to_bytes().as_ref(), expected);
        assert_eq!(msg.encoded_len(), expected.len());
    }

    #[test]
    fn blob_layout() {
        let mut msg = Message::new("/b");
        msg.append_blob(&[9, 8, 7, 6, 5]);
        let bytes = msg.to_bytes();
        assert_eq!(&bytes[8..12], &[0, 0, 0, 5]);
        assert_eq!(&bytes[12..20], &[9, 8, 7, 6, 5, 0, 0, 0]);
        assert_eq!(msg.arg(0).unwrap().size(), 5);
    }

    #[test]
    fn char_is_in_low_byte() {
        let msg = Message::new("/c").with('A');
        assert_eq!(&msg.to_bytes()[8..], &[0, 0, 0, b'A']);
    }

    #[test]
    fn cache_is_reused_until_mutation() {
        let mut msg = Message::new("/x").with(1);
        assert!(!msg.is_cached());
        let first = msg.to_bytes();
        assert!(msg.is_cached());
        let second = msg.to_bytes();
        assert_eq!(first, second);
        assert_eq!(first.as_ptr(), second.as_ptr());

        msg.append(2);
        assert!(!msg.is_cached());
        assert_ne!(msg.to_bytes(), first);

        msg.set_address("/y");
        assert!(!msg.is_cached());
        assert!(msg.to_bytes().starts_with(b"/y\0\0"));
    }

    #[test]
    fn clear_resets_everything() {
        let mut msg = Message::new("/x").with(1).with("s");
        let _ = msg.to_bytes();
        msg.clear();
        assert!(!msg.is_cached());
        assert!(msg.is_empty());
        assert_eq!(msg.address(), "");
    }

    #[test]
    fn cleared_message_takes_a_new_address() {
        let mut msg = Message::new("/x").with(1);
        msg.clear();
        msg.set_address("/y");
        msg.append("again");
        let decoded = Message::decode(&msg.to_bytes()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "must start with '/'")]
    fn address_must_start_with_slash() {
        let _ = Message::new("synth/freq");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "must start with '/'")]
    fn set_address_must_start_with_slash() {
        Message::new("/a").set_address("a");
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "must start with '/'")]
    fn cleared_message_cannot_be_encoded() {
        let mut msg = Message::new("/a");
        msg.clear();
        let _ = msg.to_bytes();
    }

    #[test]
    fn try_append_blob_accepts_normal_blobs() {
        let mut msg = Message::new("/b");
        msg.try_append_blob(&[1, 2, 3]).unwrap();
        assert_eq!(msg.arg(0).unwrap().blob_data().unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn index_out_of_bounds() {
        let msg = Message::new("/x").with(1);
        let err = msg.arg(3).unwrap_err();
        assert_eq!(
            err,
            ArgumentError::IndexOutOfBounds {
                address: "/x".to_string(),
                index: 3
            }
        );
        assert_eq!(err.to_string(), "3 out of bounds from address, /x");
    }

    #[test]
    fn interior_nul_truncates_string() {
        let msg = Message::new("/x").with("ab\0cd");
        let decoded = Message::decode(&msg.to_bytes()).unwrap();
        assert_eq!(decoded.arg(0).unwrap().string().unwrap(), "ab");
    }

    #[test]
    fn decode_without_type_tags() {
        let msg = Message::decode(b"/ping\0\0\0").unwrap();
        assert_eq!(msg.address(), "/ping");
        assert!(msg.is_empty());
    }

    #[test]
    fn decoded_strings_report_bare_size() {
        let original = Message::new("/s").with("abc").with("").with("abcd");
        let decoded = Message::decode(&original.to_bytes()).unwrap();
        let sizes: Vec<usize> = decoded.args().map(|a| a.size()).collect();
        assert_eq!(sizes, vec![3, 0, 4]);
        assert_eq!(decoded, original);
    }

    #[test]
    fn display() {
        let msg = Message::new("/d").with(1).with("x").with(true);
        assert_eq!(msg.to_string(), "/d ,isT 1 \"x\" true");
    }

    #[test]
    fn equality_ignores_cache_state() {
        let a = Message::new("/e").with(1.5f32);
        let b = Message::decode(&a.to_bytes()).unwrap();
        assert!(b.is_cached());
        assert!(!Message::new("/e").with(1.5f32).is_cached());
        assert_eq!(a, b);
        assert_ne!(a, Message::new("/e").with(1.5f64));
    }
}
