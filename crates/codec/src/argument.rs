//! Argument descriptors and typed access to argument values.
//!
//! A [`Message`] owns a single payload buffer. Each argument is a small
//! descriptor (type, offset, size) into that buffer, and values are read
//! through an [`ArgRef`] which borrows the message. The borrow checker
//! therefore rules out reading a stale offset after the message changes.

use bytes::Bytes;

use crate::error::ArgumentError;
use crate::message::Message;
use crate::time_tag::TimeTag;
use crate::types::{ArgType, Midi, Value};

/// Location of one argument inside its message's payload buffer.
///
/// `offset` points at the first byte of the value (after the length prefix
/// for blobs) and `size` excludes terminators and padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argument {
    pub(crate) ty: ArgType,
    pub(crate) offset: usize,
    pub(crate) size: usize,
}

impl Argument {
    /// The argument's OSC type.
    pub fn arg_type(&self) -> ArgType {
        self.ty
    }

    /// Start of the value in the message's payload buffer.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the value in bytes, without padding or length prefix.
    pub fn size(&self) -> usize {
        self.size
    }
}

/// A borrowed view of one argument of a [`Message`].
#[derive(Debug, Clone, Copy)]
pub struct ArgRef<'a> {
    message: &'a Message,
    arg: Argument,
}

impl<'a> ArgRef<'a> {
    pub(crate) fn new(message: &'a Message, arg: Argument) -> Self {
        Self { message, arg }
    }

    /// The argument's stored type.
    pub fn arg_type(&self) -> ArgType {
        self.arg.ty
    }

    /// Size of the value in bytes, without padding or length prefix.
    pub fn size(&self) -> usize {
        self.arg.size
    }

    /// Where the argument lives in the message's payload.
    pub fn descriptor(&self) -> Argument {
        self.arg
    }

    /// The value as an `i32`. Accepts int32 and the two bool types.
    pub fn int32(&self) -> Result<i32, ArgumentError> {
        match self.arg.ty {
            ArgType::Int32 => Ok(i32::from_be_bytes(self.array())),
            ArgType::True => Ok(1),
            ArgType::False => Ok(0),
            _ => Err(self.non_convertible(ArgType::Int32)),
        }
    }

    /// The value as an `i64`. Accepts int64, int32 and the two bool types.
    pub fn int64(&self) -> Result<i64, ArgumentError> {
        match self.arg.ty {
            ArgType::Int64 => Ok(i64::from_be_bytes(self.array())),
            ArgType::Int32 | ArgType::True | ArgType::False => self.int32().map(i64::from),
            _ => Err(self.non_convertible(ArgType::Int64)),
        }
    }

    /// The value as an `f32`. Only float32 is accepted; narrowing a float64
    /// would lose precision.
    pub fn float32(&self) -> Result<f32, ArgumentError> {
        match self.arg.ty {
            ArgType::Float32 => Ok(f32::from_be_bytes(self.array())),
            _ => Err(self.non_convertible(ArgType::Float32)),
        }
    }

    /// The value as an `f64`. Accepts float64, float32 and int32, all of
    /// which convert without loss.
    pub fn float64(&self) -> Result<f64, ArgumentError> {
        match self.arg.ty {
            ArgType::Float64 => Ok(f64::from_be_bytes(self.array())),
            ArgType::Float32 => self.float32().map(f64::from),
            ArgType::Int32 => self.int32().map(f64::from),
            _ => Err(self.non_convertible(ArgType::Float64)),
        }
    }

    /// The value as a `bool`. Integers convert as "non-zero is true".
    pub fn boolean(&self) -> Result<bool, ArgumentError> {
        match self.arg.ty {
            ArgType::True => Ok(true),
            ArgType::False => Ok(false),
            ArgType::Int32 | ArgType::Int64 => self.int64().map(|v| v != 0),
            _ => Err(self.non_convertible(ArgType::True)),
        }
    }

    /// The value of a char argument.
    pub fn character(&self) -> Result<char, ArgumentError> {
        match self.arg.ty {
            // validated when appended or decoded
            ArgType::Char => Ok(char::from_u32(u32::from_be_bytes(self.array()))
                .unwrap_or(char::REPLACEMENT_CHARACTER)),
            _ => Err(self.non_convertible(ArgType::Char)),
        }
    }

    /// The string contents, borrowed from the message. Blobs are not
    /// converted.
    pub fn string(&self) -> Result<&'a str, ArgumentError> {
        match self.arg.ty {
            // validated when appended or decoded
            ArgType::String => Ok(std::str::from_utf8(self.bytes()).unwrap_or_default()),
            _ => Err(self.non_convertible(ArgType::String)),
        }
    }

    /// A copy of the blob contents.
    pub fn blob(&self) -> Result<Bytes, ArgumentError> {
        self.blob_data().map(Bytes::copy_from_slice)
    }

    /// The blob contents without copying. The slice borrows the message.
    pub fn blob_data(&self) -> Result<&'a [u8], ArgumentError> {
        match self.arg.ty {
            ArgType::Blob => Ok(self.bytes()),
            _ => Err(self.non_convertible(ArgType::Blob)),
        }
    }

    /// The four MIDI bytes.
    pub fn midi(&self) -> Result<Midi, ArgumentError> {
        match self.arg.ty {
            ArgType::Midi => Ok(Midi::from_bytes(self.array())),
            _ => Err(self.non_convertible(ArgType::Midi)),
        }
    }

    /// The value of a time-tag argument.
    pub fn time_tag(&self) -> Result<TimeTag, ArgumentError> {
        match self.arg.ty {
            ArgType::TimeTag => Ok(TimeTag::from_raw(u64::from_be_bytes(self.array()))),
            _ => Err(self.non_convertible(ArgType::TimeTag)),
        }
    }

    /// The value in its stored type.
    pub fn value(&self) -> Value<'a> {
        // every arm reads the stored type, so none of the conversions can fail
        let value = match self.arg.ty {
            ArgType::Int32 => self.int32().map(Value::Int32),
            ArgType::Float32 => self.float32().map(Value::Float32),
            ArgType::Float64 => self.float64().map(Value::Float64),
            ArgType::Int64 => self.int64().map(Value::Int64),
            ArgType::String => self.string().map(Value::String),
            ArgType::Blob => self.blob_data().map(Value::Blob),
            ArgType::Midi => self.midi().map(Value::Midi),
            ArgType::TimeTag => self.time_tag().map(Value::TimeTag),
            ArgType::True => Ok(Value::Bool(true)),
            ArgType::False => Ok(Value::Bool(false)),
            ArgType::Char => self.character().map(Value::Char),
            ArgType::Null => Ok(Value::Null),
            ArgType::Impulse => Ok(Value::Impulse),
        };
        value.unwrap_or(Value::Null)
    }

    fn bytes(&self) -> &'a [u8] {
        &self.message.payload()[self.arg.offset..self.arg.offset + self.arg.size]
    }

    fn array<const N: usize>(&self) -> [u8; N] {
        let mut out = [0; N];
        out.copy_from_slice(&self.bytes()[..N]);
        out
    }

    fn non_convertible(&self, requested: ArgType) -> ArgumentError {
        ArgumentError::NonConvertible {
            address: self.message.address().to_string(),
            actual: self.arg.ty,
            requested,
        }
    }
}

impl PartialEq for ArgRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}
