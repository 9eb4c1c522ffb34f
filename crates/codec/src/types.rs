//! OSC argument types and borrowed values.

use std::fmt;

use crate::time_tag::TimeTag;

/// The argument types supported by [`Message`](crate::Message).
///
/// Covers the OSC 1.0 required types, the OSC 1.1 additions and the
/// commonly supported nonstandard types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArgType {
    Int32,
    Float32,
    Float64,
    Int64,
    String,
    Blob,
    Midi,
    TimeTag,
    True,
    False,
    Char,
    Null,
    Impulse,
}

impl ArgType {
    /// The type tag character written to the wire.
    pub fn tag(self) -> u8 {
        match self {
            ArgType::Int32 => b'i',
            ArgType::Float32 => b'f',
            ArgType::Float64 => b'd',
            ArgType::Int64 => b'h',
            ArgType::String => b's',
            ArgType::Blob => b'b',
            ArgType::Midi => b'm',
            ArgType::TimeTag => b't',
            ArgType::True => b'T',
            ArgType::False => b'F',
            ArgType::Char => b'c',
            ArgType::Null => b'N',
            ArgType::Impulse => b'I',
        }
    }

    /// Parse a type tag character.
    pub fn from_tag(tag: u8) -> Option<Self> {
        let ty = match tag {
            b'i' => ArgType::Int32,
            b'f' => ArgType::Float32,
            b'd' => ArgType::Float64,
            b'h' => ArgType::Int64,
            b's' => ArgType::String,
            b'b' => ArgType::Blob,
            b'm' => ArgType::Midi,
            b't' => ArgType::TimeTag,
            b'T' => ArgType::True,
            b'F' => ArgType::False,
            b'c' => ArgType::Char,
            b'N' => ArgType::Null,
            b'I' => ArgType::Impulse,
            _ => return None,
        };
        Some(ty)
    }

    /// Width of the payload for fixed-size types, `None` for strings and blobs.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            ArgType::Int32 | ArgType::Float32 | ArgType::Midi | ArgType::Char => Some(4),
            ArgType::Float64 | ArgType::Int64 | ArgType::TimeTag => Some(8),
            ArgType::True | ArgType::False | ArgType::Null | ArgType::Impulse => Some(0),
            ArgType::String | ArgType::Blob => None,
        }
    }

    /// Human readable name, used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            ArgType::Int32 => "int32",
            ArgType::Float32 => "float32",
            ArgType::Float64 => "float64",
            ArgType::Int64 => "int64",
            ArgType::String => "string",
            ArgType::Blob => "blob",
            ArgType::Midi => "midi",
            ArgType::TimeTag => "time-tag",
            ArgType::True => "bool-true",
            ArgType::False => "bool-false",
            ArgType::Char => "char",
            ArgType::Null => "null",
            ArgType::Impulse => "impulse",
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A four byte MIDI message: port id, status byte and two data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Midi {
    pub port: u8,
    pub status: u8,
    pub data1: u8,
    pub data2: u8,
}

impl Midi {
    /// A MIDI message from its four wire bytes.
    pub fn new(port: u8, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            port,
            status,
            data1,
            data2,
        }
    }

    pub(crate) fn to_bytes(self) -> [u8; 4] {
        [self.port, self.status, self.data1, self.data2]
    }

    pub(crate) fn from_bytes(b: [u8; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

/// A decoded argument value.
///
/// Strings and blobs borrow from the message that owns them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Int32(i32),
    Float32(f32),
    Float64(f64),
    Int64(i64),
    String(&'a str),
    Blob(&'a [u8]),
    Midi(Midi),
    TimeTag(TimeTag),
    Bool(bool),
    Char(char),
    Null,
    Impulse,
}

impl Value<'_> {
    /// The wire type this value is encoded as.
    pub fn arg_type(&self) -> ArgType {
        match self {
            Value::Int32(_) => ArgType::Int32,
            Value::Float32(_) => ArgType::Float32,
            Value::Float64(_) => ArgType::Float64,
            Value::Int64(_) => ArgType::Int64,
            Value::String(_) => ArgType::String,
            Value::Blob(_) => ArgType::Blob,
            Value::Midi(_) => ArgType::Midi,
            Value::TimeTag(_) => ArgType::TimeTag,
            Value::Bool(true) => ArgType::True,
            Value::Bool(false) => ArgType::False,
            Value::Char(_) => ArgType::Char,
            Value::Null => ArgType::Null,
            Value::Impulse => ArgType::Impulse,
        }
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "{v}"),
            Value::Float32(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v:?}"),
            Value::Blob(v) => write!(f, "<{} bytes>", v.len()),
            Value::Midi(m) => write!(
                f,
                "[{:#04x} {:#04x} {:#04x} {:#04x}]",
                m.port, m.status, m.data1, m.data2
            ),
            Value::TimeTag(t) => write!(f, "{t}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Null => f.write_str("nil"),
            Value::Impulse => f.write_str("impulse"),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value<'_> {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_value! {
    i32 => Int32,
    f32 => Float32,
    f64 => Float64,
    i64 => Int64,
    Midi => Midi,
    TimeTag => TimeTag,
    bool => Bool,
    char => Char,
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::String(v)
    }
}

impl<'a> From<&'a String> for Value<'a> {
    fn from(v: &'a String) -> Self {
        Value::String(v.as_str())
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(v: &'a [u8]) -> Self {
        Value::Blob(v)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Value<'a> {
    fn from(v: &'a [u8; N]) -> Self {
        Value::Blob(v.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip() {
        for ty in [
            ArgType::Int32,
            ArgType::Float32,
            ArgType::Float64,
            ArgType::Int64,
            ArgType::String,
            ArgType::Blob,
            ArgType::Midi,
            ArgType::TimeTag,
            ArgType::True,
            ArgType::False,
            ArgType::Char,
            ArgType::Null,
            ArgType::Impulse,
        ] {
            assert_eq!(ArgType::from_tag(ty.tag()), Some(ty));
        }
        assert_eq!(ArgType::from_tag(b'x'), None);
        assert_eq!(ArgType::from_tag(b'['), None);
    }

    #[test]
    fn bool_values_map_to_distinct_tags() {
        assert_eq!(Value::Bool(true).arg_type(), ArgType::True);
        assert_eq!(Value::Bool(false).arg_type(), ArgType::False);
    }

    #[test]
    fn display_names() {
        assert_eq!(ArgType::TimeTag.to_string(), "time-tag");
        assert_eq!(Value::String("hi").to_string(), "\"hi\"");
        assert_eq!(Value::Blob(&[1, 2, 3]).to_string(), "<3 bytes>");
    }
}
