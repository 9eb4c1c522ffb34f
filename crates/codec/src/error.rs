//! Error types for the codec.

use crate::types::ArgType;

/// Errors raised when an argument is requested in a way the message cannot satisfy.
///
/// These indicate a bug in the caller rather than bad input from the network.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    /// The requested index is past the end of the argument list.
    #[error("{index} out of bounds from address, {address}")]
    IndexOutOfBounds {
        /// Address of the message that was queried.
        address: String,
        /// The offending index.
        index: usize,
    },

    /// The stored argument cannot be converted to the requested type.
    #[error("{address}: expected type: {requested}, actual type: {actual}")]
    NonConvertible {
        /// Address of the message that was queried.
        address: String,
        /// The type the argument was stored as.
        actual: ArgType,
        /// The type the caller asked for.
        requested: ArgType,
    },
}

/// Errors raised while building a packet.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    /// A blob or bundle element is too long for its 32-bit length prefix.
    #[error("{length} bytes do not fit a 32-bit length prefix")]
    TooLong {
        /// Length of the oversized element.
        length: usize,
    },
}

/// Errors produced while decoding a packet received from the network.
///
/// A decode error only ever affects the packet being decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The packet contained no bytes.
    #[error("empty packet")]
    Empty,

    /// The buffer ended before the element being read was complete.
    #[error("truncated packet: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        /// Where the read started.
        offset: usize,
        /// How many bytes the element required.
        needed: usize,
        /// How many bytes remained.
        available: usize,
    },

    /// The address did not start with `/`.
    #[error("address must start with '/'")]
    InvalidAddress,

    /// A string was not null-terminated within the buffer.
    #[error("unterminated string at offset {offset}")]
    MissingTerminator {
        /// Start of the string.
        offset: usize,
    },

    /// A string was not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Start of the string.
        offset: usize,
    },

    /// The type tag string did not begin with `,`.
    #[error("type tag string must start with ','")]
    MissingTypeTags,

    /// A type tag character outside the supported set.
    #[error("unknown type tag {tag:?}")]
    UnknownTypeTag {
        /// The unrecognised character.
        tag: char,
    },

    /// A blob announced a length that runs past the end of the buffer.
    #[error("blob of {length} bytes at offset {offset} exceeds packet bounds")]
    BlobOutOfBounds {
        /// Start of the blob payload.
        offset: usize,
        /// The announced length.
        length: usize,
    },

    /// A char argument did not hold a valid unicode scalar value.
    #[error("invalid char value {value:#x}")]
    InvalidChar {
        /// The raw 32-bit value.
        value: u32,
    },

    /// A bundle element announced a length that is not a positive multiple of
    /// four or runs past the end of the bundle.
    #[error("invalid bundle element length {length} at offset {offset}")]
    InvalidElementLength {
        /// Start of the element's length prefix.
        offset: usize,
        /// The announced length.
        length: usize,
    },

    /// Bundles were nested deeper than the decoder allows.
    #[error("bundle nesting exceeds maximum depth {max}")]
    TooDeep {
        /// The configured limit.
        max: usize,
    },
}
