//! Open Sound Control 1.0/1.1 codec.
//!
//! This crate turns typed values into OSC packets and back again. It knows
//! nothing about sockets: the transport crate moves the bytes, and the
//! dispatch crate routes decoded messages.
//!
//! # Wire format
//!
//! Every element is big-endian and padded with zero bytes to a multiple of
//! four:
//!
//! ```text
//! message: address\0 pad | ,tags\0 pad | arg payloads...
//! bundle:  #bundle\0 | time-tag (u64) | (u32 length | element)*
//! ```
//!
//! # Usage
//!
//! ```
//! use codec::{Bundle, Message, decode_packet};
//!
//! let msg = Message::new("/synth/freq").with(440.0f32).with("sine");
//! let bundle = Bundle::new().with(&msg);
//!
//! let decoded = decode_packet(&bundle.to_bytes())?;
//! assert_eq!(decoded, vec![msg]);
//! assert_eq!(decoded[0].arg(0)?.float32()?, 440.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod argument;
mod bundle;
mod cursor;
mod error;
mod message;
mod packet;
mod time_tag;
mod types;

pub use argument::{ArgRef, Argument};
pub use bundle::{BUNDLE_TAG, Bundle};
pub use error::{ArgumentError, DecodeError, EncodeError};
pub use message::Message;
pub use packet::{
    DEFAULT_MAX_BUNDLE_DEPTH, Packet, PacketDecoder, TimedMessage, decode_packet,
    decode_packet_timed, is_bundle,
};
pub use time_tag::TimeTag;
pub use types::{ArgType, Midi, Value};
