//! Error types for the transport layer.

use std::io;

use codec::DecodeError;

use crate::receiver::ReceiverState;

/// Errors raised by senders, receivers and stream framing.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred while binding, reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A stream frame announced a length above the configured maximum.
    #[error("frame size {size} exceeds maximum allowed {max}")]
    FrameTooLarge {
        /// The announced frame size.
        size: usize,
        /// The maximum allowed size.
        max: usize,
    },

    /// A packet could not be decoded. Only that packet is lost.
    #[error("malformed packet: {0}")]
    Decode(#[from] DecodeError),

    #[error("sender is not connected")]
    NotConnected,

    #[error("transport is closed")]
    Closed,

    /// A lifecycle operation was attempted in the wrong state.
    #[error("cannot {operation} a receiver that is {state}")]
    InvalidState {
        operation: &'static str,
        state: ReceiverState,
    },
}

impl TransportError {
    /// Whether the error ends the connection or socket it came from. Decode
    /// failures only drop one packet.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TransportError::Decode(_))
    }
}
