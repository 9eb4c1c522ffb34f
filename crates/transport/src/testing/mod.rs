//! Testing utilities for code built on the stream transports.

mod chunked;
mod memory;

pub use chunked::ChunkedReader;
pub use memory::MemoryTransport;

use bytes::BufMut;
use codec::Packet;

/// Frame one packet the way a stream transport sends it.
///
/// ```
/// use codec::Message;
/// use transport::testing::frame_packet;
///
/// let bytes = frame_packet(&Message::new("/a"));
/// assert_eq!(&bytes[..4], &[0, 0, 0, 8]);
/// ```
///
/// # Panics
///
/// If the packet is 4 GiB or larger, which no length prefix can describe.
pub fn frame_packet(packet: &impl Packet) -> Vec<u8> {
    let bytes = packet.to_bytes();
    let Ok(length) = u32::try_from(bytes.len()) else {
        panic!("packet of {} bytes is too large to frame", bytes.len());
    };
    let mut out = Vec::with_capacity(4 + bytes.len());
    out.put_u32(length);
    out.put_slice(&bytes);
    out
}

/// Frame several packets back to back.
pub fn frame_packets<P: Packet>(packets: &[P]) -> Vec<u8> {
    packets.iter().flat_map(frame_packet).collect()
}
