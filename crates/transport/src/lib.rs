//! Async OSC transports using tokio.
//!
//! Packets travel either as UDP datagrams, one packet per datagram, or over a
//! byte stream such as TCP where every packet is preceded by its length as a
//! 4-byte big-endian integer.
//!
//! # Architecture
//!
//! - [`FrameCodec`] implements the tokio-util `Encoder` and `Decoder` traits
//!   for the length-prefixed stream framing
//! - [`OscReader`] and [`OscWriter`] wrap the halves of a byte stream to
//!   produce a `Stream` of decoded messages and a `Sink` of packets
//! - [`UdpSender`]/[`TcpSender`] implement [`Sender`], and
//!   [`UdpReceiver`]/[`TcpReceiver`] implement [`Receiver`], which decodes
//!   every incoming packet and hands its messages to a shared
//!   [`Dispatcher`](dispatch::Dispatcher)
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use codec::Message;
//! use dispatch::Dispatcher;
//! use transport::{Receiver, Sender, UdpReceiver, UdpSender};
//!
//! let dispatcher = Arc::new(Dispatcher::new());
//! dispatcher.register("/synth/*/freq", |msg| {
//!     println!("{msg}");
//!     Ok(())
//! });
//!
//! let mut receiver = UdpReceiver::new(dispatcher);
//! let addr = receiver.bind("127.0.0.1:0".parse()?).await?;
//! receiver.listen()?;
//!
//! let mut sender = UdpSender::bind("127.0.0.1:0".parse()?, addr).await?;
//! sender.send(&Message::new("/synth/1/freq").with(440.0f32)).await?;
//! ```
//!
//! # Scope
//!
//! Delivery, ordering and reconnection are left to the caller. Receivers
//! report socket failures through their error handler and stop; senders
//! return them.

mod error;
mod framing;
mod reader;
mod receiver;
mod sender;
mod transport;
mod writer;

pub mod testing;

pub use error::TransportError;
pub use framing::{DEFAULT_MAX_FRAME_SIZE, FrameCodec};
pub use reader::OscReader;
pub use receiver::{
    ConnectionInfo, ErrorHandler, Receiver, ReceiverState, TcpReceiver, UdpReceiver,
};
pub use sender::{Sender, TcpSender, UdpSender};
pub use transport::{StreamTransport, split};
pub use writer::OscWriter;

use std::io;
use tokio::net::{TcpStream, ToSocketAddrs};

/// Connect to a TCP peer and return a reader/writer pair.
///
/// ```ignore
/// let (reader, writer) = transport::connect("127.0.0.1:9000").await?;
/// ```
pub async fn connect(
    addr: impl ToSocketAddrs,
) -> io::Result<(
    OscReader<tokio::net::tcp::OwnedReadHalf>,
    OscWriter<tokio::net::tcp::OwnedWriteHalf>,
)> {
    let stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    Ok(split(stream))
}
