//! Splitting byte streams into OSC readers and writers.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::reader::OscReader;
use crate::writer::OscWriter;

/// A byte stream that can be split into separate read and write halves.
///
/// Implemented for [`TcpStream`] and for the in-memory
/// [`MemoryTransport`](crate::testing::MemoryTransport).
pub trait StreamTransport: Send + 'static {
    type Read: AsyncRead + Unpin + Send + 'static;
    type Write: AsyncWrite + Unpin + Send + 'static;

    /// Split into independently owned read and write halves.
    fn into_split(self) -> (Self::Read, Self::Write);
}

impl StreamTransport for TcpStream {
    type Read = OwnedReadHalf;
    type Write = OwnedWriteHalf;

    fn into_split(self) -> (Self::Read, Self::Write) {
        TcpStream::into_split(self)
    }
}

/// Split a stream into a packet reader and writer which can be used
/// independently and concurrently.
///
/// ```ignore
/// use transport::split;
/// use tokio::net::TcpStream;
///
/// let stream = TcpStream::connect("127.0.0.1:9000").await?;
/// let (reader, writer) = split(stream);
/// ```
pub fn split<T: StreamTransport>(transport: T) -> (OscReader<T::Read>, OscWriter<T::Write>) {
    let (read, write) = transport.into_split();
    (OscReader::new(read), OscWriter::new(write))
}
