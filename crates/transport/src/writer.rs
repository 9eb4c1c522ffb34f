//! OSC packet writer for stream transports.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use codec::Packet;
use futures::Sink;
use pin_project_lite::pin_project;
use tokio::io::AsyncWrite;
use tokio_util::codec::FramedWrite;

use crate::error::TransportError;
use crate::framing::FrameCodec;

pin_project! {
    /// An async sink of length-prefixed packets.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use codec::Message;
    /// use transport::OscWriter;
    ///
    /// let mut writer = OscWriter::new(tcp_write_half);
    /// writer.send(&Message::new("/transport/play")).await?;
    /// ```
    #[derive(Debug)]
    pub struct OscWriter<W> {
        #[pin]
        inner: FramedWrite<W, FrameCodec>,
    }
}

impl<W> OscWriter<W>
where
    W: AsyncWrite + Unpin,
{
    /// Write frames to `writer` with the default frame size limit.
    pub fn new(writer: W) -> Self {
        Self {
            inner: FramedWrite::new(writer, FrameCodec::new()),
        }
    }

    /// Write frames to `writer` using `codec`.
    pub fn with_codec(writer: W, codec: FrameCodec) -> Self {
        Self {
            inner: FramedWrite::new(writer, codec),
        }
    }

    /// Encode, frame and flush one packet.
    pub async fn send(&mut self, packet: &impl Packet) -> Result<(), TransportError> {
        self.send_bytes(packet.to_bytes()).await
    }

    /// Frame and flush an already encoded packet.
    pub async fn send_bytes(&mut self, bytes: Bytes) -> Result<(), TransportError> {
        use futures::SinkExt;
        SinkExt::send(&mut self.inner, bytes).await
    }

    /// Flush and shut down the underlying writer.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        use futures::SinkExt;
        SinkExt::close(&mut self.inner).await
    }

    /// Shared access to the underlying writer.
    pub fn get_ref(&self) -> &W {
        self.inner.get_ref()
    }

    /// Mutable access to the underlying writer.
    pub fn get_mut(&mut self) -> &mut W {
        self.inner.get_mut()
    }

    /// The underlying writer. Unflushed frames are lost.
    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl<W> Sink<Bytes> for OscWriter<W>
where
    W: AsyncWrite + Unpin,
{
    type Error = TransportError;

    fn poll_ready(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_ready(cx)
    }

    fn start_send(self: Pin<&mut Self>, item: Bytes) -> Result<(), Self::Error> {
        self.project().inner.start_send(item)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.project().inner.poll_close(cx)
    }
}
