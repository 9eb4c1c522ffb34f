//! OSC packet reader for stream transports.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use codec::{Message, PacketDecoder};
use futures::Stream;
use pin_project_lite::pin_project;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;

use crate::error::TransportError;
use crate::framing::FrameCodec;

pin_project! {
    /// An async stream of decoded packets.
    ///
    /// Each item holds the messages of one frame, with bundles flattened. A
    /// frame that fails to decode yields a [`TransportError::Decode`] and the
    /// stream carries on with the next frame; framing and I/O errors end it.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::StreamExt;
    /// use transport::OscReader;
    ///
    /// let mut reader = OscReader::new(tcp_read_half);
    ///
    /// while let Some(result) = reader.next().await {
    ///     match result {
    ///         Ok(messages) => { /* handle messages */ }
    ///         Err(e) if !e.is_fatal() => continue,
    ///         Err(e) => return Err(e),
    ///     }
    /// }
    /// ```
    #[derive(Debug)]
    pub struct OscReader<R> {
        #[pin]
        inner: FramedRead<R, FrameCodec>,
        decoder: PacketDecoder,
    }
}

impl<R> OscReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Read frames from `reader` with the default frame size limit and
    /// bundle nesting limit.
    pub fn new(reader: R) -> Self {
        Self::with_codec(reader, FrameCodec::new(), PacketDecoder::default())
    }

    /// Create a reader with a custom frame limit and bundle nesting limit.
    pub fn with_codec(reader: R, codec: FrameCodec, decoder: PacketDecoder) -> Self {
        Self {
            inner: FramedRead::new(reader, codec),
            decoder,
        }
    }

    /// Read frames from `reader` with limits taken from `settings`.
    pub fn from_settings(reader: R, settings: &config::Settings) -> Self {
        Self::with_codec(
            reader,
            FrameCodec::from_settings(&settings.tcp),
            PacketDecoder::new(settings.decode.max_bundle_depth),
        )
    }

    /// Shared access to the underlying reader.
    pub fn get_ref(&self) -> &R {
        self.inner.get_ref()
    }

    /// Mutable access to the underlying reader. Reading from it directly
    /// will corrupt the frame stream.
    pub fn get_mut(&mut self) -> &mut R {
        self.inner.get_mut()
    }

    /// The underlying reader. Buffered bytes are lost.
    pub fn into_inner(self) -> R {
        self.inner.into_inner()
    }
}

impl<R> Stream for OscReader<R>
where
    R: AsyncRead + Unpin,
{
    type Item = Result<Vec<Message>, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let frame = match ready!(this.inner.poll_next(cx)) {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => return Poll::Ready(Some(Err(e))),
            None => return Poll::Ready(None),
        };
        let decoded = this.decoder.decode(&frame).map_err(TransportError::from);
        if let Err(e) = &decoded {
            tracing::debug!(error = %e, len = frame.len(), "undecodable frame");
        }
        Poll::Ready(Some(decoded))
    }
}
