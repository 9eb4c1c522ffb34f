//! A reader that hands out data in fixed-size pieces.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};

/// An [`AsyncRead`] over a byte buffer that returns at most a given number
/// of bytes per read, cycling through a list of chunk sizes.
///
/// Useful to check that framing does not depend on how a stream happens to
/// be split into reads.
#[derive(Debug)]
pub struct ChunkedReader {
    data: Vec<u8>,
    position: usize,
    chunks: Vec<usize>,
    next_chunk: usize,
}

impl ChunkedReader {
    /// Deliver `data` in reads of `chunk_size` bytes (at least one).
    pub fn new(data: Vec<u8>, chunk_size: usize) -> Self {
        Self::with_chunks(data, vec![chunk_size])
    }

    /// Deliver `data` in reads whose sizes cycle through `chunks`.
    pub fn with_chunks(data: Vec<u8>, chunks: Vec<usize>) -> Self {
        let chunks = if chunks.is_empty() { vec![1] } else { chunks };
        Self {
            data,
            position: 0,
            chunks,
            next_chunk: 0,
        }
    }
}

impl AsyncRead for ChunkedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let chunk = this.chunks[this.next_chunk].max(1);
        this.next_chunk = (this.next_chunk + 1) % this.chunks.len();

        let remaining = this.data.len() - this.position;
        let len = chunk.min(remaining).min(buf.remaining());
        buf.put_slice(&this.data[this.position..this.position + len]);
        this.position += len;
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn reads_are_capped() {
        let mut reader = ChunkedReader::with_chunks((0..10).collect(), vec![3, 1]);
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).await.unwrap(), 3);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 1);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 3);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 1);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 2);
        assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    }
}
