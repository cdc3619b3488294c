use std::task::Poll;

use futures::io::{AsyncBufRead, AsyncRead, AsyncWrite};

/// Wraps a [`Pipe`](crate::Pipe) to tally bytes crossed in either direction,
/// so [`Stream`](super::Stream) can decide when a rekey is due.
pub struct IoCounter<S> {
    inner: S,
    rx: usize,
    tx: usize,
}

impl<S> IoCounter<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            rx: 0,
            tx: 0,
        }
    }

    /// Total bytes seen since the last [`reset`](Self::reset).
    pub fn count(&self) -> usize {
        self.rx + self.tx
    }

    /// Zero the tally, called at each `NEWKEYS` boundary.
    pub fn reset(&mut self) {
        self.rx = 0;
        self.tx = 0;
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for IoCounter<S> {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut [u8],
    ) -> Poll<std::io::Result<usize>> {
        let poll = std::pin::Pin::new(&mut self.inner).poll_read(cx, buf);

        if let Poll::Ready(Ok(bytes)) = poll {
            self.rx += bytes;
        }

        poll
    }

    fn poll_read_vectored(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        bufs: &mut [std::io::IoSliceMut<'_>],
    ) -> Poll<std::io::Result<usize>> {
        let poll = std::pin::Pin::new(&mut self.inner).poll_read_vectored(cx, bufs);

        if let Poll::Ready(Ok(bytes)) = poll {
            self.rx += bytes;
        }

        poll
    }
}

impl<S: AsyncBufRead + Unpin> AsyncBufRead for IoCounter<S> {
    fn poll_fill_buf(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<std::io::Result<&[u8]>> {
        let this = self.get_mut();

        std::pin::Pin::new(&mut this.inner).poll_fill_buf(cx)
    }

    fn consume(mut self: std::pin::Pin<&mut Self>, amt: usize) {
        self.rx += amt;

        std::pin::Pin::new(&mut self.inner).consume(amt)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for IoCounter<S> {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        let poll = std::pin::Pin::new(&mut self.inner).poll_write(cx, buf);

        if let Poll::Ready(Ok(bytes)) = poll {
            self.tx += bytes;
        }

        poll
    }

    fn poll_write_vectored(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        bufs: &[std::io::IoSlice<'_>],
    ) -> Poll<std::io::Result<usize>> {
        let poll = std::pin::Pin::new(&mut self.inner).poll_write_vectored(cx, bufs);

        if let Poll::Ready(Ok(bytes)) = poll {
            self.tx += bytes;
        }

        poll
    }

    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_close(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.inner).poll_close(cx)
    }
}
