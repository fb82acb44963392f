//! Chunk-framed content streams.
//!
//! Bulk content (deployment archives) travels inside a request as a sequence
//! of chunks:
//!
//! ```text
//! [CHUNK_START][u32 length][bytes] ... [CHUNK_START][u32 length][bytes][CHUNK_END]
//! ```
//!
//! [`ChunkedReader`] presents such a sequence as one continuous
//! [`AsyncRead`], so a consumer that knows nothing about chunk boundaries can
//! read it to the end. The writer helpers produce the same framing.

use std::{
    io,
    num::NonZeroUsize,
    pin::Pin,
    task::{Context, Poll, ready},
};

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, ReadBuf};
use tracing::debug;

use crate::byte_order::NetworkOrder;

/// Marker preceding each chunk.
pub const CHUNK_START: u8 = 0x98;
/// Marker terminating a chunk sequence.
pub const CHUNK_END: u8 = 0x99;

/// Faults in the chunk framing.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChunkError {
    /// A byte other than [`CHUNK_START`] or [`CHUNK_END`] appeared where a
    /// marker was expected.
    #[error("invalid chunk marker {0:#04x}")]
    InvalidMarker(u8),
    /// The enclosing stream ended before the end marker.
    #[error("stream ended inside {0}")]
    Truncated(&'static str),
    /// The enclosing stream failed.
    #[error("underlying stream failed: {0}")]
    Transport(io::ErrorKind),
    /// A chunk length does not fit in memory on this platform.
    #[error("chunk length {0} exceeds the addressable size")]
    TooLong(u32),
}

impl From<ChunkError> for io::Error {
    fn from(error: ChunkError) -> Self {
        match error {
            ChunkError::Transport(kind) => io::Error::from(kind),
            ChunkError::Truncated(_) => io::Error::new(io::ErrorKind::UnexpectedEof, error),
            ChunkError::InvalidMarker(_) | ChunkError::TooLong(_) => {
                io::Error::new(io::ErrorKind::InvalidData, error)
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum ChunkState {
    Marker,
    Length { bytes: [u8; 4], filled: usize },
    Body { remaining: usize },
    Finished,
}

/// Continuous reader over a chunk-framed section of `inner`.
///
/// Reading stops at the end marker; further reads return end-of-stream. The
/// reader only borrows `inner`, so dropping or [closing](Self::close) it never
/// closes the enclosing stream.
pub struct ChunkedReader<'a, R: ?Sized> {
    inner: &'a mut R,
    state: ChunkState,
    fault: Option<ChunkError>,
    chunks: usize,
}

impl<'a, R> ChunkedReader<'a, R>
where
    R: AsyncRead + Unpin + ?Sized,
{
    /// Wrap `inner`, positioned at the first chunk marker.
    pub fn new(inner: &'a mut R) -> Self {
        Self {
            inner,
            state: ChunkState::Marker,
            fault: None,
            chunks: 0,
        }
    }

    /// Returns true once the end marker has been consumed.
    #[must_use]
    pub fn is_finished(&self) -> bool { matches!(self.state, ChunkState::Finished) }

    /// Number of chunk headers read so far.
    #[must_use]
    pub fn chunks_read(&self) -> usize { self.chunks }

    /// The first framing fault observed, if any.
    #[must_use]
    pub fn fault(&self) -> Option<&ChunkError> { self.fault.as_ref() }

    /// Close the reader, discarding any unread content up to the end marker.
    ///
    /// Draining keeps the enclosing stream aligned on the field that follows
    /// the chunk sequence. The borrow of the enclosing stream is released
    /// whether or not draining succeeds.
    ///
    /// # Errors
    ///
    /// Returns the recorded [`ChunkError`] if the framing was already found to
    /// be corrupt, or the fault hit while draining.
    pub async fn close(mut self) -> Result<u64, ChunkError> {
        if let Some(fault) = self.fault.take() {
            return Err(fault);
        }
        let drained = match tokio::io::copy(&mut self, &mut tokio::io::sink()).await {
            Ok(drained) => drained,
            Err(e) => return Err(self.fault.take().unwrap_or(ChunkError::Transport(e.kind()))),
        };
        if drained > 0 {
            debug!(drained, "discarded unread chunked content");
        }
        Ok(drained)
    }

    fn fail(&mut self, error: ChunkError) -> Poll<io::Result<()>> {
        if self.fault.is_none() {
            self.fault = Some(error.clone());
        }
        Poll::Ready(Err(error.into()))
    }

    fn poll_inner(&mut self, cx: &mut Context<'_>, dst: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut *self.inner).poll_read(cx, dst)
    }
}

impl<R> AsyncRead for ChunkedReader<'_, R>
where
    R: AsyncRead + Unpin + ?Sized,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(fault) = &this.fault {
            return Poll::Ready(Err(fault.clone().into()));
        }
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }
        loop {
            match this.state {
                ChunkState::Finished => return Poll::Ready(Ok(())),
                ChunkState::Marker => {
                    let mut marker = [0u8; 1];
                    let mut dst = ReadBuf::new(&mut marker);
                    if let Err(e) = ready!(this.poll_inner(cx, &mut dst)) {
                        return this.fail(ChunkError::Transport(e.kind()));
                    }
                    this.state = match dst.filled().first() {
                        None => return this.fail(ChunkError::Truncated("chunk marker")),
                        Some(&CHUNK_START) => {
                            this.chunks += 1;
                            ChunkState::Length {
                                bytes: [0; 4],
                                filled: 0,
                            }
                        }
                        Some(&CHUNK_END) => ChunkState::Finished,
                        Some(&other) => return this.fail(ChunkError::InvalidMarker(other)),
                    };
                }
                ChunkState::Length { mut bytes, filled } => {
                    let mut dst = ReadBuf::new(&mut bytes[filled..]);
                    if let Err(e) = ready!(this.poll_inner(cx, &mut dst)) {
                        return this.fail(ChunkError::Transport(e.kind()));
                    }
                    let read = dst.filled().len();
                    if read == 0 {
                        return this.fail(ChunkError::Truncated("chunk length"));
                    }
                    let filled = filled + read;
                    this.state = if filled == bytes.len() {
                        let len = u32::from_network(bytes);
                        let Ok(remaining) = usize::try_from(len) else {
                            return this.fail(ChunkError::TooLong(len));
                        };
                        ChunkState::Body { remaining }
                    } else {
                        ChunkState::Length { bytes, filled }
                    };
                }
                ChunkState::Body { remaining: 0 } => this.state = ChunkState::Marker,
                ChunkState::Body { remaining } => {
                    let limit = remaining.min(buf.remaining());
                    let read = {
                        let mut dst = ReadBuf::new(buf.initialize_unfilled_to(limit));
                        if let Err(e) = ready!(this.poll_inner(cx, &mut dst)) {
                            return this.fail(ChunkError::Transport(e.kind()));
                        }
                        dst.filled().len()
                    };
                    if read == 0 {
                        return this.fail(ChunkError::Truncated("chunk body"));
                    }
                    buf.advance(read);
                    this.state = ChunkState::Body {
                        remaining: remaining - read,
                    };
                    return Poll::Ready(Ok(()));
                }
            }
        }
    }
}

/// Append one chunk carrying `data` to `dst`.
///
/// # Errors
///
/// Returns an error if `data` is longer than a `u32` length prefix allows.
pub fn write_chunk(dst: &mut BytesMut, data: &[u8]) -> io::Result<()> {
    let len = u32::try_from(data.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "chunk exceeds u32 length"))?;
    dst.reserve(1 + 4 + data.len());
    dst.put_u8(CHUNK_START);
    dst.put_slice(&len.to_network());
    dst.put_slice(data);
    Ok(())
}

/// Append the end marker to `dst`.
pub fn write_end(dst: &mut BytesMut) { dst.put_u8(CHUNK_END); }

/// Append `content` split into chunks of at most `chunk_size` bytes, followed
/// by the end marker.
///
/// # Errors
///
/// Returns an error if `chunk_size` exceeds a `u32` length prefix.
pub fn write_chunked(
    dst: &mut BytesMut,
    content: &[u8],
    chunk_size: NonZeroUsize,
) -> io::Result<()> {
    for chunk in content.chunks(chunk_size.get()) {
        write_chunk(dst, chunk)?;
    }
    write_end(dst);
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tokio::io::AsyncReadExt;

    use super::*;

    fn framed(chunks: &[&[u8]], trailer: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for chunk in chunks {
            write_chunk(&mut buf, chunk).expect("write chunk");
        }
        write_end(&mut buf);
        buf.put_slice(trailer);
        buf.to_vec()
    }

    fn payload(len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| u8::try_from(i % 251).expect("value below 251"))
            .collect()
    }

    #[tokio::test]
    async fn split_chunks_match_single_chunk() {
        let content = payload(4096 + 4096 + 17);
        let split = framed(&[&content[..4096], &content[4096..8192], &content[8192..]], &[]);
        let single = framed(&[&content], &[]);

        let mut split_out = Vec::new();
        let mut input = split.as_slice();
        let mut reader = ChunkedReader::new(&mut input);
        reader
            .read_to_end(&mut split_out)
            .await
            .expect("read split chunks");
        assert_eq!(reader.chunks_read(), 3);

        let mut single_out = Vec::new();
        let mut input = single.as_slice();
        ChunkedReader::new(&mut input)
            .read_to_end(&mut single_out)
            .await
            .expect("read single chunk");

        assert_eq!(split_out, content);
        assert_eq!(single_out, content);
    }

    #[rstest]
    #[case::empty_sequence(&[])]
    #[case::zero_length_chunk(&[b"".as_slice()])]
    #[tokio::test]
    async fn empty_content_reads_nothing(#[case] chunks: &[&[u8]]) {
        let bytes = framed(chunks, &[]);
        let mut input = bytes.as_slice();
        let mut reader = ChunkedReader::new(&mut input);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.expect("read");
        assert!(out.is_empty());
        assert!(reader.is_finished());
    }

    #[tokio::test]
    async fn reads_past_end_marker_yield_eof() {
        let bytes = framed(&[b"abc"], b"tail");
        let mut input = bytes.as_slice();
        let mut reader = ChunkedReader::new(&mut input);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.expect("read");
        let mut extra = [0u8; 8];
        assert_eq!(reader.read(&mut extra).await.expect("read after end"), 0);
        drop(reader);
        assert_eq!(input, &b"tail"[..]);
    }

    #[tokio::test]
    async fn close_drains_unread_chunks() {
        let bytes = framed(&[b"first", b"second"], b"\x42");
        let mut input = bytes.as_slice();
        let mut reader = ChunkedReader::new(&mut input);
        let mut head = [0u8; 3];
        reader.read_exact(&mut head).await.expect("read head");

        let drained = reader.close().await.expect("close");
        assert_eq!(drained, 8);
        assert_eq!(input, &[0x42][..]);
    }

    #[tokio::test]
    async fn invalid_marker_is_reported_and_stream_released() {
        let mut bytes = BytesMut::new();
        write_chunk(&mut bytes, b"ok").expect("write chunk");
        bytes.put_u8(0x01);
        bytes.put_slice(b"rest");
        let mut input = &bytes[..];

        let mut reader = ChunkedReader::new(&mut input);
        let mut out = Vec::new();
        let err = reader
            .read_to_end(&mut out)
            .await
            .expect_err("invalid marker must fail");
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(reader.fault(), Some(&ChunkError::InvalidMarker(0x01)));
        assert_eq!(reader.close().await, Err(ChunkError::InvalidMarker(0x01)));

        let mut rest = Vec::new();
        input.read_to_end(&mut rest).await.expect("enclosing stream usable");
        assert_eq!(rest, b"rest");
    }

    #[tokio::test]
    async fn truncated_body_is_reported() {
        let mut bytes = BytesMut::new();
        bytes.put_u8(CHUNK_START);
        bytes.put_slice(&10u32.to_network());
        bytes.put_slice(b"short");
        let mut input = &bytes[..];

        let mut reader = ChunkedReader::new(&mut input);
        let mut out = Vec::new();
        let err = reader.read_to_end(&mut out).await.expect_err("truncated");
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(reader.fault(), Some(&ChunkError::Truncated("chunk body")));
    }

    #[test]
    fn write_chunked_splits_on_chunk_size() {
        let mut buf = BytesMut::new();
        let size = NonZeroUsize::new(4).expect("non-zero");
        write_chunked(&mut buf, b"abcdefghij", size).expect("write");
        // three chunk headers, ten payload bytes, one end marker
        assert_eq!(buf.len(), 3 * 5 + 10 + 1);
        assert_eq!(buf.last(), Some(&CHUNK_END));
    }

    #[test]
    fn unaddressable_length_is_invalid_data() {
        let err = io::Error::from(ChunkError::TooLong(u32::MAX));
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("4294967295"));
    }
}
