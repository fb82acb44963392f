//! Tagged field codec for management requests and responses.
//!
//! Every field on the wire is announced by a one-byte tag. Readers check the
//! tag with [`WireReader::expect_header`] before reading the value; writers
//! emit the tag with [`WireWriter::write_u8`] before the value. Integers are
//! big-endian, strings carry a `u16` length prefix, and objects carry a `u32`
//! length prefix followed by bytes produced by a [`Marshaller`].
//!
//! # Sessions
//!
//! A read session starts with [`WireReader::start`] and ends with
//! [`WireReader::finish`]; a write session starts with [`WireWriter::start`]
//! and ends with [`WireWriter::finish`]. `finish` consumes the session, so it
//! can run at most once. A session abandoned on an error path is released
//! when it is dropped: readers only borrow the stream, and writers buffer the
//! whole message so nothing reaches the stream before `finish`.
//!
//! # Error Handling
//!
//! The codec layer provides a structured error taxonomy via [`WireError`].
//! See the [`error`] module for details.

use std::io;

use bincode::{Decode, Encode};
use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{
    byte_order::NetworkOrder,
    marshal::Marshaller,
};

pub mod error;

pub use error::{DecodeError, EncodeError, WireError};

/// Maximum length of an object or raw byte field (16 MiB).
pub const MAX_OBJECT_LENGTH: usize = 16 * 1024 * 1024;

/// Maximum encoded length of a string field.
pub const MAX_UTF_LENGTH: usize = u16::MAX as usize;

/// Read session over a borrowed input stream.
///
/// The reader is unbuffered: every byte it consumes is removed from the
/// underlying stream and nothing more, so the stream can be handed to other
/// readers (for example a [`ChunkedReader`](crate::chunk::ChunkedReader))
/// mid-session through [`WireReader::get_mut`].
pub struct WireReader<'a, R: ?Sized, M> {
    inner: &'a mut R,
    marshaller: &'a M,
    consumed: usize,
}

impl<'a, R, M> WireReader<'a, R, M>
where
    R: AsyncRead + Unpin + ?Sized,
    M: Marshaller,
{
    /// Begin a read session on `inner`.
    pub fn start(inner: &'a mut R, marshaller: &'a M) -> Self {
        Self {
            inner,
            marshaller,
            consumed: 0,
        }
    }

    async fn fill(&mut self, buf: &mut [u8], field: &'static str) -> Result<(), WireError> {
        match self.inner.read_exact(buf).await {
            Ok(_) => {
                self.consumed += buf.len();
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(DecodeError::UnexpectedEof { field }.into())
            }
            Err(e) => Err(WireError::Io(e)),
        }
    }

    /// Read a single byte.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedEof`] if the stream is exhausted.
    pub async fn read_u8(&mut self) -> Result<u8, WireError> {
        let mut byte = [0u8; 1];
        self.fill(&mut byte, "byte").await?;
        Ok(byte[0])
    }

    /// Read a big-endian `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedEof`] if fewer than four bytes remain.
    pub async fn read_u32(&mut self) -> Result<u32, WireError> {
        let mut bytes = [0u8; 4];
        self.fill(&mut bytes, "u32").await?;
        Ok(u32::from_network(bytes))
    }

    /// Read a `u16`-length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the string is truncated or not UTF-8.
    pub async fn read_utf(&mut self) -> Result<String, WireError> {
        let mut prefix = [0u8; 2];
        self.fill(&mut prefix, "string length").await?;
        let len = usize::from(u16::from_network(prefix));
        let mut bytes = vec![0u8; len];
        self.fill(&mut bytes, "string").await?;
        String::from_utf8(bytes).map_err(|e| DecodeError::InvalidUtf8(e).into())
    }

    /// Read exactly `len` raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::LengthExceeded`] if `len` is above
    /// [`MAX_OBJECT_LENGTH`] and [`DecodeError::UnexpectedEof`] if the stream
    /// ends early.
    pub async fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, WireError> {
        if len > MAX_OBJECT_LENGTH {
            return Err(DecodeError::LengthExceeded {
                field: "bytes",
                len,
                max: MAX_OBJECT_LENGTH,
            }
            .into());
        }
        let mut bytes = vec![0u8; len];
        self.fill(&mut bytes, "bytes").await?;
        Ok(bytes)
    }

    /// Read a `u32` that counts or sizes something in memory.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnexpectedEof`] if the prefix is truncated.
    pub async fn read_len(&mut self) -> Result<usize, WireError> {
        let len = self.read_u32().await?;
        usize::try_from(len).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "length prefix exceeds usize").into()
        })
    }

    /// Read a length-prefixed object and unmarshal it.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Object`] if the marshaller rejects the bytes.
    pub async fn read_object<T>(&mut self) -> Result<T, WireError>
    where
        T: Decode<()>,
    {
        let len = self.read_len().await?;
        if len > MAX_OBJECT_LENGTH {
            return Err(DecodeError::LengthExceeded {
                field: "object",
                len,
                max: MAX_OBJECT_LENGTH,
            }
            .into());
        }
        let bytes = self.read_bytes(len).await?;
        self.marshaller
            .unmarshal(&bytes)
            .map_err(|e| DecodeError::Object(e).into())
    }

    /// Read one byte and require it to equal `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::ProtocolViolation`] if a different byte is read.
    pub async fn expect_header(&mut self, tag: u8) -> Result<(), WireError> {
        let found = self.read_u8().await?;
        if found == tag {
            Ok(())
        } else {
            Err(WireError::ProtocolViolation {
                expected: tag,
                found,
            })
        }
    }

    /// Borrow the underlying stream, bypassing field decoding.
    pub fn get_mut(&mut self) -> &mut R { &mut *self.inner }

    /// End the session, returning the number of bytes it consumed.
    pub fn finish(self) -> usize { self.consumed }
}

/// Write session buffering a complete message.
///
/// Fields accumulate in memory; [`WireWriter::finish`] writes and flushes the
/// whole message in one go.
#[must_use = "a write session does nothing until finished"]
pub struct WireWriter<'a, M> {
    buf: BytesMut,
    marshaller: &'a M,
}

impl<'a, M: Marshaller> WireWriter<'a, M> {
    /// Begin a write session.
    pub fn start(marshaller: &'a M) -> Self {
        Self {
            buf: BytesMut::new(),
            marshaller,
        }
    }

    /// Append a single byte, typically a field tag.
    pub fn write_u8(&mut self, value: u8) { self.buf.put_u8(value); }

    /// Append a big-endian `u32`.
    pub fn write_u32(&mut self, value: u32) { self.buf.put_slice(&value.to_network()); }

    /// Append an in-memory count or size as a `u32`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::LengthOverflow`] if `len` exceeds `u32::MAX`.
    pub fn write_len(&mut self, len: usize) -> Result<(), WireError> {
        let value = u32::try_from(len).map_err(|_| EncodeError::LengthOverflow { len })?;
        self.write_u32(value);
        Ok(())
    }

    /// Append a `u16`-length-prefixed UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::StringTooLong`] if the string exceeds
    /// [`MAX_UTF_LENGTH`] bytes.
    pub fn write_utf(&mut self, value: &str) -> Result<(), WireError> {
        let len = u16::try_from(value.len()).map_err(|_| EncodeError::StringTooLong {
            len: value.len(),
            max: MAX_UTF_LENGTH,
        })?;
        self.buf.put_slice(&len.to_network());
        self.buf.put_slice(value.as_bytes());
        Ok(())
    }

    /// Append raw bytes without a length prefix.
    pub fn write_bytes(&mut self, bytes: &[u8]) { self.buf.put_slice(bytes); }

    /// Marshal `value` and append it with a `u32` length prefix.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::Object`] if marshalling fails and
    /// [`EncodeError::TooLarge`] if the marshalled object is longer than
    /// [`MAX_OBJECT_LENGTH`].
    pub fn write_object<T>(&mut self, value: &T) -> Result<(), WireError>
    where
        T: Encode,
    {
        let bytes = self.marshaller.marshal(value).map_err(EncodeError::Object)?;
        if bytes.len() > MAX_OBJECT_LENGTH {
            return Err(EncodeError::TooLarge {
                field: "object",
                len: bytes.len(),
                max: MAX_OBJECT_LENGTH,
            }
            .into());
        }
        self.write_len(bytes.len())?;
        self.buf.put_slice(&bytes);
        Ok(())
    }

    /// Bytes buffered so far.
    #[must_use]
    pub fn buffered(&self) -> &[u8] { &self.buf }

    /// Finish the session, returning the buffered message without writing it.
    #[must_use]
    pub fn into_bytes(self) -> BytesMut { self.buf }

    /// Write the buffered message to `out` and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::Io`] if writing or flushing fails.
    pub async fn finish<W>(self, out: &mut W) -> Result<usize, WireError>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        out.write_all(&self.buf).await?;
        out.flush().await?;
        Ok(self.buf.len())
    }
}
