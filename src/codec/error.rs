//! Error types for the wire codec.
//!
//! This module provides a structured error taxonomy that distinguishes
//! protocol violations (a field tag that does not match the expected one)
//! from decoding failures (truncated or unparsable values), encoding
//! failures, and I/O errors raised by the underlying stream.
//!
//! # Error Categories
//!
//! - [`WireError::ProtocolViolation`]: the stream is out of step with the protocol; the current
//!   request cannot continue.
//! - [`DecodeError`]: a field was announced correctly but its value is malformed or missing.
//! - [`EncodeError`]: a value cannot be represented on the wire.
//! - [`WireError::Io`]: the transport failed.

use std::{io, string::FromUtf8Error};

use thiserror::Error;

use crate::{chunk::ChunkError, marshal::MarshalError};

/// Failures decoding a single field value.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// The stream ended before the field was complete.
    #[error("stream ended while reading {field}")]
    UnexpectedEof {
        /// Name of the field being read.
        field: &'static str,
    },

    /// A string field did not contain valid UTF-8.
    #[error("string field is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] FromUtf8Error),

    /// A length prefix exceeds the permitted maximum.
    #[error("{field} length {len} exceeds limit {max}")]
    LengthExceeded {
        /// Name of the length-prefixed field.
        field: &'static str,
        /// Announced length.
        len: usize,
        /// Maximum permitted length.
        max: usize,
    },

    /// The marshaller rejected an object field.
    #[error("invalid object field: {0}")]
    Object(#[source] MarshalError),

    /// The chunked content sub-stream is malformed.
    #[error("invalid chunked content: {0}")]
    Chunk(#[source] ChunkError),

    /// Bytes remain in the request frame after its last field.
    #[error("unexpected bytes after the last field")]
    TrailingBytes,
}

/// Failures encoding a field value.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// A string is longer than a `u16` length prefix can express.
    #[error("string of {len} bytes exceeds the {max} byte limit")]
    StringTooLong {
        /// Encoded length of the string.
        len: usize,
        /// Maximum encodable length.
        max: usize,
    },

    /// An encoded field or message is longer than the protocol permits.
    #[error("{field} of {len} bytes exceeds limit {max}")]
    TooLarge {
        /// What was being encoded.
        field: &'static str,
        /// Encoded length.
        len: usize,
        /// Maximum permitted length.
        max: usize,
    },

    /// A count or length does not fit in a `u32`.
    #[error("length {len} does not fit in a u32 prefix")]
    LengthOverflow {
        /// The offending length.
        len: usize,
    },

    /// The marshaller failed to encode an object field.
    #[error("unable to marshal object: {0}")]
    Object(#[source] MarshalError),
}

/// Top-level codec error wrapping all categories plus I/O errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WireError {
    /// The next byte was not the tag the protocol requires at this point.
    #[error("protocol violation: expected tag {expected:#04x}, found {found:#04x}")]
    ProtocolViolation {
        /// Tag required by the protocol.
        expected: u8,
        /// Tag actually received.
        found: u8,
    },

    /// A field value could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A field value could not be encoded.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The underlying stream failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

impl WireError {
    /// Returns true if the error means the peer sent bytes out of protocol order.
    #[must_use]
    pub fn is_protocol_violation(&self) -> bool { matches!(self, Self::ProtocolViolation { .. }) }
}

impl From<ChunkError> for WireError {
    fn from(error: ChunkError) -> Self {
        match error {
            ChunkError::Transport(kind) => Self::Io(io::Error::from(kind)),
            other => Self::Decode(DecodeError::Chunk(other)),
        }
    }
}
