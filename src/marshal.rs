//! Object marshalling for opaque payload fields.
//!
//! Object fields travel as a length-prefixed blob whose contents are produced
//! by a [`Marshaller`]. The protocol layer never inspects the blob; it only
//! asks the marshaller to turn a value into bytes and back. A basic
//! [`BincodeMarshaller`] implementation is provided as the default.

use bincode::{Decode, Encode, config};
use thiserror::Error;

/// Errors produced while marshalling or unmarshalling an object field.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MarshalError {
    /// The value could not be encoded.
    #[error("failed to encode object: {0}")]
    Encode(#[source] bincode::error::EncodeError),
    /// The bytes could not be decoded into the requested type.
    #[error("failed to decode object: {0}")]
    Decode(#[source] bincode::error::DecodeError),
    /// The object decoded successfully but did not span the whole field.
    #[error("object used {consumed} of {len} bytes")]
    TrailingBytes {
        /// Bytes consumed by the decoder.
        consumed: usize,
        /// Length of the object field.
        len: usize,
    },
}

/// Converts opaque objects to and from their on-wire bytes.
///
/// # Object Safety
///
/// This trait is not object-safe: its methods are generic over the value
/// type. Use concrete marshaller types in API bounds.
pub trait Marshaller: Send + Sync + 'static {
    /// Encode `value` into a byte vector.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::Encode`] if the value cannot be encoded.
    fn marshal<T>(&self, value: &T) -> Result<Vec<u8>, MarshalError>
    where
        T: Encode,
        Self: Sized;

    /// Decode a value occupying exactly `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`MarshalError::Decode`] if the bytes are malformed and
    /// [`MarshalError::TrailingBytes`] if the value ends before the field.
    fn unmarshal<T>(&self, bytes: &[u8]) -> Result<T, MarshalError>
    where
        T: Decode<()>,
        Self: Sized;
}

/// Marshaller using `bincode` with big-endian fixed-width integers.
#[derive(Clone, Copy, Debug, Default)]
pub struct BincodeMarshaller;

// Fixed-width big-endian integers keep object blobs consistent with the
// surrounding network-order fields.
fn wire_config() -> impl config::Config {
    config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

impl Marshaller for BincodeMarshaller {
    fn marshal<T>(&self, value: &T) -> Result<Vec<u8>, MarshalError>
    where
        T: Encode,
    {
        bincode::encode_to_vec(value, wire_config()).map_err(MarshalError::Encode)
    }

    fn unmarshal<T>(&self, bytes: &[u8]) -> Result<T, MarshalError>
    where
        T: Decode<()>,
    {
        let (value, consumed) =
            bincode::decode_from_slice(bytes, wire_config()).map_err(MarshalError::Decode)?;
        if consumed != bytes.len() {
            return Err(MarshalError::TrailingBytes {
                consumed,
                len: bytes.len(),
            });
        }
        Ok(value)
    }
}
