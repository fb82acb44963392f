//! Outer framing shared by the server and the client.
//!
//! Each request and each response travels in its own frame: a 4-byte
//! big-endian length followed by that many bytes.

use tokio_util::codec::LengthDelimitedCodec;

/// Smallest accepted maximum frame length.
pub const MIN_FRAME_LENGTH: usize = 64;
/// Largest accepted maximum frame length (16 MiB).
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;
/// Maximum frame length used unless configured otherwise.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = MAX_FRAME_LENGTH;

/// Clamp `max_frame_length` to the supported range.
#[must_use]
pub fn clamp_frame_length(max_frame_length: usize) -> usize {
    max_frame_length.clamp(MIN_FRAME_LENGTH, MAX_FRAME_LENGTH)
}

/// Build the length-delimited codec for frames of at most `max_frame_length`
/// bytes.
#[must_use]
pub fn codec(max_frame_length: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(clamp_frame_length(max_frame_length))
        .new_codec()
}
