//! Client side of the management protocol.
//!
//! [`request`] encodes request frames and [`response`] decodes response
//! frames; [`ManagementClient`] pairs them over a framed TCP connection. The
//! encoders and decoders are usable on their own, which is how the tests drive
//! the server with hand-made and malformed frames.

mod error;
pub mod request;
pub mod response;
mod runtime;

pub use error::ClientError;
pub use runtime::{ClientStream, DEFAULT_CHUNK_SIZE, ManagementClient};

#[cfg(test)]
mod tests;
