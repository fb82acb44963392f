//! Error types for management client operations.

use std::io;

use crate::codec::WireError;

/// Errors emitted by [`crate::client::ManagementClient`] and the response
/// decoders.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ClientError {
    /// Transport or framing error.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
    /// A request could not be encoded or a response could not be decoded.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// The server answered with an error frame.
    #[error("request rejected by server: {0}")]
    Rejected(String),
    /// The response code does not belong to the request.
    #[error("unexpected response code {found:#04x}, expected {expected:#04x}")]
    UnexpectedResponse {
        /// Response code of the request sent.
        expected: u8,
        /// Response code received.
        found: u8,
    },
    /// The response frame carried bytes after its last field.
    #[error("{0} unexpected bytes after the response")]
    TrailingBytes(usize),
    /// The peer closed the connection before a response arrived.
    #[error("connection closed by peer")]
    Disconnected,
}
