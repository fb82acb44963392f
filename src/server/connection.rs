//! Connection handling for [`ManagementServer`](super::ManagementServer).
//!
//! Each accepted connection runs in its own task. Request frames are served
//! one at a time, in order; a failed request is answered with an error frame
//! and then either dropped or the connection is closed, as the recovery hook
//! decides.

use std::{fmt, net::SocketAddr, sync::Arc};

use bytes::{Bytes, BytesMut};
use futures::{FutureExt, SinkExt, StreamExt};
use tokio::{
    net::{TcpStream, tcp::OwnedReadHalf},
    select,
};
use tokio_util::{
    codec::{FramedRead, FramedWrite, LengthDelimitedCodec},
    sync::CancellationToken,
    task::TaskTracker,
};
use tracing::{debug, warn};

use crate::{
    codec::{EncodeError, MAX_UTF_LENGTH, WireError, WireWriter},
    error::ManagementError,
    framing,
    handler::HandlerRegistry,
    marshal::BincodeMarshaller,
    protocol::RESPONSE_FAILED,
    recovery::{RecoveryPolicy, RecoveryPolicyHook},
};

/// Shared state handed to every connection task.
#[derive(Clone)]
pub(super) struct ConnectionContext {
    pub handlers: Arc<HandlerRegistry>,
    pub recovery: Arc<dyn RecoveryPolicyHook>,
    pub max_frame_length: usize,
    pub shutdown: CancellationToken,
}

impl fmt::Debug for ConnectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionContext")
            .field("handlers", &self.handlers)
            .field("max_frame_length", &self.max_frame_length)
            .finish_non_exhaustive()
    }
}

/// Spawn a task to serve a single TCP connection, logging and discarding any
/// panics.
pub(super) fn spawn_connection_task(
    stream: TcpStream,
    context: ConnectionContext,
    tracker: &TaskTracker,
) {
    let peer_addr = match stream.peer_addr() {
        Ok(addr) => Some(addr),
        Err(e) => {
            log::warn!("Failed to retrieve peer address: error={e}");
            None
        }
    };
    tracker.spawn(async move {
        crate::metrics::inc_connections();
        let fut = std::panic::AssertUnwindSafe(process_stream(stream, peer_addr, context))
            .catch_unwind();

        if let Err(panic) = fut.await {
            crate::metrics::inc_connection_panics();
            let panic_msg = crate::panic::format_panic(panic.as_ref());
            // Emit via both `log` and `tracing` for tests that capture either.
            log::error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr:?}");
            tracing::error!(panic = %panic_msg, ?peer_addr, "connection task panicked");
        }
        crate::metrics::dec_connections();
    });
}

async fn process_stream(
    stream: TcpStream,
    peer_addr: Option<SocketAddr>,
    context: ConnectionContext,
) {
    // The configured limit bounds requests only; responses may use the full
    // frame range.
    let (reader, writer) = stream.into_split();
    let mut requests = FramedRead::new(reader, framing::codec(context.max_frame_length));
    let mut responses = FramedWrite::new(writer, framing::codec(framing::MAX_FRAME_LENGTH));
    debug!(?peer_addr, "connection opened");

    while let Some(frame) = next_frame(&mut requests, &context.shutdown).await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, ?peer_addr, "unable to read request frame");
                break;
            }
        };

        let mut output = Vec::new();
        let served = context
            .handlers
            .handle_frame(&frame, &mut output)
            .await
            .and_then(|()| check_response_length(output));
        let (response, policy) = match served {
            Ok(response) => (response, RecoveryPolicy::Drop),
            Err(err) => {
                let policy = context.recovery.recovery_policy(&err);
                crate::metrics::inc_errors(err.kind());
                warn!(
                    error = %err,
                    kind = err.kind().as_str(),
                    ?policy,
                    ?peer_addr,
                    "management request failed"
                );
                match error_frame(&err) {
                    Ok(response) => (response, policy),
                    Err(e) => {
                        warn!(error = %e, ?peer_addr, "unable to encode error frame");
                        break;
                    }
                }
            }
        };

        if let Err(e) = responses.send(response).await {
            warn!(error = %e, ?peer_addr, "unable to send response frame");
            break;
        }
        if policy == RecoveryPolicy::Disconnect {
            debug!(?peer_addr, "closing connection after unrecoverable request");
            break;
        }
    }
    debug!(?peer_addr, "connection closed");
}

async fn next_frame(
    framed: &mut FramedRead<OwnedReadHalf, LengthDelimitedCodec>,
    shutdown: &CancellationToken,
) -> Option<std::io::Result<BytesMut>> {
    select! {
        biased;

        () = shutdown.cancelled() => None,
        frame = framed.next() => frame,
    }
}

fn check_response_length(output: Vec<u8>) -> Result<Bytes, ManagementError> {
    if output.len() > framing::MAX_FRAME_LENGTH {
        return Err(ManagementError::wire(
            "unable to send response",
            EncodeError::TooLarge {
                field: "response frame",
                len: output.len(),
                max: framing::MAX_FRAME_LENGTH,
            },
        ));
    }
    Ok(Bytes::from(output))
}

/// Encode `[RESPONSE_FAILED][message]` for `error`.
///
/// Messages longer than a string field allows are cut at a character
/// boundary.
fn error_frame(error: &ManagementError) -> Result<Bytes, WireError> {
    let message = error.to_string();
    let mut end = message.len().min(MAX_UTF_LENGTH);
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = WireWriter::start(&BincodeMarshaller);
    out.write_u8(RESPONSE_FAILED);
    out.write_utf(&message[..end])?;
    Ok(out.into_bytes().freeze())
}
