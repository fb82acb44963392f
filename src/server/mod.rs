//! Tokio-based TCP server for management handlers.
//!
//! `ManagementServer` spawns worker tasks that accept TCP connections and
//! serve length-prefixed request frames through a [`HandlerRegistry`].

use std::{fmt, sync::Arc};

use tokio::{net::TcpListener, sync::oneshot};

use crate::{handler::HandlerRegistry, recovery::RecoveryPolicyHook};

/// Tokio-based server for [`HandlerRegistry`] instances.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// (not yet bound to a TCP listener) or [`Bound`]. New servers start
/// `Unbound` and must call [`bind`](ManagementServer::bind) or
/// [`bind_existing_listener`](ManagementServer::bind_existing_listener)
/// before running. Every worker task accepts from the same listener; each
/// accepted connection is served by its own task.
pub struct ManagementServer<S = Unbound>
where
    S: ServerState,
{
    pub(crate) handlers: Arc<HandlerRegistry>,
    pub(crate) workers: usize,
    pub(crate) max_frame_length: usize,
    pub(crate) backoff_config: BackoffConfig,
    pub(crate) recovery: Arc<dyn RecoveryPolicyHook>,
    /// Single-use readiness notification, sent once all workers are spawned.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    /// Typestate tracking whether the server has been bound to a listener.
    pub(crate) state: S,
}

impl<S: ServerState + fmt::Debug> fmt::Debug for ManagementServer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementServer")
            .field("handlers", &self.handlers)
            .field("workers", &self.workers)
            .field("max_frame_length", &self.max_frame_length)
            .field("backoff_config", &self.backoff_config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod config;
pub use config::binding;
mod connection;
pub mod error;
mod runtime;

pub use error::ServerError;
/// Re-exported configuration types for server backoff behaviour.
pub use runtime::BackoffConfig;

#[cfg(test)]
pub(crate) mod test_util;
