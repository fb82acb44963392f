//! Configuration utilities for [`ManagementServer`].

use std::sync::Arc;

use tokio::sync::oneshot;

use super::{BackoffConfig, ManagementServer, ServerState, Unbound};
use crate::{
    dispatcher::Dispatcher,
    framing,
    handler::HandlerRegistry,
    marshal::Marshaller,
    recovery::{DefaultRecoveryPolicy, RecoveryPolicyHook},
    registry::RegistryError,
};

pub mod binding;

#[cfg(test)]
mod tests;

impl ManagementServer<Unbound> {
    /// Create a server routing request frames through `handlers`.
    ///
    /// The worker count defaults to the number of available CPU cores (or 1
    /// if this cannot be determined). The TCP listener is unset; call
    /// [`bind`](Self::bind) before running the server.
    #[must_use]
    pub fn new(handlers: HandlerRegistry) -> Self {
        let workers = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self {
            handlers: Arc::new(handlers),
            workers,
            max_frame_length: framing::DEFAULT_MAX_FRAME_LENGTH,
            backoff_config: BackoffConfig::default(),
            recovery: Arc::new(DefaultRecoveryPolicy),
            ready_tx: None,
            state: Unbound,
        }
    }

    /// Create a server whose only handler is `dispatcher`.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] if the dispatcher cannot be registered.
    pub fn with_dispatcher<M>(dispatcher: Dispatcher<M>) -> Result<Self, RegistryError>
    where
        M: Marshaller,
    {
        HandlerRegistry::new()
            .register(Arc::new(dispatcher))
            .map(Self::new)
    }
}

impl<S: ServerState> ManagementServer<S> {
    /// Set the number of worker tasks to spawn for the server.
    #[must_use]
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = count.max(1);
        self
    }

    /// Set the largest request frame accepted, clamped to the supported range.
    #[must_use]
    pub fn max_frame_length(mut self, len: usize) -> Self {
        self.max_frame_length = framing::clamp_frame_length(len);
        self
    }

    /// Configure back-off timing for failed `accept()` calls.
    #[must_use]
    pub fn accept_backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff_config = config.normalized();
        self
    }

    /// Replace the hook deciding whether a failed request closes its
    /// connection.
    #[must_use]
    pub fn recovery_policy<H>(mut self, hook: H) -> Self
    where
        H: RecoveryPolicyHook + 'static,
    {
        self.recovery = Arc::new(hook);
        self
    }

    /// Configure a channel used to signal when the server is ready to accept
    /// connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Returns the configured number of worker tasks for the server.
    #[inline]
    #[must_use]
    pub const fn worker_count(&self) -> usize { self.workers }

    /// Returns the largest request frame the server accepts.
    #[inline]
    #[must_use]
    pub const fn frame_length_limit(&self) -> usize { self.max_frame_length }

    /// Returns the configured accept back-off.
    #[inline]
    #[must_use]
    pub const fn backoff(&self) -> BackoffConfig { self.backoff_config }

    /// Handlers serving request frames.
    #[must_use]
    pub fn handlers(&self) -> &HandlerRegistry { &self.handlers }
}
