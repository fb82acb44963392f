//! Runtime control for [`ManagementServer`].

mod accept;
mod backoff;

use std::sync::Arc;

#[cfg(test)]
pub(super) use accept::MockAcceptListener;
pub(super) use accept::{AcceptLoopOptions, accept_loop};
pub use backoff::BackoffConfig;
use futures::Future;
use log::warn;
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::info;

use super::{Bound, ManagementServer, ServerError, connection::ConnectionContext};

impl ManagementServer<Bound> {
    /// Run the server until a shutdown signal is received.
    ///
    /// Spawns the configured number of worker tasks and awaits Ctrl+C for
    /// shutdown.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mgmtframe::{
    ///     dispatcher::Dispatcher,
    ///     memory,
    ///     registry::CommandRegistry,
    ///     server::ManagementServer,
    /// };
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let dispatcher = Dispatcher::new(CommandRegistry::standard(), memory::collaborators([]));
    /// let server =
    ///     ManagementServer::with_dispatcher(dispatcher)?.bind(([127, 0, 0, 1], 9999).into())?;
    /// server.run().await?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// Attempting to run a server without binding fails to compile:
    ///
    /// ```compile_fail
    /// use mgmtframe::{handler::HandlerRegistry, server::ManagementServer};
    ///
    /// async fn try_run() {
    ///     ManagementServer::new(HandlerRegistry::new())
    ///         .run()
    ///         .await
    ///         .expect("unbound servers do not expose run()");
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// Connections finish the request they are serving and then close.
    ///
    /// # Examples
    ///
    /// ```
    /// use mgmtframe::{handler::HandlerRegistry, server::ManagementServer};
    /// use tokio::sync::oneshot;
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), mgmtframe::server::ServerError> {
    /// let server = ManagementServer::new(HandlerRegistry::new())
    ///     .bind(([127, 0, 0, 1], 0).into())?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(async move {
    ///     server
    ///         .run_with_shutdown(async {
    ///             let _ = rx.await;
    ///         })
    ///         .await
    /// });
    ///
    /// let _ = tx.send(());
    /// handle
    ///     .await
    ///     .expect("join server task")
    ///     .expect("server run failed");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors.
    pub async fn run_with_shutdown<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let ManagementServer {
            handlers,
            workers,
            max_frame_length,
            backoff_config,
            recovery,
            ready_tx,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let connection = ConnectionContext {
            handlers,
            recovery,
            max_frame_length,
            shutdown: shutdown_token.clone(),
        };

        for _ in 0..workers {
            tracker.spawn(accept_loop(
                Arc::clone(&listener),
                AcceptLoopOptions {
                    connection: connection.clone(),
                    shutdown: shutdown_token.clone(),
                    tracker: tracker.clone(),
                    backoff: backoff_config,
                },
            ));
        }
        info!(
            workers,
            local_addr = ?listener.local_addr().ok(),
            "management server listening"
        );

        // Signal readiness after all workers have been spawned.
        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }

        tracker.close();
        tracker.wait().await;
        info!("management server stopped");
        Ok(())
    }
}
