//! Test helpers shared across server modules.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
};

use async_trait::async_trait;
use rstest::fixture;
use tokio::io::{AsyncRead, AsyncWrite};

use super::{Bound, ManagementServer};
use crate::{
    dispatcher::Dispatcher,
    error::Result,
    handler::{HandlerRegistry, ManagementOperationHandler},
    memory,
    model::ServerIdentity,
    registry::CommandRegistry,
};

/// Identifier answered by [`PanickingHandler`].
pub const PANIC_HANDLER: u8 = 0x0F;

/// Handler that panics on every request.
pub struct PanickingHandler;

#[async_trait]
impl ManagementOperationHandler for PanickingHandler {
    fn identifier(&self) -> u8 { PANIC_HANDLER }

    async fn handle(
        &self,
        _input: &mut (dyn AsyncRead + Send + Unpin),
        _output: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<()> {
        panic!("boom")
    }
}

#[fixture]
pub fn handlers() -> HandlerRegistry {
    let dispatcher = Dispatcher::new(
        CommandRegistry::standard(),
        memory::collaborators([ServerIdentity::new("host-a", "main-group", "server-one")]),
    );
    HandlerRegistry::new()
        .register(Arc::new(dispatcher))
        .and_then(|registry| registry.register(Arc::new(PanickingHandler)))
        .expect("register test handlers")
}

#[fixture]
/// Returns a bound [`StdTcpListener`] on a free port for use in tests.
///
/// Keeping the listener bound prevents race conditions where another
/// process could claim the port between discovery and use.
pub fn free_listener() -> StdTcpListener {
    let addr = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0);
    StdTcpListener::bind(addr).expect("Failed to bind free port listener")
}

/// Extract the bound address from a listener.
#[must_use]
pub fn listener_addr(listener: &StdTcpListener) -> SocketAddr {
    listener
        .local_addr()
        .expect("failed to get listener address")
}

pub fn bind_server(handlers: HandlerRegistry, listener: StdTcpListener) -> ManagementServer<Bound> {
    ManagementServer::new(handlers)
        .bind_existing_listener(listener)
        .expect("Failed to bind")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_addr_matches_local_addr() {
        let listener = free_listener();
        assert_eq!(
            listener_addr(&listener),
            listener.local_addr().expect("failed to get address")
        );
        assert_eq!(listener_addr(&listener).ip(), std::net::IpAddr::from(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn test_handlers_are_registered() {
        let registry = handlers();
        assert_eq!(registry.len(), 2);
        assert!(registry.get(PANIC_HANDLER).is_some());
    }
}
