//! Tests for server configuration utilities.
//!
//! This module exercises the `ManagementServer` builder: worker counts, frame
//! limits, back-off normalisation and listener binding.

use std::time::Duration;

use rstest::rstest;
use tokio::sync::oneshot;

use super::*;
use crate::{
    framing::{MAX_FRAME_LENGTH, MIN_FRAME_LENGTH},
    memory,
    recovery::RecoveryPolicy,
    registry::CommandRegistry,
    server::test_util::{bind_server, free_listener, handlers, listener_addr},
};

fn expected_default_worker_count() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

#[rstest]
fn test_new_server_defaults(handlers: HandlerRegistry) {
    let server = ManagementServer::new(handlers);
    assert_eq!(server.worker_count(), expected_default_worker_count());
    assert_eq!(server.frame_length_limit(), framing::DEFAULT_MAX_FRAME_LENGTH);
    assert_eq!(server.backoff(), BackoffConfig::default());
    assert!(server.local_addr().is_none());
    assert_eq!(server.handlers().len(), 2);
}

#[rstest]
fn test_workers_configuration(handlers: HandlerRegistry) {
    let server = ManagementServer::new(handlers).workers(4);
    assert_eq!(server.worker_count(), 4);
    assert_eq!(server.workers(0).worker_count(), 1);
}

#[rstest]
#[case(0, MIN_FRAME_LENGTH)]
#[case(4096, 4096)]
#[case(usize::MAX, MAX_FRAME_LENGTH)]
fn test_frame_length_is_clamped(
    handlers: HandlerRegistry,
    #[case] requested: usize,
    #[case] expected: usize,
) {
    let server = ManagementServer::new(handlers).max_frame_length(requested);
    assert_eq!(server.frame_length_limit(), expected);
}

#[rstest]
fn test_accept_backoff_is_normalised(handlers: HandlerRegistry) {
    let server = ManagementServer::new(handlers).accept_backoff(BackoffConfig {
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::ZERO,
    });
    assert_eq!(server.backoff().initial_delay, Duration::from_millis(1));
    assert_eq!(server.backoff().max_delay, Duration::from_millis(50));
}

struct KeepEverything;

impl RecoveryPolicyHook for KeepEverything {
    fn recovery_policy(&self, _error: &crate::error::ManagementError) -> RecoveryPolicy {
        RecoveryPolicy::Drop
    }
}

#[rstest]
fn test_recovery_hook_is_replaced(handlers: HandlerRegistry) {
    let server = ManagementServer::new(handlers).recovery_policy(KeepEverything);
    let error = crate::error::ManagementError::wire(
        "request header",
        crate::codec::WireError::ProtocolViolation {
            expected: 0x45,
            found: 0x00,
        },
    );
    assert_eq!(error.recovery_policy(), RecoveryPolicy::Disconnect);
    assert_eq!(server.recovery.recovery_policy(&error), RecoveryPolicy::Drop);
}

#[test]
fn test_with_dispatcher_registers_client_handler() {
    let dispatcher = Dispatcher::new(CommandRegistry::standard(), memory::collaborators([]));
    let server = ManagementServer::with_dispatcher(dispatcher).expect("register dispatcher");
    assert!(
        server
            .handlers()
            .get(crate::protocol::DOMAIN_CONTROLLER_CLIENT_REQUEST)
            .is_some()
    );
}

#[rstest]
#[tokio::test]
async fn test_bind_existing_listener(
    handlers: HandlerRegistry,
    free_listener: std::net::TcpListener,
) {
    let expected = listener_addr(&free_listener);
    let local_addr = bind_server(handlers, free_listener)
        .local_addr()
        .expect("local address missing");
    assert_eq!(local_addr, expected);
}

#[rstest]
#[tokio::test]
async fn test_rebind_keeps_configuration(
    handlers: HandlerRegistry,
    free_listener: std::net::TcpListener,
) {
    let (tx, _rx) = oneshot::channel();
    let server = ManagementServer::new(handlers)
        .workers(2)
        .max_frame_length(1024)
        .ready_signal(tx)
        .bind(([127, 0, 0, 1], 0).into())
        .expect("bind")
        .bind_existing_listener(free_listener)
        .expect("rebind");
    assert_eq!(server.worker_count(), 2);
    assert_eq!(server.frame_length_limit(), 1024);
    assert!(server.ready_tx.is_some());
    assert!(server.local_addr().is_some());
}
