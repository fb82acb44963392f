//! End-to-end tests driving a running management server over TCP.

use std::{
    net::{Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    num::NonZeroUsize,
    sync::Arc,
};

use bytes::BytesMut;
use mgmtframe::{
    client::{ClientError, ManagementClient, response},
    collaborators::Collaborators,
    dispatcher::Dispatcher,
    framing,
    memory::{InMemoryDeploymentManager, InMemoryDeploymentRepository, InMemoryDomainController},
    model::{
        DeploymentHash,
        DeploymentPlan,
        DomainUpdate,
        DomainUpdateResult,
        ModelUpdateResult,
        ServerIdentity,
        ServerUpdate,
        ServerUpdateOutcome,
    },
    protocol::{DOMAIN_CONTROLLER_CLIENT_REQUEST, REQUEST_OPERATION},
    registry::CommandRegistry,
    server::ManagementServer,
};
use rstest::{fixture, rstest};
use sha2::{Digest, Sha256};
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{Duration, timeout},
};

/// Collaborator handles kept by the test for inspection.
struct Backend {
    controller: Arc<InMemoryDomainController>,
    manager: Arc<InMemoryDeploymentManager>,
    repository: Arc<InMemoryDeploymentRepository>,
}

/// A server running on a background task until `stop` fires.
struct RunningServer {
    addr: SocketAddr,
    backend: Backend,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl RunningServer {
    async fn client(&self) -> ManagementClient {
        ManagementClient::connect(self.addr)
            .await
            .expect("connect to server")
    }

    async fn shutdown(self) {
        let _ = self.stop.send(());
        timeout(Duration::from_secs(1), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked");
    }
}

fn server_one() -> ServerIdentity { ServerIdentity::new("host-a", "main-group", "server-one") }

#[fixture]
async fn server() -> RunningServer { spawn_server(framing::DEFAULT_MAX_FRAME_LENGTH).await }

async fn spawn_server(max_frame_length: usize) -> RunningServer {
    let backend = Backend {
        controller: Arc::new(InMemoryDomainController::with_servers([server_one()])),
        manager: Arc::new(InMemoryDeploymentManager::default()),
        repository: Arc::new(InMemoryDeploymentRepository::default()),
    };
    let collaborators = Collaborators::new(
        backend.controller.clone(),
        backend.manager.clone(),
        backend.repository.clone(),
    );
    let listener = StdTcpListener::bind(SocketAddr::new(Ipv4Addr::LOCALHOST.into(), 0))
        .expect("bind free port");
    let (ready_tx, ready_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = ManagementServer::with_dispatcher(Dispatcher::new(
        CommandRegistry::standard(),
        collaborators,
    ))
    .expect("register dispatcher")
    .workers(2)
    .max_frame_length(max_frame_length)
    .ready_signal(ready_tx)
    .bind_existing_listener(listener)
    .expect("bind server");
    let addr = server.local_addr().expect("bound address");
    let handle = tokio::spawn(async move {
        server
            .run_with_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
            .expect("server run failed");
    });
    ready_rx.await.expect("server never became ready");
    RunningServer {
        addr,
        backend,
        stop: stop_tx,
        handle,
    }
}

fn raw_frame(bytes: &[u8]) -> BytesMut { BytesMut::from(bytes) }

#[rstest]
#[tokio::test]
async fn serves_every_command_on_one_connection(#[future] server: RunningServer) {
    let server = server.await;
    let mut client = server.client().await;

    let results = client
        .apply_updates(&[
            DomainUpdate::new("first", b"ab".to_vec()),
            DomainUpdate::new("rejected", Vec::new()),
            DomainUpdate::new("third", b"cd".to_vec()),
        ])
        .await
        .expect("apply updates");
    assert_eq!(results.len(), 3);
    assert!(!results[0].is_domain_failure());
    assert!(results[1].is_domain_failure());
    let DomainUpdateResult::Applied(report) = &results[2] else {
        panic!("third update was rejected: {results:?}");
    };
    assert_eq!(report.server_results.len(), 1);
    assert_eq!(report.server_results[0].0, server_one());
    assert_eq!(report.server_results[0].1.payload, b"third".to_vec());

    let model = client.get_domain().await.expect("get domain");
    assert_eq!(model.payload, b"abcd".to_vec());

    let outcome = client
        .apply_update(&DomainUpdate::new("fourth", b"ef".to_vec()))
        .await
        .expect("apply update");
    match outcome {
        ModelUpdateResult::Applied {
            host_failures,
            servers,
        } => {
            assert!(host_failures.is_empty());
            assert_eq!(servers, vec![server_one()]);
        }
        ModelUpdateResult::DomainFailure(failure) => panic!("update rejected: {failure}"),
    }

    let applied = client
        .apply_server_update(&server_one(), &ServerUpdate::new("restart", b"ok".to_vec()))
        .await
        .expect("apply server update");
    assert!(matches!(applied, ServerUpdateOutcome::Success(ref r) if r.payload == b"ok"));

    let stranger = ServerIdentity::new("host-z", "main-group", "server-nine");
    let failed = client
        .apply_server_update(&stranger, &ServerUpdate::new("restart", b"ok".to_vec()))
        .await
        .expect("apply server update to unknown server");
    assert!(matches!(failed, ServerUpdateOutcome::Failed(_)));

    let plan = DeploymentPlan {
        id: "plan-7".into(),
        payload: b"deploy".to_vec(),
    };
    let result = client
        .execute_deployment_plan(&plan)
        .await
        .expect("execute plan");
    assert_eq!(result.plan_id, "plan-7");

    assert_eq!(
        server.backend.controller.applied().len(),
        3,
        "only accepted updates are recorded"
    );
    assert_eq!(server.backend.manager.executed(), vec!["plan-7".to_owned()]);
    server.shutdown().await;
}

#[rstest]
#[case(1)]
#[case(7)]
#[case(4096)]
#[tokio::test]
async fn uploads_chunked_content(#[future] server: RunningServer, #[case] chunk_size: usize) {
    let server = server.await;
    let chunk_size = NonZeroUsize::new(chunk_size).expect("non-zero chunk size");
    let mut client = server.client().await.chunk_size(chunk_size);
    let content: Vec<u8> = (0..10_000u32)
        .map(|i| u8::try_from(i % 251).expect("value below 251"))
        .collect();

    let hash = client
        .add_deployment_content("app.war", "app-runtime.war", &content)
        .await
        .expect("upload content");

    assert_eq!(hash.len(), 32);
    assert_eq!(hash, DeploymentHash::new(Sha256::digest(&content).to_vec()));
    let stored = server
        .backend
        .repository
        .get(&hash)
        .expect("content stored under its hash");
    assert_eq!(stored.name, "app.war");
    assert_eq!(stored.runtime_name, "app-runtime.war");
    assert_eq!(stored.content, content);

    // The connection stays aligned after a multi-chunk upload.
    client.get_domain().await.expect("get domain after upload");
    server.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn unknown_command_is_answered_and_connection_survives(#[future] server: RunningServer) {
    let server = server.await;
    let mut client = server.client().await;

    let reply = client
        .call(raw_frame(&[DOMAIN_CONTROLLER_CLIENT_REQUEST, REQUEST_OPERATION, 0x7F]))
        .await
        .expect("error frame");
    let message = response::error_message(&reply)
        .await
        .expect("decode error frame");
    assert_eq!(message, "unknown command code 0x7f");

    client.get_domain().await.expect("connection still usable");
    server.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn unknown_handler_is_answered_and_connection_survives(#[future] server: RunningServer) {
    let server = server.await;
    let mut client = server.client().await;

    let reply = client
        .call(raw_frame(&[0x5A, REQUEST_OPERATION, 0x10]))
        .await
        .expect("error frame");
    let message = response::error_message(&reply)
        .await
        .expect("decode error frame");
    assert_eq!(message, "no handler registered for identifier 0x5a");

    client.get_domain().await.expect("connection still usable");
    server.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn bad_header_is_answered_then_disconnected(#[future] server: RunningServer) {
    let server = server.await;
    let mut client = server.client().await;

    let reply = client
        .call(raw_frame(&[DOMAIN_CONTROLLER_CLIENT_REQUEST, 0x00, 0x10]))
        .await
        .expect("error frame");
    let message = response::error_message(&reply)
        .await
        .expect("decode error frame");
    assert!(message.starts_with("unable to read request header"), "{message}");

    let after = client.get_domain().await;
    assert!(
        matches!(after, Err(ClientError::Disconnected | ClientError::Io(_))),
        "connection should be closed, got {after:?}"
    );

    // Other connections are unaffected.
    let mut other = server.client().await;
    other.get_domain().await.expect("fresh connection served");
    server.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn truncated_request_is_answered_and_connection_survives(#[future] server: RunningServer) {
    let server = server.await;
    let mut client = server.client().await;

    // APPLY_UPDATE_REQUEST with no update field.
    let reply = client
        .call(raw_frame(&[DOMAIN_CONTROLLER_CLIENT_REQUEST, REQUEST_OPERATION, 0x14]))
        .await
        .expect("error frame");
    let message = response::error_message(&reply)
        .await
        .expect("decode error frame");
    assert!(message.starts_with("apply_update failed"), "{message}");

    client.get_domain().await.expect("connection still usable");
    server.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn clients_are_served_concurrently(#[future] server: RunningServer) {
    let server = server.await;
    let mut first = server.client().await;
    let mut second = server.client().await;

    let (a, b) = tokio::join!(first.get_domain(), second.get_domain());
    a.expect("first client served");
    b.expect("second client served");
    server.shutdown().await;
}

#[tokio::test]
async fn responses_are_not_bound_by_the_request_frame_limit() {
    let server = spawn_server(framing::MIN_FRAME_LENGTH).await;
    let mut client = server.client().await;

    for i in 0..3u8 {
        let outcome = client
            .apply_update(&DomainUpdate::new("u", vec![i; 30]))
            .await
            .expect("apply update");
        assert!(matches!(outcome, ModelUpdateResult::Applied { .. }));
    }

    // The model now outgrows the request limit.
    let model = client.get_domain().await.expect("get domain");
    assert_eq!(model.payload.len(), 90);
    client.get_domain().await.expect("connection still usable");
    server.shutdown().await;
}

#[rstest]
#[tokio::test]
async fn trailing_request_bytes_are_rejected(#[future] server: RunningServer) {
    let server = server.await;
    let mut client = server.client().await;

    let reply = client
        .call(raw_frame(&[
            DOMAIN_CONTROLLER_CLIENT_REQUEST,
            REQUEST_OPERATION,
            0x10,
            0xFF,
            0xFF,
            0xFF,
        ]))
        .await
        .expect("error frame");
    let message = response::error_message(&reply)
        .await
        .expect("decode error frame");
    assert!(message.starts_with("get_domain failed"), "{message}");
    assert!(message.contains("unexpected bytes after request"), "{message}");

    client.get_domain().await.expect("connection still usable");
    server.shutdown().await;
}
