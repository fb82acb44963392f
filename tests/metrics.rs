#![cfg(feature = "metrics")]
//! Tests for `mgmtframe` metrics helpers.
//!
//! These tests verify that counters and gauges update as expected using
//! `metrics_util::debugging::DebuggingRecorder`.

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use mgmtframe::{
    client::request,
    dispatcher::Dispatcher,
    error::FailureKind,
    marshal::BincodeMarshaller,
    memory,
    metrics as mgmt_metrics,
    protocol::Command,
    registry::CommandRegistry,
};
use rstest::rstest;

/// Creates a debugging recorder and snapshotter for metrics testing.
fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

fn labelled_counter(snapshotter: &Snapshotter, name: &str, label: (&str, &str)) -> Option<u64> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .find_map(|(k, _, _, v)| {
            let hit = k.key().name() == name
                && k
                    .key()
                    .labels()
                    .any(|l| l.key() == label.0 && l.value() == label.1);
            match v {
                DebugValue::Counter(c) if hit => Some(c),
                _ => None,
            }
        })
}

#[rstest]
#[case(Command::GetDomain, "get_domain")]
#[case(Command::AddDeploymentContent, "add_deployment_content")]
fn request_metric_is_labelled_by_command(#[case] command: Command, #[case] label: &str) {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || mgmt_metrics::inc_requests(command));

    assert_eq!(
        labelled_counter(&snapshotter, mgmt_metrics::REQUESTS_TOTAL, ("command", label)),
        Some(1)
    );
}

#[test]
fn error_metric_is_labelled_by_kind() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        mgmt_metrics::inc_errors(FailureKind::ProtocolViolation);
        mgmt_metrics::inc_errors(FailureKind::ProtocolViolation);
        mgmt_metrics::inc_errors(FailureKind::Decode);
    });

    assert_eq!(
        labelled_counter(
            &snapshotter,
            mgmt_metrics::ERRORS_TOTAL,
            ("kind", "protocol_violation")
        ),
        Some(2)
    );
    assert_eq!(
        labelled_counter(&snapshotter, mgmt_metrics::ERRORS_TOTAL, ("kind", "decode")),
        Some(1)
    );
}

#[test]
fn connection_gauge_returns_to_zero() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    metrics::with_local_recorder(&recorder, || {
        mgmt_metrics::inc_connections();
        mgmt_metrics::inc_connections();
        mgmt_metrics::dec_connections();
        mgmt_metrics::dec_connections();
    });

    let metrics = snapshotter.snapshot().into_vec();
    assert!(
        metrics.iter().any(|(k, _, _, v)| {
            k.key().name() == mgmt_metrics::CONNECTIONS_ACTIVE
                && matches!(v, DebugValue::Gauge(g) if g.into_inner().abs() < f64::EPSILON)
        }),
        "gauge not recorded: {metrics:#?}"
    );
}

#[rstest]
#[case(1)]
#[case(2)]
fn inc_connection_panics_counts(#[case] expected: u64) {
    let (snapshotter, recorder) = debugging_recorder_setup();

    metrics::with_local_recorder(&recorder, || {
        (0..expected).for_each(|_| mgmt_metrics::inc_connection_panics());
    });

    let metrics = snapshotter.snapshot().into_vec();
    assert!(
        metrics.iter().any(|(key, _, _, value)| {
            key.key().name() == mgmt_metrics::CONNECTION_PANICS
                && matches!(value, DebugValue::Counter(c) if *c == expected)
        }),
        "expected {expected} panics, got {metrics:#?}"
    );
}

#[test]
fn dispatcher_counts_served_requests() {
    let (snapshotter, recorder) = debugging_recorder_setup();
    let dispatcher = Dispatcher::new(CommandRegistry::standard(), memory::collaborators([]));
    let frame = request::get_domain(&BincodeMarshaller);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("build runtime");

    metrics::with_local_recorder(&recorder, || {
        runtime.block_on(async {
            let mut input = &frame[1..];
            dispatcher
                .handle(&mut input, &mut Vec::<u8>::new())
                .await
                .expect("served");
        });
    });

    assert_eq!(
        labelled_counter(
            &snapshotter,
            mgmt_metrics::REQUESTS_TOTAL,
            ("command", "get_domain")
        ),
        Some(1)
    );
}
