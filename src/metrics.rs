//! Metric helpers for `mgmtframe`.
//!
//! This module defines metric names and simple helper functions
//! wrapping the [`metrics`](https://docs.rs/metrics) crate. Without the
//! `metrics` feature the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};

use crate::{error::FailureKind, protocol::Command};

/// Name of the gauge tracking active connections.
pub const CONNECTIONS_ACTIVE: &str = "mgmtframe_connections_active";
/// Name of the counter tracking dispatched requests.
pub const REQUESTS_TOTAL: &str = "mgmtframe_requests_total";
/// Name of the counter tracking failed requests.
pub const ERRORS_TOTAL: &str = "mgmtframe_errors_total";
/// Name of the counter tracking panicking connection tasks.
pub const CONNECTION_PANICS: &str = "mgmtframe_connection_panics_total";

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a request dispatched to `command`.
pub fn inc_requests(command: Command) {
    #[cfg(feature = "metrics")]
    counter!(REQUESTS_TOTAL, "command" => command.name()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = command;
}

/// Record a failed request of the given kind.
pub fn inc_errors(kind: FailureKind) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record a connection task that panicked.
pub fn inc_connection_panics() {
    #[cfg(feature = "metrics")]
    counter!(CONNECTION_PANICS).increment(1);
}

/// Register descriptions for every metric with the installed recorder.
pub fn describe() {
    #[cfg(feature = "metrics")]
    {
        describe_gauge!(CONNECTIONS_ACTIVE, "Management connections currently open.");
        describe_counter!(REQUESTS_TOTAL, "Management requests dispatched by command.");
        describe_counter!(ERRORS_TOTAL, "Failed management requests by failure kind.");
        describe_counter!(CONNECTION_PANICS, "Connection tasks that panicked.");
    }
}
