//! Protocol constants for the domain-controller client protocol.
//!
//! Requests have the shape
//!
//! ```text
//! [REQUEST_OPERATION][command code][field tag][field value]...
//! ```
//!
//! and responses the shape
//!
//! ```text
//! [response code][field tag][field value]...
//! ```
//!
//! Both ends know every code ahead of time; nothing is negotiated.

use std::fmt;

/// Identifier routing a frame to the domain-controller client handler.
pub const DOMAIN_CONTROLLER_CLIENT_REQUEST: u8 = 0x0A;

/// Header opening every domain-controller client request.
pub const REQUEST_OPERATION: u8 = 0x45;

/// Response code of the error frame written when a request fails.
pub const RESPONSE_FAILED: u8 = 0xEE;

/// Request code asking for the current domain model.
pub const GET_DOMAIN_REQUEST: u8 = 0x10;
/// Response code carrying the domain model.
pub const GET_DOMAIN_RESPONSE: u8 = 0x11;
/// Request code applying a batch of domain updates.
pub const APPLY_UPDATES_REQUEST: u8 = 0x12;
/// Response code carrying one result per update of a batch.
pub const APPLY_UPDATES_RESPONSE: u8 = 0x13;
/// Request code applying one update to the domain model.
pub const APPLY_UPDATE_REQUEST: u8 = 0x14;
/// Response code carrying the model update result.
pub const APPLY_UPDATE_RESPONSE: u8 = 0x15;
/// Request code executing a deployment plan.
pub const EXECUTE_DEPLOYMENT_PLAN_REQUEST: u8 = 0x16;
/// Response code carrying the deployment plan result.
pub const EXECUTE_DEPLOYMENT_PLAN_RESPONSE: u8 = 0x17;
/// Request code uploading deployment content.
pub const ADD_DEPLOYMENT_CONTENT_REQUEST: u8 = 0x18;
/// Response code carrying the content hash.
pub const ADD_DEPLOYMENT_CONTENT_RESPONSE: u8 = 0x19;
/// Request code applying an update to one server.
pub const APPLY_SERVER_MODEL_UPDATE_REQUEST: u8 = 0x1A;
/// Response code carrying the server update outcome.
pub const APPLY_SERVER_MODEL_UPDATE_RESPONSE: u8 = 0x1B;

/// Field tags.
pub mod param {
    /// Domain model object.
    pub const DOMAIN_MODEL: u8 = 0x20;
    /// Domain update object.
    pub const DOMAIN_MODEL_UPDATE: u8 = 0x21;
    /// Number of updates in a batch request, or of results in its response.
    pub const APPLY_UPDATES_RESULT_COUNT: u8 = 0x22;
    /// Start of one update result.
    pub const APPLY_UPDATE_RESULT: u8 = 0x23;
    /// Failure object.
    pub const APPLY_UPDATE_RESULT_EXCEPTION: u8 = 0x24;
    /// Marker of an update the domain model accepted.
    pub const APPLY_UPDATE_RESULT_DOMAIN_MODEL_SUCCESS: u8 = 0x25;
    /// Number of per-host failures.
    pub const APPLY_UPDATE_RESULT_HOST_FAILURE_COUNT: u8 = 0x26;
    /// Number of per-server failures.
    pub const APPLY_UPDATE_RESULT_SERVER_FAILURE_COUNT: u8 = 0x27;
    /// Number of per-server results.
    pub const APPLY_UPDATE_RESULT_SERVER_RESULT_COUNT: u8 = 0x28;
    /// Number of affected servers.
    pub const APPLY_UPDATE_RESULT_SERVER_COUNT: u8 = 0x29;
    /// Host name string.
    pub const HOST_NAME: u8 = 0x2A;
    /// Server group name string.
    pub const SERVER_GROUP_NAME: u8 = 0x2B;
    /// Server name string.
    pub const SERVER_NAME: u8 = 0x2C;
    /// Server update object.
    pub const SERVER_MODEL_UPDATE: u8 = 0x2D;
    /// Server update return object.
    pub const APPLY_SERVER_MODEL_UPDATE_RESULT_RETURN: u8 = 0x2E;
    /// Marker of a cancelled server update.
    pub const APPLY_SERVER_MODEL_UPDATE_CANCELLED: u8 = 0x2F;
    /// Marker of a timed-out server update.
    pub const APPLY_SERVER_MODEL_UPDATE_TIMED_OUT: u8 = 0x30;
    /// Deployment plan object.
    pub const DEPLOYMENT_PLAN: u8 = 0x31;
    /// Deployment plan result object.
    pub const DEPLOYMENT_PLAN_RESULT: u8 = 0x32;
    /// Deployment name string.
    pub const DEPLOYMENT_NAME: u8 = 0x33;
    /// Deployment runtime name string.
    pub const DEPLOYMENT_RUNTIME_NAME: u8 = 0x34;
    /// Start of the chunked deployment content.
    pub const DEPLOYMENT_CONTENT: u8 = 0x35;
    /// Length of the deployment hash.
    pub const DEPLOYMENT_HASH_LENGTH: u8 = 0x36;
    /// Deployment hash bytes.
    pub const DEPLOYMENT_HASH: u8 = 0x37;
}

/// Commands understood by the domain-controller client handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// Return the current domain model.
    GetDomain,
    /// Apply a batch of domain updates independently.
    ApplyUpdates,
    /// Apply one update to the domain model.
    ApplyUpdate,
    /// Apply one update to a single server.
    ApplyServerUpdate,
    /// Execute a deployment plan and wait for its result.
    ExecuteDeploymentPlan,
    /// Upload deployment content.
    AddDeploymentContent,
}

impl Command {
    /// Every command, in request-code order.
    pub const ALL: [Command; 6] = [
        Command::GetDomain,
        Command::ApplyUpdates,
        Command::ApplyUpdate,
        Command::ExecuteDeploymentPlan,
        Command::AddDeploymentContent,
        Command::ApplyServerUpdate,
    ];

    /// Command byte this command answers to.
    #[must_use]
    pub const fn request_code(self) -> u8 {
        match self {
            Command::GetDomain => GET_DOMAIN_REQUEST,
            Command::ApplyUpdates => APPLY_UPDATES_REQUEST,
            Command::ApplyUpdate => APPLY_UPDATE_REQUEST,
            Command::ApplyServerUpdate => APPLY_SERVER_MODEL_UPDATE_REQUEST,
            Command::ExecuteDeploymentPlan => EXECUTE_DEPLOYMENT_PLAN_REQUEST,
            Command::AddDeploymentContent => ADD_DEPLOYMENT_CONTENT_REQUEST,
        }
    }

    /// Code written as the first byte of every response to this command.
    #[must_use]
    pub const fn response_code(self) -> u8 {
        match self {
            Command::GetDomain => GET_DOMAIN_RESPONSE,
            Command::ApplyUpdates => APPLY_UPDATES_RESPONSE,
            Command::ApplyUpdate => APPLY_UPDATE_RESPONSE,
            Command::ApplyServerUpdate => APPLY_SERVER_MODEL_UPDATE_RESPONSE,
            Command::ExecuteDeploymentPlan => EXECUTE_DEPLOYMENT_PLAN_RESPONSE,
            Command::AddDeploymentContent => ADD_DEPLOYMENT_CONTENT_RESPONSE,
        }
    }

    /// Stable name used in logs and metric labels.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Command::GetDomain => "get_domain",
            Command::ApplyUpdates => "apply_updates",
            Command::ApplyUpdate => "apply_update",
            Command::ApplyServerUpdate => "apply_server_update",
            Command::ExecuteDeploymentPlan => "execute_deployment_plan",
            Command::AddDeploymentContent => "add_deployment_content",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn codes_are_distinct() {
        let mut seen = HashSet::new();
        for command in Command::ALL {
            assert!(seen.insert(command.request_code()), "{command} request code reused");
            assert!(seen.insert(command.response_code()), "{command} response code reused");
        }
        assert!(!seen.contains(&REQUEST_OPERATION));
        assert!(!seen.contains(&RESPONSE_FAILED));
    }
}
