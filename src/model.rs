//! Values exchanged between the protocol layer and its collaborators.
//!
//! Update, plan and model payloads are opaque to the protocol: they are
//! carried as byte blobs and marshalled as whole objects. Only
//! [`ServerIdentity`] and the result shapes are interpreted here, because the
//! wire format spells them out field by field.

use std::fmt;

use bincode::{Decode, Encode};

/// Compound key addressing one managed server process.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerIdentity {
    host_name: String,
    server_group_name: String,
    server_name: String,
}

impl ServerIdentity {
    /// Create an identity from its three components.
    pub fn new(
        host_name: impl Into<String>,
        server_group_name: impl Into<String>,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            host_name: host_name.into(),
            server_group_name: server_group_name.into(),
            server_name: server_name.into(),
        }
    }

    /// Name of the host running the server.
    #[must_use]
    pub fn host_name(&self) -> &str { &self.host_name }

    /// Name of the server group the server belongs to.
    #[must_use]
    pub fn server_group_name(&self) -> &str { &self.server_group_name }

    /// Name of the server on its host.
    #[must_use]
    pub fn server_name(&self) -> &str { &self.server_name }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.host_name, self.server_group_name, self.server_name
        )
    }
}

/// An update to the domain-wide configuration model.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct DomainUpdate {
    /// Short name used in logs.
    pub name: String,
    /// Collaborator-defined update body.
    pub payload: Vec<u8>,
}

impl DomainUpdate {
    /// Create an update named `name` carrying `payload`.
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

/// An update applied to a single server's model.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ServerUpdate {
    /// Short name used in logs.
    pub name: String,
    /// Collaborator-defined update body.
    pub payload: Vec<u8>,
}

impl ServerUpdate {
    /// Create a server update named `name` carrying `payload`.
    pub fn new(name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            payload: payload.into(),
        }
    }
}

/// Snapshot of the domain model returned to clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct DomainModel {
    /// Collaborator-defined model body.
    pub payload: Vec<u8>,
}

/// Description of deployment actions to run across servers.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct DeploymentPlan {
    /// Plan identifier chosen by the client.
    pub id: String,
    /// Collaborator-defined plan body.
    pub payload: Vec<u8>,
}

/// Result of executing a [`DeploymentPlan`].
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct DeploymentPlanResult {
    /// Identifier of the executed plan.
    pub plan_id: String,
    /// Collaborator-defined result body.
    pub payload: Vec<u8>,
}

/// Value returned by a server after applying an update.
#[derive(Clone, Debug, Default, PartialEq, Eq, Encode, Decode)]
pub struct ServerUpdateReturn {
    /// Collaborator-defined return body.
    pub payload: Vec<u8>,
}

/// Business-level rejection of an update.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct UpdateFailure {
    /// Human-readable reason.
    pub message: String,
}

impl UpdateFailure {
    /// Create a failure with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for UpdateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.message) }
}

/// Identifier of uploaded deployment content.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DeploymentHash(Vec<u8>);

impl DeploymentHash {
    /// Wrap raw hash bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self { Self(bytes.into()) }

    /// Raw hash bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] { &self.0 }

    /// Number of hash bytes.
    #[must_use]
    pub fn len(&self) -> usize { self.0.len() }

    /// Returns true if the hash carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl fmt::Debug for DeploymentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeploymentHash(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        f.write_str(")")
    }
}

/// Per-host and per-server detail of a domain update that the domain model
/// accepted.
///
/// Each list keeps the order in which the collaborator reported its entries;
/// that order is the order they are written to the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DomainUpdateReport {
    /// Hosts that failed to apply the update.
    pub host_failures: Vec<(String, UpdateFailure)>,
    /// Servers that failed to apply the update.
    pub server_failures: Vec<(ServerIdentity, UpdateFailure)>,
    /// Values returned by servers that applied the update.
    pub server_results: Vec<(ServerIdentity, ServerUpdateReturn)>,
}

/// Outcome of applying a domain update across the domain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DomainUpdateResult {
    /// The domain model rejected the update.
    DomainFailure(UpdateFailure),
    /// The domain model accepted the update.
    Applied(DomainUpdateReport),
}

impl DomainUpdateResult {
    /// Returns true if the domain model rejected the update.
    #[must_use]
    pub fn is_domain_failure(&self) -> bool { matches!(self, Self::DomainFailure(_)) }
}

/// Outcome of applying a domain update to the model only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelUpdateResult {
    /// The domain model rejected the update.
    DomainFailure(UpdateFailure),
    /// The domain model accepted the update.
    Applied {
        /// Hosts that failed to apply the update.
        host_failures: Vec<(String, UpdateFailure)>,
        /// Servers affected by the update.
        servers: Vec<ServerIdentity>,
    },
}

/// Outcome of applying an update to a single server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerUpdateOutcome {
    /// The update was rejected.
    Failed(UpdateFailure),
    /// The update was cancelled before it completed.
    Cancelled,
    /// The server did not answer in time.
    TimedOut,
    /// The server applied the update.
    Success(ServerUpdateReturn),
}
