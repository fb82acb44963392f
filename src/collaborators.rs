//! Interfaces of the services management operations delegate to.
//!
//! The protocol layer owns none of the domain state. It calls a
//! [`DomainController`] for model updates, a [`DeploymentManager`] for plan
//! execution, and a [`DeploymentRepository`] for uploaded content. The
//! handles are captured once in a [`Collaborators`] snapshot when the
//! dispatcher is built and shared read-only by every connection.
//!
//! Collaborators report business rejections as values
//! ([`DomainUpdateResult::DomainFailure`], [`ServerUpdateOutcome::Cancelled`]
//! and so on). A [`CollaboratorError`] means the call itself broke.

use std::{error::Error, fmt, sync::Arc};

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;
use tokio::io::AsyncRead;

use crate::model::{
    DeploymentHash,
    DeploymentPlan,
    DeploymentPlanResult,
    DomainModel,
    DomainUpdate,
    DomainUpdateResult,
    ModelUpdateResult,
    ServerIdentity,
    ServerUpdate,
    ServerUpdateOutcome,
};

/// Unexpected failure inside a collaborator.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CollaboratorError {
    message: String,
    #[source]
    source: Option<Box<dyn Error + Send + Sync>>,
}

impl CollaboratorError {
    /// Create an error with `message` and no underlying cause.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error with `message` caused by `source`.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Human-readable description of the failure.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}

/// Result alias for collaborator calls.
pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Owner of the authoritative domain-wide configuration model.
///
/// Implementations serialise conflicting updates themselves; the protocol
/// layer calls them concurrently from many connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DomainController: Send + Sync {
    /// Current domain model.
    async fn domain_model(&self) -> CollaboratorResult<DomainModel>;

    /// Apply `update` to the domain model and push it to affected servers.
    async fn apply_update(&self, update: &DomainUpdate) -> CollaboratorResult<DomainUpdateResult>;

    /// Apply `update` to the domain model only, reporting the servers it
    /// affects.
    async fn apply_update_to_model(
        &self,
        update: &DomainUpdate,
    ) -> CollaboratorResult<ModelUpdateResult>;

    /// Apply `updates` to the server identified by `server`, returning one
    /// outcome per update in the same order.
    async fn apply_update_to_server(
        &self,
        updates: &[ServerUpdate],
        server: &ServerIdentity,
    ) -> CollaboratorResult<Vec<ServerUpdateOutcome>>;
}

/// Executor of deployment plans.
#[cfg_attr(test, mockall::automock)]
pub trait DeploymentManager: Send + Sync {
    /// Start executing `plan`, returning a handle that resolves once the plan
    /// has fully run or failed.
    fn execute(&self, plan: DeploymentPlan)
    -> BoxFuture<'static, CollaboratorResult<DeploymentPlanResult>>;
}

/// Store for uploaded deployment content.
#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    /// Read `content` to its end, store it under `name`/`runtime_name`, and
    /// return the hash identifying it.
    async fn add_deployment_content(
        &self,
        name: &str,
        runtime_name: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> CollaboratorResult<DeploymentHash>;
}

/// Collaborator handles captured when the dispatcher is built.
#[derive(Clone)]
pub struct Collaborators {
    domain_controller: Arc<dyn DomainController>,
    deployment_manager: Arc<dyn DeploymentManager>,
    deployment_repository: Arc<dyn DeploymentRepository>,
}

impl Collaborators {
    /// Bundle the three collaborator handles.
    pub fn new(
        domain_controller: Arc<dyn DomainController>,
        deployment_manager: Arc<dyn DeploymentManager>,
        deployment_repository: Arc<dyn DeploymentRepository>,
    ) -> Self {
        Self {
            domain_controller,
            deployment_manager,
            deployment_repository,
        }
    }

    /// The domain controller.
    #[must_use]
    pub fn domain_controller(&self) -> &dyn DomainController { self.domain_controller.as_ref() }

    /// The deployment manager.
    #[must_use]
    pub fn deployment_manager(&self) -> &dyn DeploymentManager { self.deployment_manager.as_ref() }

    /// The deployment content repository.
    #[must_use]
    pub fn deployment_repository(&self) -> &dyn DeploymentRepository {
        self.deployment_repository.as_ref()
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
