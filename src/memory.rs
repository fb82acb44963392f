//! In-memory collaborators.
//!
//! These back the `mgmtframe` binary and the test suites. State lives behind
//! `std::sync::Mutex`es that are never held across an `.await`.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use futures::{FutureExt, future::BoxFuture};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

use crate::{
    collaborators::{
        CollaboratorError,
        CollaboratorResult,
        Collaborators,
        DeploymentManager,
        DeploymentRepository,
        DomainController,
    },
    model::{
        DeploymentHash,
        DeploymentPlan,
        DeploymentPlanResult,
        DomainModel,
        DomainUpdate,
        DomainUpdateReport,
        DomainUpdateResult,
        ModelUpdateResult,
        ServerIdentity,
        ServerUpdate,
        ServerUpdateOutcome,
        ServerUpdateReturn,
        UpdateFailure,
    },
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Bundle fresh in-memory collaborators managing `servers`.
#[must_use]
pub fn collaborators(servers: impl IntoIterator<Item = ServerIdentity>) -> Collaborators {
    Collaborators::new(
        Arc::new(InMemoryDomainController::with_servers(servers)),
        Arc::new(InMemoryDeploymentManager::default()),
        Arc::new(InMemoryDeploymentRepository::default()),
    )
}

#[derive(Debug, Default)]
struct DomainState {
    model: DomainModel,
    servers: Vec<ServerIdentity>,
    applied: Vec<DomainUpdate>,
}

/// Domain controller keeping its model in memory.
///
/// Updates are appended to the model payload. An update with an empty payload
/// is rejected as a domain failure; server updates addressed to an unknown
/// server fail.
#[derive(Debug, Default)]
pub struct InMemoryDomainController {
    state: Mutex<DomainState>,
}

impl InMemoryDomainController {
    /// Create a controller managing `servers`.
    pub fn with_servers(servers: impl IntoIterator<Item = ServerIdentity>) -> Self {
        Self {
            state: Mutex::new(DomainState {
                servers: servers.into_iter().collect(),
                ..DomainState::default()
            }),
        }
    }

    /// Updates accepted so far, oldest first.
    #[must_use]
    pub fn applied(&self) -> Vec<DomainUpdate> { lock(&self.state).applied.clone() }

    fn accept(&self, update: &DomainUpdate) -> Result<Vec<ServerIdentity>, UpdateFailure> {
        if update.payload.is_empty() {
            return Err(UpdateFailure::new(format!(
                "update {} has an empty payload",
                update.name
            )));
        }
        let mut state = lock(&self.state);
        state.model.payload.extend_from_slice(&update.payload);
        state.applied.push(update.clone());
        Ok(state.servers.clone())
    }
}

#[async_trait]
impl DomainController for InMemoryDomainController {
    async fn domain_model(&self) -> CollaboratorResult<DomainModel> {
        Ok(lock(&self.state).model.clone())
    }

    async fn apply_update(&self, update: &DomainUpdate) -> CollaboratorResult<DomainUpdateResult> {
        Ok(match self.accept(update) {
            Err(failure) => DomainUpdateResult::DomainFailure(failure),
            Ok(servers) => DomainUpdateResult::Applied(DomainUpdateReport {
                server_results: servers
                    .into_iter()
                    .map(|server| {
                        let value = ServerUpdateReturn {
                            payload: update.name.as_bytes().to_vec(),
                        };
                        (server, value)
                    })
                    .collect(),
                ..DomainUpdateReport::default()
            }),
        })
    }

    async fn apply_update_to_model(
        &self,
        update: &DomainUpdate,
    ) -> CollaboratorResult<ModelUpdateResult> {
        Ok(match self.accept(update) {
            Err(failure) => ModelUpdateResult::DomainFailure(failure),
            Ok(servers) => ModelUpdateResult::Applied {
                host_failures: Vec::new(),
                servers,
            },
        })
    }

    async fn apply_update_to_server(
        &self,
        updates: &[ServerUpdate],
        server: &ServerIdentity,
    ) -> CollaboratorResult<Vec<ServerUpdateOutcome>> {
        let known = lock(&self.state).servers.contains(server);
        Ok(updates
            .iter()
            .map(|update| {
                if known {
                    ServerUpdateOutcome::Success(ServerUpdateReturn {
                        payload: update.payload.clone(),
                    })
                } else {
                    ServerUpdateOutcome::Failed(UpdateFailure::new(format!(
                        "unknown server {server}"
                    )))
                }
            })
            .collect())
    }
}

/// Deployment manager that completes every plan immediately.
#[derive(Debug, Default)]
pub struct InMemoryDeploymentManager {
    executed: Mutex<Vec<String>>,
}

impl InMemoryDeploymentManager {
    /// Identifiers of executed plans, oldest first.
    #[must_use]
    pub fn executed(&self) -> Vec<String> { lock(&self.executed).clone() }
}

impl DeploymentManager for InMemoryDeploymentManager {
    fn execute(
        &self,
        plan: DeploymentPlan,
    ) -> BoxFuture<'static, CollaboratorResult<DeploymentPlanResult>> {
        lock(&self.executed).push(plan.id.clone());
        async move {
            Ok(DeploymentPlanResult {
                plan_id: plan.id,
                payload: plan.payload,
            })
        }
        .boxed()
    }
}

/// Content stored under a [`DeploymentHash`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredDeployment {
    /// Deployment name.
    pub name: String,
    /// Runtime name.
    pub runtime_name: String,
    /// Uploaded bytes.
    pub content: Vec<u8>,
}

/// Content repository keyed by the SHA-256 of the content.
#[derive(Debug, Default)]
pub struct InMemoryDeploymentRepository {
    entries: Mutex<HashMap<DeploymentHash, StoredDeployment>>,
}

impl InMemoryDeploymentRepository {
    /// Content stored under `hash`.
    #[must_use]
    pub fn get(&self, hash: &DeploymentHash) -> Option<StoredDeployment> {
        lock(&self.entries).get(hash).cloned()
    }

    /// Number of stored deployments.
    #[must_use]
    pub fn len(&self) -> usize { lock(&self.entries).len() }

    /// Returns true if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool { lock(&self.entries).is_empty() }
}

#[async_trait]
impl DeploymentRepository for InMemoryDeploymentRepository {
    async fn add_deployment_content(
        &self,
        name: &str,
        runtime_name: &str,
        content: &mut (dyn AsyncRead + Send + Unpin),
    ) -> CollaboratorResult<DeploymentHash> {
        let mut hasher = Sha256::new();
        let mut stored = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let read = content.read(&mut buf).await.map_err(|e| {
                CollaboratorError::with_source("unable to read deployment content", e)
            })?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
            stored.extend_from_slice(&buf[..read]);
        }
        let hash = DeploymentHash::new(hasher.finalize().to_vec());
        debug!(deployment = name, bytes = stored.len(), hash = ?hash, "stored deployment content");
        lock(&self.entries).insert(
            hash.clone(),
            StoredDeployment {
                name: name.to_owned(),
                runtime_name: runtime_name.to_owned(),
                content: stored,
            },
        );
        Ok(hash)
    }
}
