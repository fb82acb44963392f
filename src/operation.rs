//! Per-request operation state machine.
//!
//! An [`Operation`] serves exactly one request. It is created for a resolved
//! [`Command`], reads that command's request body, performs the domain call
//! through the [`Collaborators`], and writes one response:
//!
//! ```text
//! Created --read_request--> RequestRead --send_response--> ResponseSent
//!    |                           |
//!    +----------> Failed <-------+
//! ```
//!
//! Reading never mutates the domain except for content uploads, whose bytes
//! are streamed straight into the repository. The domain call in
//! [`Operation::send_response`] completes before any response byte is
//! buffered.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::warn;

use crate::{
    codec::{WireReader, WireWriter},
    collaborators::{CollaboratorError, Collaborators},
    error::{ManagementError, Result},
    marshal::Marshaller,
    model::{DomainUpdateResult, UpdateFailure},
    protocol::Command,
};

mod request;
mod response;

use request::Request;
use response::Response;

/// Lifecycle of an [`Operation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationState {
    /// Nothing has been read yet.
    Created,
    /// The request body has been decoded.
    RequestRead,
    /// The response has been written.
    ResponseSent,
    /// A step failed; the operation is finished.
    Failed,
}

/// Single-use handler for one request.
pub struct Operation<'c, M> {
    command: Command,
    collaborators: &'c Collaborators,
    marshaller: &'c M,
    state: OperationState,
    request: Option<Request>,
}

impl<'c, M: Marshaller> Operation<'c, M> {
    /// Create an operation serving `command`.
    #[must_use]
    pub fn new(command: Command, collaborators: &'c Collaborators, marshaller: &'c M) -> Self {
        Self {
            command,
            collaborators,
            marshaller,
            state: OperationState::Created,
            request: None,
        }
    }

    /// Command served by this operation.
    #[must_use]
    pub fn command(&self) -> Command { self.command }

    /// Command byte this operation answers to.
    #[must_use]
    pub fn request_code(&self) -> u8 { self.command.request_code() }

    /// First byte of the response this operation writes.
    #[must_use]
    pub fn response_code(&self) -> u8 { self.command.response_code() }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> OperationState { self.state }

    fn require(&self, expected: OperationState, action: &'static str) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(ManagementError::InvalidState {
                command: self.command,
                action,
                state: self.state,
            })
        }
    }

    fn settle<T>(&mut self, result: Result<T>, next: OperationState) -> Result<T> {
        self.state = if result.is_ok() {
            next
        } else {
            OperationState::Failed
        };
        result
    }

    /// Decode the request body from `input`, which must be positioned just
    /// after the command byte.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::InvalidState`] unless the operation is
    /// freshly created, and [`ManagementError::Wire`] if a field is missing,
    /// malformed or announced by the wrong tag.
    pub async fn read_request<R>(&mut self, input: &mut R) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
    {
        self.require(OperationState::Created, "read request")?;
        let mut wire = WireReader::start(input, self.marshaller);
        let result = request::read(self.command, &mut wire, self.collaborators).await;
        wire.finish();
        let result = result.map(|request| self.request = Some(request));
        self.settle(result, OperationState::RequestRead)
    }

    /// Perform the domain operation and write the response to `output`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::InvalidState`] unless the request has been
    /// read, [`ManagementError::Execution`] if a collaborator fails, and
    /// [`ManagementError::Wire`] if the response cannot be encoded or written.
    pub async fn send_response<W>(&mut self, output: &mut W) -> Result<usize>
    where
        W: AsyncWrite + Send + Unpin + ?Sized,
    {
        self.require(OperationState::RequestRead, "send response")?;
        let Some(request) = self.request.take() else {
            return Err(ManagementError::InvalidState {
                command: self.command,
                action: "send response",
                state: self.state,
            });
        };
        let result = self.respond(request, output).await;
        self.settle(result, OperationState::ResponseSent)
    }

    async fn respond<W>(&self, request: Request, output: &mut W) -> Result<usize>
    where
        W: AsyncWrite + Send + Unpin + ?Sized,
    {
        let response = self.execute(request).await?;
        let mut wire = WireWriter::start(self.marshaller);
        wire.write_u8(self.response_code());
        response
            .encode(&mut wire)
            .map_err(|e| ManagementError::wire("unable to encode response", e))?;
        wire.finish(output)
            .await
            .map_err(|e| ManagementError::wire("unable to send response", e))
    }

    async fn execute(&self, request: Request) -> Result<Response> {
        let controller = self.collaborators.domain_controller();
        match request {
            Request::GetDomain => controller
                .domain_model()
                .await
                .map(Response::DomainModel)
                .map_err(|e| ManagementError::execution("unable to load domain model", e)),
            Request::ApplyUpdates(updates) => {
                let mut results = Vec::with_capacity(updates.len());
                for update in &updates {
                    let result = controller.apply_update(update).await.unwrap_or_else(|e| {
                        warn!(update = %update.name, error = %e, "domain update failed");
                        DomainUpdateResult::DomainFailure(UpdateFailure::new(e.message()))
                    });
                    results.push(result);
                }
                Ok(Response::ApplyUpdates(results))
            }
            Request::ApplyUpdate(update) => controller
                .apply_update_to_model(&update)
                .await
                .map(Response::ApplyUpdate)
                .map_err(|e| ManagementError::execution("unable to apply domain model update", e)),
            Request::ApplyServerUpdate { server, update } => {
                let outcomes = controller
                    .apply_update_to_server(std::slice::from_ref(&update), &server)
                    .await
                    .map_err(|e| {
                        ManagementError::execution("unable to apply server model update", e)
                    })?;
                let outcome = outcomes.into_iter().next().ok_or_else(|| {
                    ManagementError::execution(
                        "unable to apply server model update",
                        CollaboratorError::new(format!(
                            "no outcome reported by {server}"
                        )),
                    )
                })?;
                Ok(Response::ApplyServerUpdate(outcome))
            }
            Request::ExecuteDeploymentPlan(plan) => self
                .collaborators
                .deployment_manager()
                .execute(plan)
                .await
                .map(Response::DeploymentPlan)
                .map_err(|e| ManagementError::execution("unable to execute deployment plan", e)),
            Request::AddDeploymentContent(hash) => Ok(Response::DeploymentHash(hash)),
        }
    }

    /// Read the request from `input` then write the response to `output`.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by [`Operation::read_request`] or
    /// [`Operation::send_response`].
    pub async fn handle<R, W>(mut self, input: &mut R, output: &mut W) -> Result<usize>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
        W: AsyncWrite + Send + Unpin + ?Sized,
    {
        self.read_request(input).await?;
        self.send_response(output).await
    }
}
