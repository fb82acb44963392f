//! Request bodies and their decoders.

use tokio::io::AsyncRead;
use tracing::info;

use crate::{
    chunk::ChunkedReader,
    codec::WireReader,
    collaborators::Collaborators,
    error::{ManagementError, Result},
    marshal::Marshaller,
    model::{DeploymentHash, DeploymentPlan, DomainUpdate, ServerIdentity, ServerUpdate},
    protocol::{Command, param},
};

/// Decoded body of one request.
#[derive(Debug)]
pub(super) enum Request {
    GetDomain,
    ApplyUpdates(Vec<DomainUpdate>),
    ApplyUpdate(DomainUpdate),
    ApplyServerUpdate {
        server: ServerIdentity,
        update: ServerUpdate,
    },
    ExecuteDeploymentPlan(DeploymentPlan),
    /// Content is stored while the request is read; only the hash remains.
    AddDeploymentContent(DeploymentHash),
}

/// Read the body of a `command` request from `wire`.
pub(super) async fn read<R, M>(
    command: Command,
    wire: &mut WireReader<'_, R, M>,
    collaborators: &Collaborators,
) -> Result<Request>
where
    R: AsyncRead + Send + Unpin + ?Sized,
    M: Marshaller,
{
    match command {
        Command::GetDomain => Ok(Request::GetDomain),
        Command::ApplyUpdates => read_updates(wire).await,
        Command::ApplyUpdate => {
            let update = read_update(wire).await?;
            info!(update = %update.name, "received domain model update");
            Ok(Request::ApplyUpdate(update))
        }
        Command::ApplyServerUpdate => read_server_update(wire).await,
        Command::ExecuteDeploymentPlan => {
            let plan = tagged(wire, param::DEPLOYMENT_PLAN, "unable to read deployment plan")
                .await?;
            Ok(Request::ExecuteDeploymentPlan(plan))
        }
        Command::AddDeploymentContent => read_content(wire, collaborators).await,
    }
}

async fn tagged<T, R, M>(
    wire: &mut WireReader<'_, R, M>,
    tag: u8,
    context: &'static str,
) -> Result<T>
where
    T: bincode::Decode<()>,
    R: AsyncRead + Unpin + ?Sized,
    M: Marshaller,
{
    wire.expect_header(tag)
        .await
        .map_err(|e| ManagementError::wire(context, e))?;
    wire.read_object()
        .await
        .map_err(|e| ManagementError::wire(context, e))
}

async fn tagged_utf<R, M>(
    wire: &mut WireReader<'_, R, M>,
    tag: u8,
    context: &'static str,
) -> Result<String>
where
    R: AsyncRead + Unpin + ?Sized,
    M: Marshaller,
{
    wire.expect_header(tag)
        .await
        .map_err(|e| ManagementError::wire(context, e))?;
    wire.read_utf()
        .await
        .map_err(|e| ManagementError::wire(context, e))
}

async fn read_update<R, M>(wire: &mut WireReader<'_, R, M>) -> Result<DomainUpdate>
where
    R: AsyncRead + Unpin + ?Sized,
    M: Marshaller,
{
    tagged(
        wire,
        param::DOMAIN_MODEL_UPDATE,
        "unable to read domain model update",
    )
    .await
}

async fn read_updates<R, M>(wire: &mut WireReader<'_, R, M>) -> Result<Request>
where
    R: AsyncRead + Unpin + ?Sized,
    M: Marshaller,
{
    const CONTEXT: &str = "unable to read domain model updates";
    wire.expect_header(param::APPLY_UPDATES_RESULT_COUNT)
        .await
        .map_err(|e| ManagementError::wire(CONTEXT, e))?;
    let count = wire
        .read_len()
        .await
        .map_err(|e| ManagementError::wire(CONTEXT, e))?;
    // The count is untrusted; let the vector grow with the updates actually read.
    let mut updates = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        updates.push(read_update(wire).await?);
    }
    info!(
        count = updates.len(),
        updates = ?updates.iter().map(|u| u.name.as_str()).collect::<Vec<_>>(),
        "received domain model updates"
    );
    Ok(Request::ApplyUpdates(updates))
}

async fn read_server_update<R, M>(wire: &mut WireReader<'_, R, M>) -> Result<Request>
where
    R: AsyncRead + Unpin + ?Sized,
    M: Marshaller,
{
    const CONTEXT: &str = "unable to read server model update";
    let host = tagged_utf(wire, param::HOST_NAME, CONTEXT).await?;
    let group = tagged_utf(wire, param::SERVER_GROUP_NAME, CONTEXT).await?;
    let name = tagged_utf(wire, param::SERVER_NAME, CONTEXT).await?;
    let server = ServerIdentity::new(host, group, name);
    let update: ServerUpdate = tagged(wire, param::SERVER_MODEL_UPDATE, CONTEXT).await?;
    info!(%server, update = %update.name, "received server model update");
    Ok(Request::ApplyServerUpdate { server, update })
}

async fn read_content<R, M>(
    wire: &mut WireReader<'_, R, M>,
    collaborators: &Collaborators,
) -> Result<Request>
where
    R: AsyncRead + Send + Unpin + ?Sized,
    M: Marshaller,
{
    const CONTEXT: &str = "unable to read deployment content";
    let name = tagged_utf(wire, param::DEPLOYMENT_NAME, CONTEXT).await?;
    let runtime_name = tagged_utf(wire, param::DEPLOYMENT_RUNTIME_NAME, CONTEXT).await?;
    wire.expect_header(param::DEPLOYMENT_CONTENT)
        .await
        .map_err(|e| ManagementError::wire(CONTEXT, e))?;

    let mut content = ChunkedReader::new(wire.get_mut());
    let stored = collaborators
        .deployment_repository()
        .add_deployment_content(&name, &runtime_name, &mut content)
        .await;
    // Closed on both paths. A framing fault takes precedence.
    content
        .close()
        .await
        .map_err(|e| ManagementError::wire(CONTEXT, e))?;
    let hash = stored
        .map_err(|e| ManagementError::execution("unable to store deployment content", e))?;
    info!(deployment = %name, runtime_name = %runtime_name, "stored deployment content");
    Ok(Request::AddDeploymentContent(hash))
}
