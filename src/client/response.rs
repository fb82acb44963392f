//! Response frame decoders.
//!
//! Every decoder checks the response code, the tag before each field, and
//! that nothing follows the last field. An error frame is reported as
//! [`ClientError::Rejected`].

use tokio::io::AsyncRead;

use super::ClientError;
use crate::{
    codec::{WireError, WireReader},
    marshal::{BincodeMarshaller, Marshaller},
    model::{
        DeploymentHash,
        DeploymentPlanResult,
        DomainModel,
        DomainUpdateReport,
        DomainUpdateResult,
        ModelUpdateResult,
        ServerIdentity,
        ServerUpdateOutcome,
        ServerUpdateReturn,
        UpdateFailure,
    },
    protocol::{Command, RESPONSE_FAILED, param},
};

type Reader<'a, 'f, M> = WireReader<'a, &'f [u8], M>;

async fn open<R, M>(wire: &mut WireReader<'_, R, M>, command: Command) -> Result<(), ClientError>
where
    R: AsyncRead + Unpin + ?Sized,
    M: Marshaller,
{
    let expected = command.response_code();
    match wire.read_u8().await? {
        code if code == expected => Ok(()),
        RESPONSE_FAILED => Err(ClientError::Rejected(wire.read_utf().await?)),
        found => Err(ClientError::UnexpectedResponse { expected, found }),
    }
}

fn ensure_consumed(remaining: &[u8]) -> Result<(), ClientError> {
    if remaining.is_empty() {
        Ok(())
    } else {
        Err(ClientError::TrailingBytes(remaining.len()))
    }
}

async fn read_count<M: Marshaller>(
    wire: &mut Reader<'_, '_, M>,
    tag: u8,
) -> Result<usize, WireError> {
    wire.expect_header(tag).await?;
    wire.read_len().await
}

async fn read_identity<M: Marshaller>(
    wire: &mut Reader<'_, '_, M>,
) -> Result<ServerIdentity, WireError> {
    wire.expect_header(param::HOST_NAME).await?;
    let host = wire.read_utf().await?;
    wire.expect_header(param::SERVER_GROUP_NAME).await?;
    let group = wire.read_utf().await?;
    wire.expect_header(param::SERVER_NAME).await?;
    let server = wire.read_utf().await?;
    Ok(ServerIdentity::new(host, group, server))
}

async fn read_failure<M: Marshaller>(
    wire: &mut Reader<'_, '_, M>,
) -> Result<UpdateFailure, WireError> {
    wire.expect_header(param::APPLY_UPDATE_RESULT_EXCEPTION).await?;
    wire.read_object().await
}

async fn read_host_failures<M: Marshaller>(
    wire: &mut Reader<'_, '_, M>,
) -> Result<Vec<(String, UpdateFailure)>, WireError> {
    let count = read_count(wire, param::APPLY_UPDATE_RESULT_HOST_FAILURE_COUNT).await?;
    let mut failures = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        wire.expect_header(param::HOST_NAME).await?;
        let host = wire.read_utf().await?;
        failures.push((host, read_failure(wire).await?));
    }
    Ok(failures)
}

async fn read_report<M: Marshaller>(
    wire: &mut Reader<'_, '_, M>,
) -> Result<DomainUpdateReport, WireError> {
    let host_failures = read_host_failures(wire).await?;

    let count = read_count(wire, param::APPLY_UPDATE_RESULT_SERVER_FAILURE_COUNT).await?;
    let mut server_failures = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let server = read_identity(wire).await?;
        server_failures.push((server, read_failure(wire).await?));
    }

    let count = read_count(wire, param::APPLY_UPDATE_RESULT_SERVER_RESULT_COUNT).await?;
    let mut server_results = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        let server = read_identity(wire).await?;
        wire.expect_header(param::APPLY_SERVER_MODEL_UPDATE_RESULT_RETURN)
            .await?;
        let value: ServerUpdateReturn = wire.read_object().await?;
        server_results.push((server, value));
    }

    Ok(DomainUpdateReport {
        host_failures,
        server_failures,
        server_results,
    })
}

/// Read the byte telling a domain failure from a success, consuming the
/// failure object if there is one.
async fn read_discriminant<M: Marshaller>(
    wire: &mut Reader<'_, '_, M>,
) -> Result<Result<(), UpdateFailure>, WireError> {
    match wire.read_u8().await? {
        param::APPLY_UPDATE_RESULT_EXCEPTION => Ok(Err(wire.read_object().await?)),
        param::APPLY_UPDATE_RESULT_DOMAIN_MODEL_SUCCESS => Ok(Ok(())),
        found => Err(WireError::ProtocolViolation {
            expected: param::APPLY_UPDATE_RESULT_DOMAIN_MODEL_SUCCESS,
            found,
        }),
    }
}

async fn read_domain_result<M: Marshaller>(
    wire: &mut Reader<'_, '_, M>,
) -> Result<DomainUpdateResult, WireError> {
    wire.expect_header(param::APPLY_UPDATE_RESULT).await?;
    Ok(match read_discriminant(wire).await? {
        Err(failure) => DomainUpdateResult::DomainFailure(failure),
        Ok(()) => DomainUpdateResult::Applied(read_report(wire).await?),
    })
}

/// Decode a domain model response.
///
/// # Errors
///
/// Returns a [`ClientError`] if the frame is an error frame or malformed.
pub async fn domain_model<M: Marshaller>(
    frame: &[u8],
    marshaller: &M,
) -> Result<DomainModel, ClientError> {
    let mut input = frame;
    let mut wire = WireReader::start(&mut input, marshaller);
    open(&mut wire, Command::GetDomain).await?;
    wire.expect_header(param::DOMAIN_MODEL).await?;
    let model: DomainModel = wire.read_object().await?;
    wire.finish();
    ensure_consumed(input)?;
    Ok(model)
}

/// Decode the results of a batch of domain updates, in request order.
///
/// # Errors
///
/// Returns a [`ClientError`] if the frame is an error frame or malformed.
pub async fn apply_updates<M: Marshaller>(
    frame: &[u8],
    marshaller: &M,
) -> Result<Vec<DomainUpdateResult>, ClientError> {
    let mut input = frame;
    let mut wire = WireReader::start(&mut input, marshaller);
    open(&mut wire, Command::ApplyUpdates).await?;
    let count = read_count(&mut wire, param::APPLY_UPDATES_RESULT_COUNT).await?;
    let mut results = Vec::with_capacity(count.min(64));
    for _ in 0..count {
        results.push(read_domain_result(&mut wire).await?);
    }
    wire.finish();
    ensure_consumed(input)?;
    Ok(results)
}

/// Decode the result of a single domain model update.
///
/// # Errors
///
/// Returns a [`ClientError`] if the frame is an error frame or malformed.
pub async fn apply_update<M: Marshaller>(
    frame: &[u8],
    marshaller: &M,
) -> Result<ModelUpdateResult, ClientError> {
    let mut input = frame;
    let mut wire = WireReader::start(&mut input, marshaller);
    open(&mut wire, Command::ApplyUpdate).await?;
    wire.expect_header(param::APPLY_UPDATE_RESULT).await?;
    let result = match read_discriminant(&mut wire).await? {
        Err(failure) => ModelUpdateResult::DomainFailure(failure),
        Ok(()) => {
            let host_failures = read_host_failures(&mut wire).await?;
            let count = read_count(&mut wire, param::APPLY_UPDATE_RESULT_SERVER_COUNT).await?;
            let mut servers = Vec::with_capacity(count.min(64));
            for _ in 0..count {
                servers.push(read_identity(&mut wire).await?);
            }
            ModelUpdateResult::Applied {
                host_failures,
                servers,
            }
        }
    };
    wire.finish();
    ensure_consumed(input)?;
    Ok(result)
}

/// Decode the outcome of a server update.
///
/// # Errors
///
/// Returns a [`ClientError`] if the frame is an error frame or malformed.
pub async fn apply_server_update<M: Marshaller>(
    frame: &[u8],
    marshaller: &M,
) -> Result<ServerUpdateOutcome, ClientError> {
    let mut input = frame;
    let mut wire = WireReader::start(&mut input, marshaller);
    open(&mut wire, Command::ApplyServerUpdate).await?;
    wire.expect_header(param::APPLY_UPDATE_RESULT).await?;
    let outcome = match wire.read_u8().await? {
        param::APPLY_UPDATE_RESULT_EXCEPTION => {
            ServerUpdateOutcome::Failed(wire.read_object().await?)
        }
        param::APPLY_SERVER_MODEL_UPDATE_CANCELLED => ServerUpdateOutcome::Cancelled,
        param::APPLY_SERVER_MODEL_UPDATE_TIMED_OUT => ServerUpdateOutcome::TimedOut,
        param::APPLY_SERVER_MODEL_UPDATE_RESULT_RETURN => {
            ServerUpdateOutcome::Success(wire.read_object().await?)
        }
        found => {
            return Err(WireError::ProtocolViolation {
                expected: param::APPLY_SERVER_MODEL_UPDATE_RESULT_RETURN,
                found,
            }
            .into());
        }
    };
    wire.finish();
    ensure_consumed(input)?;
    Ok(outcome)
}

/// Decode a deployment plan result.
///
/// # Errors
///
/// Returns a [`ClientError`] if the frame is an error frame or malformed.
pub async fn deployment_plan_result<M: Marshaller>(
    frame: &[u8],
    marshaller: &M,
) -> Result<DeploymentPlanResult, ClientError> {
    let mut input = frame;
    let mut wire = WireReader::start(&mut input, marshaller);
    open(&mut wire, Command::ExecuteDeploymentPlan).await?;
    wire.expect_header(param::DEPLOYMENT_PLAN_RESULT).await?;
    let result: DeploymentPlanResult = wire.read_object().await?;
    wire.finish();
    ensure_consumed(input)?;
    Ok(result)
}

/// Decode the hash of uploaded content.
///
/// # Errors
///
/// Returns a [`ClientError`] if the frame is an error frame or malformed.
pub async fn deployment_hash<M: Marshaller>(
    frame: &[u8],
    marshaller: &M,
) -> Result<DeploymentHash, ClientError> {
    let mut input = frame;
    let mut wire = WireReader::start(&mut input, marshaller);
    open(&mut wire, Command::AddDeploymentContent).await?;
    let len = read_count(&mut wire, param::DEPLOYMENT_HASH_LENGTH).await?;
    wire.expect_header(param::DEPLOYMENT_HASH).await?;
    let hash = DeploymentHash::new(wire.read_bytes(len).await?);
    wire.finish();
    ensure_consumed(input)?;
    Ok(hash)
}

/// Decode an error frame, returning its message.
///
/// # Errors
///
/// Returns a [`ClientError`] if the frame is not a well-formed error frame.
pub async fn error_message(frame: &[u8]) -> Result<String, ClientError> {
    let marshaller = BincodeMarshaller;
    let mut input = frame;
    let mut wire = WireReader::start(&mut input, &marshaller);
    wire.expect_header(RESPONSE_FAILED).await?;
    let message = wire.read_utf().await?;
    wire.finish();
    ensure_consumed(input)?;
    Ok(message)
}
