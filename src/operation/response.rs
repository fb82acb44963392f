//! Response bodies and their encoders.
//!
//! Encoders only append to a [`WireWriter`]; nothing reaches the stream until
//! the writer is finished, so an encoding failure leaves no partial response.

use crate::{
    codec::{WireError, WireWriter},
    marshal::Marshaller,
    model::{
        DeploymentHash,
        DeploymentPlanResult,
        DomainModel,
        DomainUpdateReport,
        DomainUpdateResult,
        ModelUpdateResult,
        ServerIdentity,
        ServerUpdateOutcome,
        UpdateFailure,
    },
    protocol::param,
};

/// Result of executing one request, ready to encode.
#[derive(Debug)]
pub(super) enum Response {
    DomainModel(DomainModel),
    ApplyUpdates(Vec<DomainUpdateResult>),
    ApplyUpdate(ModelUpdateResult),
    ApplyServerUpdate(ServerUpdateOutcome),
    DeploymentPlan(DeploymentPlanResult),
    DeploymentHash(DeploymentHash),
}

impl Response {
    /// Append the response body to `out`.
    pub(super) fn encode<M: Marshaller>(
        &self,
        out: &mut WireWriter<'_, M>,
    ) -> Result<(), WireError> {
        match self {
            Self::DomainModel(model) => {
                out.write_u8(param::DOMAIN_MODEL);
                out.write_object(model)
            }
            Self::ApplyUpdates(results) => {
                out.write_u8(param::APPLY_UPDATES_RESULT_COUNT);
                out.write_len(results.len())?;
                results.iter().try_for_each(|result| {
                    out.write_u8(param::APPLY_UPDATE_RESULT);
                    write_domain_result(out, result)
                })
            }
            Self::ApplyUpdate(result) => {
                out.write_u8(param::APPLY_UPDATE_RESULT);
                write_model_result(out, result)
            }
            Self::ApplyServerUpdate(outcome) => {
                out.write_u8(param::APPLY_UPDATE_RESULT);
                write_server_outcome(out, outcome)
            }
            Self::DeploymentPlan(result) => {
                out.write_u8(param::DEPLOYMENT_PLAN_RESULT);
                out.write_object(result)
            }
            Self::DeploymentHash(hash) => {
                out.write_u8(param::DEPLOYMENT_HASH_LENGTH);
                out.write_len(hash.len())?;
                out.write_u8(param::DEPLOYMENT_HASH);
                out.write_bytes(hash.as_bytes());
                Ok(())
            }
        }
    }
}

fn write_failure<M: Marshaller>(
    out: &mut WireWriter<'_, M>,
    failure: &UpdateFailure,
) -> Result<(), WireError> {
    out.write_u8(param::APPLY_UPDATE_RESULT_EXCEPTION);
    out.write_object(failure)
}

fn write_identity<M: Marshaller>(
    out: &mut WireWriter<'_, M>,
    server: &ServerIdentity,
) -> Result<(), WireError> {
    out.write_u8(param::HOST_NAME);
    out.write_utf(server.host_name())?;
    out.write_u8(param::SERVER_GROUP_NAME);
    out.write_utf(server.server_group_name())?;
    out.write_u8(param::SERVER_NAME);
    out.write_utf(server.server_name())
}

fn write_host_failures<M: Marshaller>(
    out: &mut WireWriter<'_, M>,
    failures: &[(String, UpdateFailure)],
) -> Result<(), WireError> {
    out.write_u8(param::APPLY_UPDATE_RESULT_HOST_FAILURE_COUNT);
    out.write_len(failures.len())?;
    for (host, failure) in failures {
        out.write_u8(param::HOST_NAME);
        out.write_utf(host)?;
        write_failure(out, failure)?;
    }
    Ok(())
}

fn write_report<M: Marshaller>(
    out: &mut WireWriter<'_, M>,
    report: &DomainUpdateReport,
) -> Result<(), WireError> {
    write_host_failures(out, &report.host_failures)?;

    out.write_u8(param::APPLY_UPDATE_RESULT_SERVER_FAILURE_COUNT);
    out.write_len(report.server_failures.len())?;
    for (server, failure) in &report.server_failures {
        write_identity(out, server)?;
        write_failure(out, failure)?;
    }

    out.write_u8(param::APPLY_UPDATE_RESULT_SERVER_RESULT_COUNT);
    out.write_len(report.server_results.len())?;
    for (server, value) in &report.server_results {
        write_identity(out, server)?;
        out.write_u8(param::APPLY_SERVER_MODEL_UPDATE_RESULT_RETURN);
        out.write_object(value)?;
    }
    Ok(())
}

fn write_domain_result<M: Marshaller>(
    out: &mut WireWriter<'_, M>,
    result: &DomainUpdateResult,
) -> Result<(), WireError> {
    match result {
        DomainUpdateResult::DomainFailure(failure) => write_failure(out, failure),
        DomainUpdateResult::Applied(report) => {
            out.write_u8(param::APPLY_UPDATE_RESULT_DOMAIN_MODEL_SUCCESS);
            write_report(out, report)
        }
    }
}

fn write_model_result<M: Marshaller>(
    out: &mut WireWriter<'_, M>,
    result: &ModelUpdateResult,
) -> Result<(), WireError> {
    match result {
        ModelUpdateResult::DomainFailure(failure) => write_failure(out, failure),
        ModelUpdateResult::Applied {
            host_failures,
            servers,
        } => {
            out.write_u8(param::APPLY_UPDATE_RESULT_DOMAIN_MODEL_SUCCESS);
            write_host_failures(out, host_failures)?;
            out.write_u8(param::APPLY_UPDATE_RESULT_SERVER_COUNT);
            out.write_len(servers.len())?;
            servers.iter().try_for_each(|server| write_identity(out, server))
        }
    }
}

fn write_server_outcome<M: Marshaller>(
    out: &mut WireWriter<'_, M>,
    outcome: &ServerUpdateOutcome,
) -> Result<(), WireError> {
    match outcome {
        ServerUpdateOutcome::Failed(failure) => write_failure(out, failure),
        ServerUpdateOutcome::Cancelled => {
            out.write_u8(param::APPLY_SERVER_MODEL_UPDATE_CANCELLED);
            Ok(())
        }
        ServerUpdateOutcome::TimedOut => {
            out.write_u8(param::APPLY_SERVER_MODEL_UPDATE_TIMED_OUT);
            Ok(())
        }
        ServerUpdateOutcome::Success(value) => {
            out.write_u8(param::APPLY_SERVER_MODEL_UPDATE_RESULT_RETURN);
            out.write_object(value)
        }
    }
}
