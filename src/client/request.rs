//! Request frame encoders.
//!
//! Each encoder returns a complete frame payload:
//!
//! ```text
//! [DOMAIN_CONTROLLER_CLIENT_REQUEST][REQUEST_OPERATION][command][fields]
//! ```

use std::num::NonZeroUsize;

use bytes::BytesMut;

use crate::{
    chunk,
    codec::{WireError, WireWriter},
    marshal::Marshaller,
    model::{DeploymentPlan, DomainUpdate, ServerIdentity, ServerUpdate},
    protocol::{Command, DOMAIN_CONTROLLER_CLIENT_REQUEST, REQUEST_OPERATION, param},
};

/// Number of bytes preceding the request body.
pub const ENVELOPE_LEN: usize = 3;

fn envelope<M: Marshaller>(marshaller: &M, command: Command) -> WireWriter<'_, M> {
    let mut out = WireWriter::start(marshaller);
    out.write_u8(DOMAIN_CONTROLLER_CLIENT_REQUEST);
    out.write_u8(REQUEST_OPERATION);
    out.write_u8(command.request_code());
    out
}

fn write_update<M: Marshaller>(
    out: &mut WireWriter<'_, M>,
    update: &DomainUpdate,
) -> Result<(), WireError> {
    out.write_u8(param::DOMAIN_MODEL_UPDATE);
    out.write_object(update)
}

/// Encode a request for the current domain model.
#[must_use]
pub fn get_domain<M: Marshaller>(marshaller: &M) -> BytesMut {
    envelope(marshaller, Command::GetDomain).into_bytes()
}

/// Encode a batch of domain updates.
///
/// # Errors
///
/// Returns a [`WireError`] if an update cannot be marshalled.
pub fn apply_updates<M: Marshaller>(
    marshaller: &M,
    updates: &[DomainUpdate],
) -> Result<BytesMut, WireError> {
    let mut out = envelope(marshaller, Command::ApplyUpdates);
    out.write_u8(param::APPLY_UPDATES_RESULT_COUNT);
    out.write_len(updates.len())?;
    for update in updates {
        write_update(&mut out, update)?;
    }
    Ok(out.into_bytes())
}

/// Encode a single domain update.
///
/// # Errors
///
/// Returns a [`WireError`] if the update cannot be marshalled.
pub fn apply_update<M: Marshaller>(
    marshaller: &M,
    update: &DomainUpdate,
) -> Result<BytesMut, WireError> {
    let mut out = envelope(marshaller, Command::ApplyUpdate);
    write_update(&mut out, update)?;
    Ok(out.into_bytes())
}

/// Encode an update addressed to one server.
///
/// # Errors
///
/// Returns a [`WireError`] if a name is too long or the update cannot be
/// marshalled.
pub fn apply_server_update<M: Marshaller>(
    marshaller: &M,
    server: &ServerIdentity,
    update: &ServerUpdate,
) -> Result<BytesMut, WireError> {
    let mut out = envelope(marshaller, Command::ApplyServerUpdate);
    out.write_u8(param::HOST_NAME);
    out.write_utf(server.host_name())?;
    out.write_u8(param::SERVER_GROUP_NAME);
    out.write_utf(server.server_group_name())?;
    out.write_u8(param::SERVER_NAME);
    out.write_utf(server.server_name())?;
    out.write_u8(param::SERVER_MODEL_UPDATE);
    out.write_object(update)?;
    Ok(out.into_bytes())
}

/// Encode a deployment plan.
///
/// # Errors
///
/// Returns a [`WireError`] if the plan cannot be marshalled.
pub fn execute_deployment_plan<M: Marshaller>(
    marshaller: &M,
    plan: &DeploymentPlan,
) -> Result<BytesMut, WireError> {
    let mut out = envelope(marshaller, Command::ExecuteDeploymentPlan);
    out.write_u8(param::DEPLOYMENT_PLAN);
    out.write_object(plan)?;
    Ok(out.into_bytes())
}

/// Encode a content upload, splitting `content` into chunks of at most
/// `chunk_size` bytes.
///
/// # Errors
///
/// Returns a [`WireError`] if a name is too long or `chunk_size` does not fit
/// a chunk length prefix.
pub fn add_deployment_content<M: Marshaller>(
    marshaller: &M,
    name: &str,
    runtime_name: &str,
    content: &[u8],
    chunk_size: NonZeroUsize,
) -> Result<BytesMut, WireError> {
    let mut out = envelope(marshaller, Command::AddDeploymentContent);
    out.write_u8(param::DEPLOYMENT_NAME);
    out.write_utf(name)?;
    out.write_u8(param::DEPLOYMENT_RUNTIME_NAME);
    out.write_utf(runtime_name)?;
    out.write_u8(param::DEPLOYMENT_CONTENT);
    let mut frame = out.into_bytes();
    chunk::write_chunked(&mut frame, content, chunk_size)?;
    Ok(frame)
}
