//! Domain-controller client request dispatcher.
//!
//! [`Dispatcher`] reads the request header and command byte, resolves the
//! command through its [`CommandRegistry`], and hands the rest of the request
//! to a fresh [`Operation`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::debug;

use crate::{
    codec::{DecodeError, WireReader},
    collaborators::Collaborators,
    error::{ManagementError, Result},
    handler::ManagementOperationHandler,
    marshal::{BincodeMarshaller, Marshaller},
    operation::Operation,
    protocol::{Command, DOMAIN_CONTROLLER_CLIENT_REQUEST, REQUEST_OPERATION},
    registry::CommandRegistry,
};

/// Dispatches domain-controller client requests to operations.
///
/// # Examples
///
/// ```
/// use mgmtframe::{dispatcher::Dispatcher, memory, registry::CommandRegistry};
///
/// let dispatcher = Dispatcher::new(CommandRegistry::standard(), memory::collaborators([]));
/// assert_eq!(dispatcher.registry().len(), 6);
/// ```
#[derive(Debug)]
pub struct Dispatcher<M = BincodeMarshaller> {
    registry: Arc<CommandRegistry>,
    collaborators: Collaborators,
    marshaller: M,
}

impl Dispatcher<BincodeMarshaller> {
    /// Create a dispatcher resolving commands through `registry` and serving
    /// them with `collaborators`.
    #[must_use]
    pub fn new(registry: CommandRegistry, collaborators: Collaborators) -> Self {
        Self {
            registry: Arc::new(registry),
            collaborators,
            marshaller: BincodeMarshaller,
        }
    }
}

impl<M: Marshaller> Dispatcher<M> {
    /// Replace the object marshaller.
    #[must_use]
    pub fn with_marshaller<N: Marshaller>(self, marshaller: N) -> Dispatcher<N> {
        Dispatcher {
            registry: self.registry,
            collaborators: self.collaborators,
            marshaller,
        }
    }

    /// Command lookup table.
    #[must_use]
    pub fn registry(&self) -> &CommandRegistry { &self.registry }

    /// Collaborator snapshot shared by every operation.
    #[must_use]
    pub fn collaborators(&self) -> &Collaborators { &self.collaborators }

    /// Serve one request read from `input`, positioned at the request header.
    ///
    /// Returns the command that was served. Bytes after the request stay in
    /// `input` for the next request.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::Wire`] if the header is wrong or missing,
    /// [`ManagementError::UnknownCommand`] if the command byte is not
    /// registered (no further bytes are read), and
    /// [`ManagementError::Operation`] wrapping whatever failed while the
    /// operation ran.
    pub async fn handle<R, W>(&self, input: &mut R, output: &mut W) -> Result<Command>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
        W: AsyncWrite + Send + Unpin + ?Sized,
    {
        self.serve(input, output, false).await
    }

    /// Serve one request that occupies the whole of `input`.
    ///
    /// Behaves like [`Dispatcher::handle`], except that bytes left in `input`
    /// after the request's last field fail the request before its response is
    /// built. Content uploads have already been stored by then, since the
    /// repository consumes them while the request is decoded.
    ///
    /// # Errors
    ///
    /// As [`Dispatcher::handle`]; leftover bytes are reported as
    /// [`DecodeError::TrailingBytes`] inside [`ManagementError::Operation`].
    pub async fn handle_request<R, W>(&self, input: &mut R, output: &mut W) -> Result<Command>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
        W: AsyncWrite + Send + Unpin + ?Sized,
    {
        self.serve(input, output, true).await
    }

    async fn serve<R, W>(&self, input: &mut R, output: &mut W, whole: bool) -> Result<Command>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
        W: AsyncWrite + Send + Unpin + ?Sized,
    {
        let code = self.read_command_code(input).await?;
        let Some(command) = self.registry.lookup(code) else {
            debug!(code, "unknown command code");
            return Err(ManagementError::UnknownCommand { code });
        };
        debug!(%command, code, "dispatching management operation");
        crate::metrics::inc_requests(command);
        self.run(command, input, output, whole)
            .await
            .map(|_| command)
            .map_err(|e| ManagementError::operation(command, e))
    }

    async fn run<R, W>(
        &self,
        command: Command,
        input: &mut R,
        output: &mut W,
        whole: bool,
    ) -> Result<usize>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
        W: AsyncWrite + Send + Unpin + ?Sized,
    {
        let mut operation = Operation::new(command, &self.collaborators, &self.marshaller);
        operation.read_request(input).await?;
        if whole {
            ensure_request_end(input).await?;
        }
        operation.send_response(output).await
    }

    async fn read_command_code<R>(&self, input: &mut R) -> Result<u8>
    where
        R: AsyncRead + Send + Unpin + ?Sized,
    {
        let mut wire = WireReader::start(input, &self.marshaller);
        wire.expect_header(REQUEST_OPERATION)
            .await
            .map_err(|e| ManagementError::wire("unable to read request header", e))?;
        let code = wire
            .read_u8()
            .await
            .map_err(|e| ManagementError::wire("unable to read command code", e))?;
        wire.finish();
        Ok(code)
    }
}

async fn ensure_request_end<R>(input: &mut R) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut extra = [0u8; 1];
    let read = input
        .read(&mut extra)
        .await
        .map_err(|e| ManagementError::wire("unable to read request", e))?;
    if read == 0 {
        Ok(())
    } else {
        Err(ManagementError::wire(
            "unexpected bytes after request",
            DecodeError::TrailingBytes,
        ))
    }
}

#[async_trait]
impl<M: Marshaller> ManagementOperationHandler for Dispatcher<M> {
    fn identifier(&self) -> u8 { DOMAIN_CONTROLLER_CLIENT_REQUEST }

    async fn handle(
        &self,
        input: &mut (dyn AsyncRead + Send + Unpin),
        output: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<()> {
        self.handle_request(input, output).await.map(|_| ())
    }
}
