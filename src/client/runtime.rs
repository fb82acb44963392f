//! Management client runtime.

use std::{fmt, net::SocketAddr, num::NonZeroUsize};

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use super::{ClientError, request, response};
use crate::{
    framing,
    marshal::{BincodeMarshaller, Marshaller},
    model::{
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
    },
};

/// Chunk size used for content uploads unless configured otherwise.
pub const DEFAULT_CHUNK_SIZE: NonZeroUsize = match NonZeroUsize::new(64 * 1024) {
    Some(size) => size,
    None => unreachable!(),
};

/// Trait alias for stream types that can carry a management connection.
pub trait ClientStream: AsyncRead + AsyncWrite + Unpin {}
impl<T> ClientStream for T where T: AsyncRead + AsyncWrite + Unpin {}

/// Client issuing management requests over one framed connection.
///
/// Requests are sent one at a time; each call waits for its response frame.
///
/// # Examples
///
/// ```no_run
/// use std::net::SocketAddr;
///
/// use mgmtframe::client::{ClientError, ManagementClient};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), ClientError> {
/// let addr: SocketAddr = "127.0.0.1:9999".parse().expect("valid socket address");
/// let mut client = ManagementClient::connect(addr).await?;
/// let _model = client.get_domain().await?;
/// # Ok(())
/// # }
/// ```
pub struct ManagementClient<M = BincodeMarshaller, T = TcpStream>
where
    T: ClientStream,
{
    framed: Framed<T, LengthDelimitedCodec>,
    marshaller: M,
    chunk_size: NonZeroUsize,
}

impl<M, T> fmt::Debug for ManagementClient<M, T>
where
    T: ClientStream,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementClient")
            .field("max_frame_length", &self.framed.codec().max_frame_length())
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

impl ManagementClient<BincodeMarshaller, TcpStream> {
    /// Connect to a management server at `addr`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Io`] if the connection cannot be established.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<T: ClientStream> ManagementClient<BincodeMarshaller, T> {
    /// Wrap an established stream.
    pub fn new(stream: T) -> Self {
        Self {
            framed: Framed::new(stream, framing::codec(framing::DEFAULT_MAX_FRAME_LENGTH)),
            marshaller: BincodeMarshaller,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl<M, T> ManagementClient<M, T>
where
    M: Marshaller,
    T: ClientStream,
{
    /// Replace the object marshaller.
    #[must_use]
    pub fn with_marshaller<N: Marshaller>(self, marshaller: N) -> ManagementClient<N, T> {
        ManagementClient {
            framed: self.framed,
            marshaller,
            chunk_size: self.chunk_size,
        }
    }

    /// Set the largest frame accepted or sent, clamped to the supported range.
    #[must_use]
    pub fn max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.framed
            .codec_mut()
            .set_max_frame_length(framing::clamp_frame_length(max_frame_length));
        self
    }

    /// Set the chunk size used for content uploads.
    #[must_use]
    pub fn chunk_size(mut self, chunk_size: NonZeroUsize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Access the underlying stream.
    #[must_use]
    pub fn stream(&self) -> &T { self.framed.get_ref() }

    /// Send one raw request frame and return the response frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Disconnected`] if the peer closes the connection
    /// first and [`ClientError::Io`] on transport failure.
    pub async fn call(&mut self, frame: BytesMut) -> Result<Bytes, ClientError> {
        self.framed.send(frame.freeze()).await?;
        match self.framed.next().await {
            Some(Ok(frame)) => Ok(frame.freeze()),
            Some(Err(e)) => Err(ClientError::Io(e)),
            None => Err(ClientError::Disconnected),
        }
    }

    /// Fetch the current domain model.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or is rejected.
    pub async fn get_domain(&mut self) -> Result<DomainModel, ClientError> {
        let frame = self.call(request::get_domain(&self.marshaller)).await?;
        response::domain_model(&frame, &self.marshaller).await
    }

    /// Apply `updates` as one batch; results follow the order of `updates`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or is rejected.
    pub async fn apply_updates(
        &mut self,
        updates: &[DomainUpdate],
    ) -> Result<Vec<DomainUpdateResult>, ClientError> {
        let frame = self
            .call(request::apply_updates(&self.marshaller, updates)?)
            .await?;
        response::apply_updates(&frame, &self.marshaller).await
    }

    /// Apply `update` to the domain model.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or is rejected.
    pub async fn apply_update(
        &mut self,
        update: &DomainUpdate,
    ) -> Result<ModelUpdateResult, ClientError> {
        let frame = self
            .call(request::apply_update(&self.marshaller, update)?)
            .await?;
        response::apply_update(&frame, &self.marshaller).await
    }

    /// Apply `update` to the server identified by `server`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or is rejected.
    pub async fn apply_server_update(
        &mut self,
        server: &ServerIdentity,
        update: &ServerUpdate,
    ) -> Result<ServerUpdateOutcome, ClientError> {
        let frame = self
            .call(request::apply_server_update(
                &self.marshaller,
                server,
                update,
            )?)
            .await?;
        response::apply_server_update(&frame, &self.marshaller).await
    }

    /// Execute `plan` and wait for its result.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or is rejected.
    pub async fn execute_deployment_plan(
        &mut self,
        plan: &DeploymentPlan,
    ) -> Result<DeploymentPlanResult, ClientError> {
        let frame = self
            .call(request::execute_deployment_plan(&self.marshaller, plan)?)
            .await?;
        response::deployment_plan_result(&frame, &self.marshaller).await
    }

    /// Upload `content`, returning the hash the server stored it under.
    ///
    /// # Errors
    ///
    /// Returns a [`ClientError`] if the request fails or is rejected.
    pub async fn add_deployment_content(
        &mut self,
        name: &str,
        runtime_name: &str,
        content: &[u8],
    ) -> Result<DeploymentHash, ClientError> {
        let request = request::add_deployment_content(
            &self.marshaller,
            name,
            runtime_name,
            content,
            self.chunk_size,
        )?;
        let frame = self.call(request).await?;
        response::deployment_hash(&frame, &self.marshaller).await
    }
}
