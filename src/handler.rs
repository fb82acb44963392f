//! Routing of request frames to management operation handlers.
//!
//! The first byte of every request frame names the handler that serves it.
//! A [`HandlerRegistry`] is built once at startup and shared read-only by
//! every connection.

use std::{collections::HashMap, fmt, sync::Arc};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    codec::DecodeError,
    error::{ManagementError, Result},
    registry::RegistryError,
};

/// A handler serving every request frame tagged with its identifier.
#[async_trait]
pub trait ManagementOperationHandler: Send + Sync {
    /// Identifier byte this handler answers to.
    fn identifier(&self) -> u8;

    /// Serve one request read from `input`, writing the response to `output`.
    ///
    /// `input` is positioned just after the identifier byte and ends where
    /// the request frame ends.
    ///
    /// # Errors
    ///
    /// Returns a [`ManagementError`] if the request cannot be served. Nothing
    /// has been written to `output` in that case.
    async fn handle(
        &self,
        input: &mut (dyn AsyncRead + Send + Unpin),
        output: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<()>;
}

/// Maps handler identifiers to handlers.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<u8, Arc<dyn ManagementOperationHandler>>,
}

impl HandlerRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Register `handler` under its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateHandler`] if another handler already
    /// answers to the same identifier.
    pub fn register(
        mut self,
        handler: Arc<dyn ManagementOperationHandler>,
    ) -> std::result::Result<Self, RegistryError> {
        let id = handler.identifier();
        if self.handlers.contains_key(&id) {
            return Err(RegistryError::DuplicateHandler(id));
        }
        self.handlers.insert(id, handler);
        Ok(self)
    }

    /// Handler registered under `id`.
    #[must_use]
    pub fn get(&self, id: u8) -> Option<&Arc<dyn ManagementOperationHandler>> {
        self.handlers.get(&id)
    }

    /// Number of registered handlers.
    #[must_use]
    pub fn len(&self) -> usize { self.handlers.len() }

    /// Returns true if no handler is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.handlers.is_empty() }

    /// Serve one request `frame`, appending the response to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`ManagementError::UnknownHandler`] if no handler answers to
    /// the frame's identifier, a decode error for an empty frame, and
    /// otherwise whatever the handler returns.
    pub async fn handle_frame(&self, frame: &[u8], output: &mut Vec<u8>) -> Result<()> {
        let Some((&id, mut body)) = frame.split_first() else {
            return Err(ManagementError::wire(
                "unable to read handler identifier",
                DecodeError::UnexpectedEof {
                    field: "handler identifier",
                },
            ));
        };
        let handler = self.get(id).ok_or(ManagementError::UnknownHandler(id))?;
        handler.handle(&mut body, output).await
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("identifiers", &ids)
            .finish()
    }
}
