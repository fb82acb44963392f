#![doc(html_root_url = "https://docs.rs/mgmtframe/latest")]
//! Public API for the `mgmtframe` library.
//!
//! This crate serves the domain-controller management protocol: tagged
//! binary requests arrive in length-prefixed frames, are routed to a
//! [`Dispatcher`], executed as single-use [`Operation`]s against pluggable
//! [`collaborators`], and answered with one response frame each.
//!
//! [`Operation`]: operation::Operation

pub mod byte_order;
pub mod chunk;
pub mod client;
pub mod codec;
pub mod collaborators;
pub mod dispatcher;
pub mod error;
pub mod framing;
pub mod handler;
pub mod marshal;
pub mod memory;
pub mod metrics;
pub mod model;
pub mod operation;
pub mod panic;
pub mod protocol;
pub mod recovery;
pub mod registry;
pub mod server;

pub use client::{ClientError, ManagementClient};
pub use collaborators::{
    CollaboratorError,
    Collaborators,
    DeploymentManager,
    DeploymentRepository,
    DomainController,
};
pub use dispatcher::Dispatcher;
pub use error::{FailureKind, ManagementError, Result};
pub use handler::{HandlerRegistry, ManagementOperationHandler};
pub use marshal::{BincodeMarshaller, Marshaller};
pub use protocol::Command;
pub use recovery::{DefaultRecoveryPolicy, RecoveryPolicy, RecoveryPolicyHook};
pub use registry::CommandRegistry;
pub use server::{BackoffConfig, ManagementServer, ServerError};
