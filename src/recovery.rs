//! Recovery policies applied after a failed request.
//!
//! When a request fails the connection layer writes an error frame and then
//! consults a [`RecoveryPolicyHook`] to decide whether the connection stays
//! open.
//!
//! - [`RecoveryPolicy::Drop`]: discard the failed request and keep serving the connection.
//! - [`RecoveryPolicy::Disconnect`]: close the connection after the error frame.
//!
//! ```
//! use mgmtframe::{
//!     error::ManagementError,
//!     recovery::{RecoveryPolicy, RecoveryPolicyHook},
//! };
//!
//! struct Strict;
//!
//! impl RecoveryPolicyHook for Strict {
//!     fn recovery_policy(&self, _error: &ManagementError) -> RecoveryPolicy {
//!         RecoveryPolicy::Disconnect
//!     }
//! }
//! ```

use crate::error::{FailureKind, ManagementError};

/// What the connection does after a failed request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Discard the failed request and continue with the next frame.
    ///
    /// Frames are length-delimited, so a request abandoned part way through
    /// never leaves stray bytes for the next one.
    #[default]
    Drop,

    /// Close the connection once the error frame has been written.
    ///
    /// Used when the peer is out of step with the protocol or the transport
    /// has failed.
    Disconnect,
}

impl RecoveryPolicy {
    /// Default policy for errors of `kind`.
    #[must_use]
    pub const fn for_kind(kind: FailureKind) -> Self {
        match kind {
            FailureKind::ProtocolViolation | FailureKind::Transport => Self::Disconnect,
            FailureKind::Decode | FailureKind::UnknownCommand | FailureKind::OperationExecution => {
                Self::Drop
            }
        }
    }
}

/// Hook deciding the recovery policy for a failed request.
pub trait RecoveryPolicyHook: Send + Sync {
    /// Policy to apply after `error`.
    fn recovery_policy(&self, error: &ManagementError) -> RecoveryPolicy {
        error.recovery_policy()
    }
}

/// Hook applying [`ManagementError::recovery_policy`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRecoveryPolicy;

impl RecoveryPolicyHook for DefaultRecoveryPolicy {}
