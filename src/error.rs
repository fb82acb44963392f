//! Canonical error type for management request handling.
//!
//! Every failure raised while serving a request surfaces as a
//! [`ManagementError`]. The connection layer inspects [`ManagementError::kind`]
//! to pick a [`RecoveryPolicy`] and writes the error's message back to the
//! peer.

use thiserror::Error;

use crate::{
    codec::WireError,
    collaborators::CollaboratorError,
    operation::OperationState,
    protocol::Command,
    recovery::RecoveryPolicy,
};

/// Broad classification of a [`ManagementError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The peer sent a byte other than the tag the protocol requires.
    ProtocolViolation,
    /// A field was truncated or could not be parsed.
    Decode,
    /// The command code or handler identifier is not registered.
    UnknownCommand,
    /// The domain operation or response encoding failed.
    OperationExecution,
    /// The underlying stream failed.
    Transport,
}

impl FailureKind {
    /// Stable name used in logs and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProtocolViolation => "protocol_violation",
            Self::Decode => "decode",
            Self::UnknownCommand => "unknown_command",
            Self::OperationExecution => "operation_execution",
            Self::Transport => "transport",
        }
    }
}

/// Error raised while serving a management request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManagementError {
    /// Reading the request or writing the response failed.
    #[error("{context}: {source}")]
    Wire {
        /// What was being read or written.
        context: &'static str,
        /// Codec failure.
        #[source]
        source: WireError,
    },

    /// The command byte is not registered.
    #[error("unknown command code {code:#04x}")]
    UnknownCommand {
        /// Command byte received.
        code: u8,
    },

    /// No handler is registered under the frame's identifier.
    #[error("no handler registered for identifier {0:#04x}")]
    UnknownHandler(u8),

    /// A collaborator failed while executing the operation.
    #[error("{context}: {source}")]
    Execution {
        /// Collaborator call that failed.
        context: &'static str,
        /// Collaborator failure.
        #[source]
        source: CollaboratorError,
    },

    /// An operation step was invoked out of order.
    #[error("cannot {action} for {command} in state {state:?}")]
    InvalidState {
        /// Command served by the operation.
        command: Command,
        /// Step that was attempted.
        action: &'static str,
        /// State the operation was in.
        state: OperationState,
    },

    /// An operation failed; wraps the original cause.
    #[error("{command} failed: {source}")]
    Operation {
        /// Command served by the failed operation.
        command: Command,
        /// Original failure.
        #[source]
        source: Box<ManagementError>,
    },
}

impl ManagementError {
    pub(crate) fn wire(context: &'static str, source: impl Into<WireError>) -> Self {
        Self::Wire {
            context,
            source: source.into(),
        }
    }

    pub(crate) fn execution(context: &'static str, source: CollaboratorError) -> Self {
        Self::Execution { context, source }
    }

    pub(crate) fn operation(command: Command, source: Self) -> Self {
        Self::Operation {
            command,
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through [`ManagementError::Operation`].
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Command the failing operation served, if dispatch got that far.
    #[must_use]
    pub fn command(&self) -> Option<Command> {
        match self {
            Self::Operation { command, .. } | Self::InvalidState { command, .. } => Some(*command),
            _ => None,
        }
    }

    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self.root() {
            Self::Wire { source, .. } => match source {
                WireError::ProtocolViolation { .. } => FailureKind::ProtocolViolation,
                WireError::Io(_) => FailureKind::Transport,
                WireError::Encode(_) => FailureKind::OperationExecution,
                _ => FailureKind::Decode,
            },
            Self::UnknownCommand { .. } | Self::UnknownHandler(_) => FailureKind::UnknownCommand,
            Self::Execution { .. } | Self::InvalidState { .. } | Self::Operation { .. } => {
                FailureKind::OperationExecution
            }
        }
    }

    /// Default recovery policy for this error.
    #[must_use]
    pub fn recovery_policy(&self) -> RecoveryPolicy { RecoveryPolicy::for_kind(self.kind()) }
}

/// Result alias for management request handling.
pub type Result<T> = std::result::Result<T, ManagementError>;

#[cfg(test)]
mod tests {
    use std::io;

    use rstest::rstest;

    use super::*;
    use crate::codec::DecodeError;

    fn violation() -> ManagementError {
        ManagementError::wire(
            "request header",
            WireError::ProtocolViolation {
                expected: 0x45,
                found: 0x00,
            },
        )
    }

    #[rstest]
    #[case(violation(), FailureKind::ProtocolViolation, RecoveryPolicy::Disconnect)]
    #[case(
        ManagementError::wire("update", DecodeError::UnexpectedEof { field: "u32" }),
        FailureKind::Decode,
        RecoveryPolicy::Drop
    )]
    #[case(
        ManagementError::wire("response", io::Error::from(io::ErrorKind::BrokenPipe)),
        FailureKind::Transport,
        RecoveryPolicy::Disconnect
    )]
    #[case(
        ManagementError::UnknownCommand { code: 0x7F },
        FailureKind::UnknownCommand,
        RecoveryPolicy::Drop
    )]
    #[case(
        ManagementError::execution("apply update", CollaboratorError::new("offline")),
        FailureKind::OperationExecution,
        RecoveryPolicy::Drop
    )]
    fn classifies_failures(
        #[case] error: ManagementError,
        #[case] kind: FailureKind,
        #[case] policy: RecoveryPolicy,
    ) {
        assert_eq!(error.kind(), kind);
        assert_eq!(error.recovery_policy(), policy);
    }

    #[test]
    fn operation_wrapper_keeps_cause() {
        let error = ManagementError::operation(Command::ApplyUpdate, violation());
        assert_eq!(error.kind(), FailureKind::ProtocolViolation);
        assert_eq!(error.command(), Some(Command::ApplyUpdate));
        assert!(matches!(error.root(), ManagementError::Wire { .. }));
        assert_eq!(
            error.to_string(),
            "apply_update failed: request header: protocol violation: expected tag 0x45, found \
             0x00"
        );
        let source = std::error::Error::source(&error).expect("wrapped cause");
        assert_eq!(source.to_string(), violation().to_string());
    }
}
