//! Command code lookup table.
//!
//! The registry is built once at startup and only read afterwards, so it can
//! be shared across connections without synchronisation.

use std::collections::HashMap;

use thiserror::Error;

use crate::protocol::Command;

/// Errors raised while building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// A command was already registered under the code.
    #[error("command code {0:#04x} was already registered")]
    DuplicateCommand(u8),
    /// The code does not match the command's request code.
    #[error("command {command} answers to {expected:#04x}, not {code:#04x}")]
    CodeMismatch {
        /// Code passed at registration.
        code: u8,
        /// Command passed at registration.
        command: Command,
        /// Code the command actually answers to.
        expected: u8,
    },
    /// A handler was already registered under the identifier.
    #[error("handler identifier {0:#04x} was already registered")]
    DuplicateHandler(u8),
}

/// Maps command codes to the commands that handle them.
#[derive(Clone, Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<u8, Command>,
}

impl CommandRegistry {
    /// Construct an empty registry.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Construct a registry answering every [`Command`].
    #[must_use]
    pub fn standard() -> Self {
        Self {
            commands: Command::ALL
                .into_iter()
                .map(|command| (command.request_code(), command))
                .collect(),
        }
    }

    /// Register `command` under `code`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::CodeMismatch`] if `code` is not the command's
    /// request code and [`RegistryError::DuplicateCommand`] if `code` is
    /// already taken.
    pub fn register(mut self, code: u8, command: Command) -> Result<Self, RegistryError> {
        if command.request_code() != code {
            return Err(RegistryError::CodeMismatch {
                code,
                command,
                expected: command.request_code(),
            });
        }
        if self.commands.contains_key(&code) {
            return Err(RegistryError::DuplicateCommand(code));
        }
        self.commands.insert(code, command);
        Ok(self)
    }

    /// Resolve `code` to its command.
    #[must_use]
    pub fn lookup(&self, code: u8) -> Option<Command> { self.commands.get(&code).copied() }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize { self.commands.len() }

    /// Returns true if no command is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.commands.is_empty() }
}
