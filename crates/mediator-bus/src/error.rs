//! Error types surfaced by commands and pipeline adapters.
//!
//! Callers of a command only ever observe three outcomes: the execution was
//! cancelled before it started, the command was misconfigured, or the broker
//! work failed. The first two are detected before any broker call is made.

use bus_runtime::BrokerError;
use std::fmt;
use thiserror::Error;

/// Error raised by caller-supplied hooks and message factories
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Collaborator a command needs before it can talk to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependency {
    Sender,
    Receiver,
    HandlerClient,
    Message,
    EnqueueTime,
    Context,
    SequenceNumber,
}

impl Dependency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sender => "Sender",
            Self::Receiver => "Receiver",
            Self::HandlerClient => "HandlerClient",
            Self::Message => "Message",
            Self::EnqueueTime => "EnqueueTime",
            Self::Context => "Context",
            Self::SequenceNumber => "SequenceNumber",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a failed command execution
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command {command} was cancelled")]
    Cancelled { command: &'static str },

    #[error("Command {command} requires a valid {dependency}")]
    InvalidConfiguration {
        command: &'static str,
        dependency: Dependency,
    },

    #[error("Command {command} failed, see inner error for details")]
    CommandFailed {
        command: &'static str,
        #[source]
        source: HookError,
    },
}

impl CommandError {
    pub(crate) fn invalid(command: &'static str, dependency: Dependency) -> Self {
        Self::InvalidConfiguration {
            command,
            dependency,
        }
    }

    /// Name of the command that produced the error
    pub fn command(&self) -> &'static str {
        match self {
            Self::Cancelled { command }
            | Self::InvalidConfiguration { command, .. }
            | Self::CommandFailed { command, .. } => command,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Missing dependency, if this is a configuration error
    pub fn missing_dependency(&self) -> Option<Dependency> {
        match self {
            Self::InvalidConfiguration { dependency, .. } => Some(*dependency),
            _ => None,
        }
    }

    /// Broker error wrapped by a failed command, if the cause came from the broker
    pub fn broker_error(&self) -> Option<&BrokerError> {
        match self {
            Self::CommandFailed { source, .. } => source.downcast_ref::<BrokerError>(),
            _ => None,
        }
    }

    /// Check if the failure is transient and the caller may retry
    ///
    /// Only broker failures can be transient; configuration errors and
    /// cancellations never are.
    pub fn is_transient(&self) -> bool {
        self.broker_error().is_some_and(BrokerError::is_transient)
    }
}

/// Errors from a mediator pipeline that wraps commands around a handler
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("Request handler failed: {0}")]
    Handler(#[source] HookError),
}

/// Errors while loading or validating settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration for {key}: {message}")]
    Invalid { key: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
