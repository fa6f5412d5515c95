//! Error types for broker channel operations.

use crate::message::SequenceNumber;
use chrono::Duration;
use thiserror::Error;

/// Comprehensive error type for all broker channel operations
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Entity not found: {entity}")]
    EntityNotFound { entity: String },

    #[error("Scheduled message {sequence_number} not found on '{entity}'")]
    ScheduledMessageNotFound {
        entity: String,
        sequence_number: SequenceNumber,
    },

    #[error("Channel for '{entity}' is closed")]
    ChannelClosed { entity: String },

    #[error("A message handler is already registered for '{entity}'")]
    HandlerAlreadyRegistered { entity: String },

    #[error("Entity '{entity}' is full ({max_size} messages)")]
    EntityFull { entity: String, max_size: usize },

    #[error("Message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Message handler failed: {message}")]
    HandlerFailed { message: String },

    #[error("Provider error ({provider}): {code} - {message}")]
    ProviderError {
        provider: String,
        code: String,
        message: String,
    },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] SerializationError),
}

impl BrokerError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::EntityNotFound { .. } => false,
            Self::ScheduledMessageNotFound { .. } => false,
            Self::ChannelClosed { .. } => false,
            Self::HandlerAlreadyRegistered { .. } => false,
            Self::EntityFull { .. } => true,
            Self::MessageTooLarge { .. } => false,
            Self::Timeout { .. } => true,
            Self::ConnectionFailed { .. } => true,
            Self::Cancelled => false,
            Self::HandlerFailed { .. } => false,
            Self::ProviderError { .. } => true,
            Self::Serialization(_) => false,
        }
    }

    /// Get suggested retry delay
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::EntityFull { .. } => Some(Duration::seconds(1)),
            Self::Timeout { .. } => Some(Duration::seconds(1)),
            Self::ConnectionFailed { .. } => Some(Duration::seconds(5)),
            _ => None,
        }
    }
}

/// Errors during message serialization/deserialization
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Message body is not valid UTF-8")]
    InvalidUtf8,
}

/// Validation errors for broker identifiers
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },

    #[error("Invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("Value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
