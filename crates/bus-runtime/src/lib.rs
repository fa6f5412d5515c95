//! # Bus Runtime
//!
//! Broker channel contracts consumed by the `mediator-bus` command layer,
//! together with an in-memory broker implementing them.
//!
//! This library provides:
//! - Sender, receiver and push-handler channel traits
//! - Wire message types, sequence numbers and timestamps
//! - A single broker error type with transience classification
//! - An in-memory broker supporting send, receive, schedule and cancel
//!
//! ## Module Organization
//!
//! - [error] - Error types for all broker operations
//! - [message] - Wire messages and identifiers
//! - [client] - Channel traits
//! - [provider] - Provider configuration
//! - [providers] - Broker implementations

pub mod client;
pub mod error;
pub mod message;
pub mod provider;
pub mod providers;

// Re-export commonly used types at crate root for convenience
pub use client::{HandlerClient, MessageHandler, MessageReceiver, MessageSender};
pub use error::{BrokerError, SerializationError, ValidationError};
pub use message::{
    EntityName, MessageId, ReceivedMessage, SequenceNumber, Timestamp, WireMessage,
    JSON_CONTENT_TYPE,
};
pub use provider::InMemoryConfig;
pub use providers::{InMemoryBroker, InMemoryHandlerClient, InMemoryReceiver, InMemorySender};
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
