//! Channel traits consumed by the command layer.
//!
//! Every broker (the in-memory one in this crate or an SDK adapter) exposes
//! its entities through these narrow contracts. Each call takes the
//! execution's cancellation token so long-running broker work can be
//! interrupted mid-flight.

use crate::error::BrokerError;
use crate::message::{ReceivedMessage, SequenceNumber, Timestamp, WireMessage};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outbound channel: send, schedule and cancel scheduled messages
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send a message for immediate delivery
    async fn send(
        &self,
        message: &WireMessage,
        signal: &CancellationToken,
    ) -> Result<(), BrokerError>;

    /// Schedule a message for delivery at `enqueue_time`
    ///
    /// Returns the broker-assigned sequence number needed to cancel it.
    async fn schedule_message(
        &self,
        message: &WireMessage,
        enqueue_time: Timestamp,
        signal: &CancellationToken,
    ) -> Result<SequenceNumber, BrokerError>;

    /// Cancel a previously scheduled message before it is delivered
    async fn cancel_scheduled_message(
        &self,
        sequence_number: SequenceNumber,
        signal: &CancellationToken,
    ) -> Result<(), BrokerError>;

    /// Close the channel and release its broker resources
    async fn close(&self, signal: &CancellationToken) -> Result<(), BrokerError>;
}

/// Inbound pull channel
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    /// Receive the next available message
    ///
    /// Returns `Ok(None)` when the broker's receive wait elapses with nothing
    /// to deliver.
    async fn receive(
        &self,
        signal: &CancellationToken,
    ) -> Result<Option<ReceivedMessage>, BrokerError>;

    /// Close the channel and release its broker resources
    async fn close(&self, signal: &CancellationToken) -> Result<(), BrokerError>;
}

/// Push callback invoked by the broker for every delivered message.
///
/// Calls arrive on broker-managed tasks and may overlap with each other.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one delivered message
    async fn on_message(&self, message: ReceivedMessage) -> Result<(), BrokerError>;

    /// Observe an error raised while pumping messages
    async fn on_error(&self, error: BrokerError);
}

/// Inbound push channel
#[async_trait]
pub trait HandlerClient: Send + Sync {
    /// Start pushing messages to `handler`
    async fn register_message_handler(
        &self,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BrokerError>;

    /// Stop pushing messages, waiting at most `timeout` for in-flight calls
    async fn unregister_message_handler(&self, timeout: Duration) -> Result<(), BrokerError>;
}
