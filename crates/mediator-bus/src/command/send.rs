use super::Operation;
use crate::context::PipelineContext;
use crate::error::{CommandError, Dependency, HookError};
use crate::options::{MessageFactory, MessageOptions};
use async_trait::async_trait;
use bus_runtime::{BrokerError, MessageSender};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Send a message for immediate delivery
///
/// Requires a sender and a message factory.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendMessage;

impl SendMessage {
    pub const NAME: &'static str = "SendMessageCommand";
}

pub struct PreparedSend<M> {
    sender: Arc<dyn MessageSender>,
    factory: MessageFactory<M>,
}

#[async_trait]
impl<M> Operation<M> for SendMessage
where
    M: Send + Sync + 'static,
{
    const NAME: &'static str = SendMessage::NAME;

    type Prepared = PreparedSend<M>;

    fn prepare(
        &self,
        options: &MessageOptions<M>,
        message: &M,
        context: Option<&PipelineContext>,
    ) -> Result<Self::Prepared, CommandError> {
        let sender = options
            .sender
            .as_ref()
            .and_then(|factory| factory(message, context))
            .ok_or_else(|| CommandError::invalid(SendMessage::NAME, Dependency::Sender))?;

        let factory = options
            .message
            .clone()
            .ok_or_else(|| CommandError::invalid(SendMessage::NAME, Dependency::Message))?;

        Ok(PreparedSend { sender, factory })
    }

    async fn invoke(
        &self,
        prepared: &Self::Prepared,
        _options: &MessageOptions<M>,
        message: &M,
        context: Option<&PipelineContext>,
        signal: &CancellationToken,
    ) -> Result<(), HookError> {
        let wire = (prepared.factory)(message, context)?;
        prepared.sender.send(&wire, signal).await?;

        debug!(
            command = SendMessage::NAME,
            message_id = %wire.message_id,
            "Message sent"
        );
        Ok(())
    }

    async fn release(
        &self,
        prepared: Self::Prepared,
        _options: &MessageOptions<M>,
        cleanup: &CancellationToken,
    ) -> Result<(), BrokerError> {
        prepared.sender.close(cleanup).await
    }
}

#[cfg(test)]
#[path = "send_tests.rs"]
mod tests;
