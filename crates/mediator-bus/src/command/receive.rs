use super::Operation;
use crate::context::PipelineContext;
use crate::error::{CommandError, Dependency, HookError};
use crate::options::MessageOptions;
use async_trait::async_trait;
use bus_runtime::{BrokerError, MessageReceiver};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Receive one message and pass it to the `on_received` hook
///
/// An empty receive (the broker's wait elapsed) succeeds without calling
/// the hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiveMessage;

impl ReceiveMessage {
    pub const NAME: &'static str = "ReceiveMessageCommand";
}

#[async_trait]
impl<M> Operation<M> for ReceiveMessage
where
    M: Send + Sync + 'static,
{
    const NAME: &'static str = ReceiveMessage::NAME;

    type Prepared = Arc<dyn MessageReceiver>;

    fn prepare(
        &self,
        options: &MessageOptions<M>,
        message: &M,
        context: Option<&PipelineContext>,
    ) -> Result<Self::Prepared, CommandError> {
        options
            .receiver
            .as_ref()
            .and_then(|factory| factory(message, context))
            .ok_or_else(|| CommandError::invalid(ReceiveMessage::NAME, Dependency::Receiver))
    }

    async fn invoke(
        &self,
        receiver: &Self::Prepared,
        options: &MessageOptions<M>,
        message: &M,
        context: Option<&PipelineContext>,
        signal: &CancellationToken,
    ) -> Result<(), HookError> {
        let Some(received) = receiver.receive(signal).await? else {
            debug!(command = ReceiveMessage::NAME, "No message available");
            return Ok(());
        };

        debug!(
            command = ReceiveMessage::NAME,
            sequence_number = %received.sequence_number,
            message_id = %received.message_id,
            "Message received"
        );

        if let Some(hook) = &options.on_received {
            hook(&received, context, message)?;
        }

        Ok(())
    }

    async fn release(
        &self,
        receiver: Self::Prepared,
        _options: &MessageOptions<M>,
        cleanup: &CancellationToken,
    ) -> Result<(), BrokerError> {
        receiver.close(cleanup).await
    }
}

#[cfg(test)]
#[path = "receive_tests.rs"]
mod tests;
