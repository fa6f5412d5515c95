use super::Operation;
use crate::context::PipelineContext;
use crate::error::{CommandError, Dependency, HookError};
use crate::options::MessageOptions;
use async_trait::async_trait;
use bus_runtime::{BrokerError, MessageSender, SequenceNumber};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancel a previously scheduled message
///
/// Needs an attached context. Without a configured lookup the oldest
/// sequence number in the context's pending queue is used, and it only
/// leaves the queue once the broker confirmed the cancellation. A failed
/// cancel can therefore be retried with the same number.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelMessage;

impl CancelMessage {
    pub const NAME: &'static str = "CancelMessageCommand";
}

pub struct PreparedCancel {
    sender: Arc<dyn MessageSender>,
    sequence_number: SequenceNumber,
    /// Taken from the context's pending queue rather than a lookup
    queued: bool,
}

#[async_trait]
impl<M> Operation<M> for CancelMessage
where
    M: Send + Sync + 'static,
{
    const NAME: &'static str = CancelMessage::NAME;

    type Prepared = PreparedCancel;

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
            .ok_or_else(|| CommandError::invalid(CancelMessage::NAME, Dependency::Sender))?;

        let ctx =
            context.ok_or_else(|| CommandError::invalid(CancelMessage::NAME, Dependency::Context))?;

        let (sequence_number, queued) = match &options.sequence_number {
            Some(lookup) => (lookup(ctx, message), false),
            None => (ctx.peek_sequence_number(), true),
        };
        let sequence_number = sequence_number.ok_or_else(|| {
            CommandError::invalid(CancelMessage::NAME, Dependency::SequenceNumber)
        })?;

        Ok(PreparedCancel {
            sender,
            sequence_number,
            queued,
        })
    }

    async fn invoke(
        &self,
        prepared: &Self::Prepared,
        _options: &MessageOptions<M>,
        _message: &M,
        context: Option<&PipelineContext>,
        signal: &CancellationToken,
    ) -> Result<(), HookError> {
        prepared
            .sender
            .cancel_scheduled_message(prepared.sequence_number, signal)
            .await?;

        if prepared.queued {
            if let Some(ctx) = context {
                ctx.remove_sequence_number(prepared.sequence_number);
            }
        }

        info!(
            command = CancelMessage::NAME,
            sequence_number = %prepared.sequence_number,
            "Scheduled message cancelled"
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
#[path = "cancel_tests.rs"]
mod tests;
