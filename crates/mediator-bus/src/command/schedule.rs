use super::Operation;
use crate::context::PipelineContext;
use crate::error::{CommandError, Dependency, HookError};
use crate::options::MessageOptions;
use async_trait::async_trait;
use bus_runtime::{BrokerError, MessageSender, Timestamp, WireMessage};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Schedule a message for delivery at a future enqueue time
///
/// The body defaults to the JSON encoding of the domain message when no
/// message factory is configured. The enqueue time is never defaulted: it
/// must be present and not earlier than now.
///
/// Each broker-assigned sequence number is pushed onto the context's
/// pending queue (when a context is attached) before `on_scheduled` runs,
/// so a later cancel in the same pipeline can find it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScheduleMessage;

impl ScheduleMessage {
    pub const NAME: &'static str = "ScheduleMessageCommand";
}

pub struct PreparedSchedule {
    sender: Arc<dyn MessageSender>,
    enqueue_time: Timestamp,
}

#[async_trait]
impl<M> Operation<M> for ScheduleMessage
where
    M: Serialize + Send + Sync + 'static,
{
    const NAME: &'static str = ScheduleMessage::NAME;

    type Prepared = PreparedSchedule;

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
            .ok_or_else(|| CommandError::invalid(ScheduleMessage::NAME, Dependency::Sender))?;

        let enqueue_time = options
            .enqueue_time
            .as_ref()
            .and_then(|resolve| resolve(message, context))
            .filter(|at| !at.is_past())
            .ok_or_else(|| {
                CommandError::invalid(ScheduleMessage::NAME, Dependency::EnqueueTime)
            })?;

        Ok(PreparedSchedule {
            sender,
            enqueue_time,
        })
    }

    async fn invoke(
        &self,
        prepared: &Self::Prepared,
        options: &MessageOptions<M>,
        message: &M,
        context: Option<&PipelineContext>,
        signal: &CancellationToken,
    ) -> Result<(), HookError> {
        let wire = match &options.message {
            Some(factory) => factory(message, context)?,
            None => WireMessage::json(message)?,
        }
        .with_scheduled_enqueue_time(prepared.enqueue_time);

        let sequence_number = prepared
            .sender
            .schedule_message(&wire, prepared.enqueue_time, signal)
            .await?;

        debug!(
            command = ScheduleMessage::NAME,
            sequence_number = %sequence_number,
            enqueue_time = %prepared.enqueue_time,
            "Message scheduled"
        );

        if let Some(ctx) = context {
            ctx.push_sequence_number(sequence_number);
        }

        if let Some(hook) = &options.on_scheduled {
            hook(sequence_number, &wire, context, message)?;
        }

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
#[path = "schedule_tests.rs"]
mod tests;
