use super::Operation;
use crate::context::PipelineContext;
use crate::error::{CommandError, Dependency, HookError};
use crate::options::{MessageOptions, ReceivedHook};
use async_trait::async_trait;
use bus_runtime::{BrokerError, HandlerClient, MessageHandler, ReceivedMessage};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Push received messages to the `on_received` hook until cancelled
///
/// The command registers a handler, waits for the execution's signal to
/// fire and then unregisters, allowing `unregister_timeout` for in-flight
/// deliveries to finish. Cancellation is the normal way to end it, so it
/// returns `Ok(())` once the signal fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterMessageHandler;

impl RegisterMessageHandler {
    pub const NAME: &'static str = "RegisterMessageHandlerCommand";
}

/// Bridges broker deliveries to the options' `on_received` hook
struct ForwardingHandler<M> {
    message: M,
    context: Option<PipelineContext>,
    on_received: Option<ReceivedHook<M>>,
}

#[async_trait]
impl<M> MessageHandler for ForwardingHandler<M>
where
    M: Send + Sync + 'static,
{
    async fn on_message(&self, received: ReceivedMessage) -> Result<(), BrokerError> {
        debug!(
            command = RegisterMessageHandler::NAME,
            sequence_number = %received.sequence_number,
            message_id = %received.message_id,
            "Message pushed"
        );

        if let Some(hook) = &self.on_received {
            hook(&received, self.context.as_ref(), &self.message).map_err(|error| {
                BrokerError::HandlerFailed {
                    message: error.to_string(),
                }
            })?;
        }

        Ok(())
    }

    async fn on_error(&self, error: BrokerError) {
        debug!(
            command = RegisterMessageHandler::NAME,
            error = %error,
            "Message handler reported an error"
        );
    }
}

#[async_trait]
impl<M> Operation<M> for RegisterMessageHandler
where
    M: Clone + Send + Sync + 'static,
{
    const NAME: &'static str = RegisterMessageHandler::NAME;

    type Prepared = Arc<dyn HandlerClient>;

    fn prepare(
        &self,
        options: &MessageOptions<M>,
        message: &M,
        context: Option<&PipelineContext>,
    ) -> Result<Self::Prepared, CommandError> {
        options
            .handler_client
            .as_ref()
            .and_then(|factory| factory(message, context))
            .ok_or_else(|| {
                CommandError::invalid(RegisterMessageHandler::NAME, Dependency::HandlerClient)
            })
    }

    async fn invoke(
        &self,
        client: &Self::Prepared,
        options: &MessageOptions<M>,
        message: &M,
        context: Option<&PipelineContext>,
        signal: &CancellationToken,
    ) -> Result<(), HookError> {
        let handler = ForwardingHandler {
            message: message.clone(),
            context: context.cloned(),
            on_received: options.on_received.clone(),
        };

        client.register_message_handler(Arc::new(handler)).await?;
        debug!(
            command = RegisterMessageHandler::NAME,
            "Handler registered, waiting for cancellation"
        );

        signal.cancelled().await;
        Ok(())
    }

    async fn release(
        &self,
        client: Self::Prepared,
        options: &MessageOptions<M>,
        _cleanup: &CancellationToken,
    ) -> Result<(), BrokerError> {
        client
            .unregister_message_handler(options.unregister_timeout)
            .await
    }
}

#[cfg(test)]
#[path = "register_tests.rs"]
mod tests;
