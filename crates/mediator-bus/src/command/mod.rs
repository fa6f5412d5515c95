//! Broker commands and their shared execution lifecycle.
//!
//! Every command runs the same ordered steps:
//!
//! 1. fail with [`CommandError::Cancelled`] if the signal already fired
//! 2. return early when the options are disabled
//! 3. resolve and validate collaborators ([`Operation::prepare`])
//! 4. materialize the wire message, call the broker and run the post-hook
//!    ([`Operation::invoke`])
//! 5. release the resolved channel ([`Operation::release`]), whatever step 4
//!    returned. Release gets its own token, so an execution cancelled
//!    mid-call still closes its channel
//!
//! Failures from steps 4 and 5 are logged at debug level and wrapped in
//! [`CommandError::CommandFailed`]. Validation failures from step 3 surface
//! as-is and never reach the broker.

use crate::context::PipelineContext;
use crate::error::{CommandError, HookError};
use crate::options::MessageOptions;
use async_trait::async_trait;
use bus_runtime::BrokerError;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;
use tracing::debug;

mod cancel;
mod receive;
mod register;
mod schedule;
mod send;

pub use cancel::CancelMessage;
pub use receive::ReceiveMessage;
pub use register::RegisterMessageHandler;
pub use schedule::ScheduleMessage;
pub use send::SendMessage;

/// Sends a message for immediate delivery
pub type SendMessageCommand<M> = Command<M, SendMessage>;
/// Receives one message and hands it to the `on_received` hook
pub type ReceiveMessageCommand<M> = Command<M, ReceiveMessage>;
/// Schedules a message and records its sequence number
pub type ScheduleMessageCommand<M> = Command<M, ScheduleMessage>;
/// Cancels a previously scheduled message
pub type CancelMessageCommand<M> = Command<M, CancelMessage>;
/// Pushes messages to the `on_received` hook until cancelled
pub type RegisterMessageHandlerCommand<M> = Command<M, RegisterMessageHandler>;

/// Broker operation plugged into the shared command lifecycle
#[async_trait]
pub trait Operation<M>: Send + Sync
where
    M: Send + Sync + 'static,
{
    /// Name used in errors and log records
    const NAME: &'static str;

    /// Collaborators resolved by [`prepare`](Operation::prepare)
    type Prepared: Send + Sync;

    /// Resolve and validate everything the broker call needs
    ///
    /// Only returns `CommandError::InvalidConfiguration`. Nothing resolved
    /// here has been used yet, so a failure needs no cleanup.
    fn prepare(
        &self,
        options: &MessageOptions<M>,
        message: &M,
        context: Option<&PipelineContext>,
    ) -> Result<Self::Prepared, CommandError>;

    /// Materialize, call the broker and run the post-hook
    async fn invoke(
        &self,
        prepared: &Self::Prepared,
        options: &MessageOptions<M>,
        message: &M,
        context: Option<&PipelineContext>,
        signal: &CancellationToken,
    ) -> Result<(), HookError>;

    /// Close or unregister the channel resolved by `prepare`
    ///
    /// `cleanup` is never the execution's signal and is never cancelled.
    async fn release(
        &self,
        prepared: Self::Prepared,
        options: &MessageOptions<M>,
        cleanup: &CancellationToken,
    ) -> Result<(), BrokerError>;
}

/// Object-safe view of a command for pipeline adapters
#[async_trait]
pub trait MessageCommand<M>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, message: &M, signal: &CancellationToken) -> Result<(), CommandError>;
}

/// Generic executor running one [`Operation`] under the shared lifecycle
pub struct Command<M, O> {
    options: MessageOptions<M>,
    context: Option<PipelineContext>,
    operation: O,
    _message: PhantomData<fn(&M)>,
}

impl<M, O> Command<M, O>
where
    M: Send + Sync + 'static,
    O: Operation<M> + Default,
{
    pub fn new(options: MessageOptions<M>) -> Self {
        Self {
            options,
            context: None,
            operation: O::default(),
            _message: PhantomData,
        }
    }
}

impl<M, O> Command<M, O>
where
    M: Send + Sync + 'static,
    O: Operation<M>,
{
    /// Attach the context of the pipeline invocation this command runs in
    pub fn with_context(mut self, context: PipelineContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn name(&self) -> &'static str {
        O::NAME
    }

    pub fn options(&self) -> &MessageOptions<M> {
        &self.options
    }

    pub fn context(&self) -> Option<&PipelineContext> {
        self.context.as_ref()
    }

    /// Run the command for `message`
    ///
    /// # Errors
    ///
    /// - `Cancelled` if `signal` fired before the command started
    /// - `InvalidConfiguration` if a required collaborator is missing or invalid
    /// - `CommandFailed` if the broker call, a hook or the release step failed
    pub async fn execute(
        &self,
        message: &M,
        signal: &CancellationToken,
    ) -> Result<(), CommandError> {
        if signal.is_cancelled() {
            return Err(CommandError::Cancelled { command: O::NAME });
        }

        if !self.options.enabled {
            debug!(command = O::NAME, "Command is not enabled, returning");
            return Ok(());
        }

        let context = self.context.as_ref();
        let prepared = self.operation.prepare(&self.options, message, context)?;

        let outcome = self
            .operation
            .invoke(&prepared, &self.options, message, context, signal)
            .await;
        let cleanup = CancellationToken::new();
        let released = self
            .operation
            .release(prepared, &self.options, &cleanup)
            .await;

        match (outcome, released) {
            (Ok(()), Ok(())) => {
                debug!(command = O::NAME, "Command completed");
                Ok(())
            }
            (Ok(()), Err(error)) => Err(self.failed(Box::new(error))),
            (Err(error), released) => {
                if let Err(release_error) = released {
                    debug!(
                        command = O::NAME,
                        error = %release_error,
                        "Releasing the channel failed after an earlier failure"
                    );
                }
                Err(self.failed(error))
            }
        }
    }

    fn failed(&self, source: HookError) -> CommandError {
        debug!(command = O::NAME, error = %source, "Command failed");
        CommandError::CommandFailed {
            command: O::NAME,
            source,
        }
    }
}

impl<M, O> Clone for Command<M, O>
where
    O: Clone,
{
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
            context: self.context.clone(),
            operation: self.operation.clone(),
            _message: PhantomData,
        }
    }
}

impl<M, O> std::fmt::Debug for Command<M, O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("operation", &std::any::type_name::<O>())
            .field("options", &self.options)
            .field("context", &self.context)
            .finish()
    }
}

#[async_trait]
impl<M, O> MessageCommand<M> for Command<M, O>
where
    M: Send + Sync + 'static,
    O: Operation<M>,
{
    fn name(&self) -> &'static str {
        O::NAME
    }

    async fn execute(&self, message: &M, signal: &CancellationToken) -> Result<(), CommandError> {
        Command::execute(self, message, signal).await
    }
}

#[cfg(test)]
mod fakes;

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
