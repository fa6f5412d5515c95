//! # Mediator Bus
//!
//! Commands that move mediator pipeline requests and responses through a
//! message broker as a side effect of pipeline execution.
//!
//! Five commands share one execution lifecycle:
//! - [`SendMessageCommand`] sends a message for immediate delivery
//! - [`ReceiveMessageCommand`] receives one message into a hook
//! - [`ScheduleMessageCommand`] schedules a message for later delivery
//! - [`CancelMessageCommand`] cancels a scheduled message
//! - [`RegisterMessageHandlerCommand`] pushes messages into a hook until cancelled
//!
//! Callers only ever see three failures: the execution was cancelled before
//! it started, a collaborator is misconfigured, or the broker work failed.
//!
//! ## Usage
//!
//! ```rust
//! use mediator_bus::{
//!     CancelMessageCommand, MessageOptions, PipelineContext, ScheduleMessageCommand,
//! };
//! use bus_runtime::{CancellationToken, EntityName, InMemoryBroker, MessageSender};
//! use std::sync::Arc;
//!
//! # #[derive(serde::Serialize)]
//! # struct Reminder { id: u32 }
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let broker = InMemoryBroker::default();
//! let entity = EntityName::new("reminders".to_string())?;
//! let sender: Arc<dyn MessageSender> = Arc::new(broker.sender(&entity));
//!
//! let ctx = PipelineContext::new();
//! let signal = CancellationToken::new();
//!
//! let schedule = ScheduleMessageCommand::new(
//!     MessageOptions::new()
//!         .enabled(true)
//!         .with_sender_instance(Arc::clone(&sender))
//!         .with_enqueue_delay(chrono::Duration::minutes(5)),
//! )
//! .with_context(ctx.clone());
//! schedule.execute(&Reminder { id: 1 }, &signal).await?;
//!
//! let cancel = CancelMessageCommand::new(
//!     MessageOptions::new().enabled(true).with_sender_instance(sender),
//! )
//! .with_context(ctx);
//! cancel.execute(&Reminder { id: 1 }, &signal).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [command] - The command executor and its operations
//! - [options] - Per-message command configuration
//! - [context] - Per-invocation pipeline state
//! - [pipeline] - Processor and behavior adapters
//! - [settings] - File and environment settings
//! - [error] - Error types
//! - [logging] - Tracing subscriber setup

pub mod command;
pub mod context;
pub mod error;
pub mod logging;
pub mod options;
pub mod pipeline;
pub mod settings;

// Re-export commonly used types at crate root for convenience
pub use command::{
    CancelMessage, CancelMessageCommand, Command, MessageCommand, Operation, ReceiveMessage,
    ReceiveMessageCommand, RegisterMessageHandler, RegisterMessageHandlerCommand,
    ScheduleMessage, ScheduleMessageCommand, SendMessage, SendMessageCommand,
};
pub use context::PipelineContext;
pub use error::{CommandError, Dependency, HookError, PipelineError, SettingsError};
pub use options::{MessageOptions, OptionsSlot, DEFAULT_UNREGISTER_TIMEOUT};
pub use pipeline::{
    next, Next, RequestBehavior, RequestProcessor, ResponseBehavior, ResponseProcessor,
};
pub use settings::{BusSettings, MessageSettings, SlotSettings};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
