//! Per-message-type command configuration.
//!
//! A [`MessageOptions`] snapshot is resolved once per pipeline slot and read
//! (never mutated) by the commands built from it. Every collaborator is an
//! `Option`: `None` means "not configured" and the command that needs it
//! reports an `InvalidConfiguration` error naming the dependency.

use crate::context::PipelineContext;
use crate::error::HookError;
use crate::settings::BusSettings;
use bus_runtime::{
    HandlerClient, MessageReceiver, MessageSender, ReceivedMessage, SequenceNumber, Timestamp,
    WireMessage,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Resolves the outbound channel for a message
pub type SenderFactory<M> =
    Arc<dyn Fn(&M, Option<&PipelineContext>) -> Option<Arc<dyn MessageSender>> + Send + Sync>;

/// Resolves the inbound pull channel for a message
pub type ReceiverFactory<M> =
    Arc<dyn Fn(&M, Option<&PipelineContext>) -> Option<Arc<dyn MessageReceiver>> + Send + Sync>;

/// Resolves the inbound push channel for a message
pub type HandlerClientFactory<M> =
    Arc<dyn Fn(&M, Option<&PipelineContext>) -> Option<Arc<dyn HandlerClient>> + Send + Sync>;

/// Materializes the wire payload for a domain message
pub type MessageFactory<M> =
    Arc<dyn Fn(&M, Option<&PipelineContext>) -> Result<WireMessage, HookError> + Send + Sync>;

/// Resolves when a scheduled message should be enqueued
pub type EnqueueTimeResolver<M> =
    Arc<dyn Fn(&M, Option<&PipelineContext>) -> Option<Timestamp> + Send + Sync>;

/// Invoked after a message has been received
pub type ReceivedHook<M> = Arc<
    dyn Fn(&ReceivedMessage, Option<&PipelineContext>, &M) -> Result<(), HookError> + Send + Sync,
>;

/// Invoked after a message has been scheduled
pub type ScheduledHook<M> = Arc<
    dyn Fn(SequenceNumber, &WireMessage, Option<&PipelineContext>, &M) -> Result<(), HookError>
        + Send
        + Sync,
>;

/// Selects the scheduled message a cancel command should cancel
pub type SequenceNumberLookup<M> =
    Arc<dyn Fn(&PipelineContext, &M) -> Option<SequenceNumber> + Send + Sync>;

/// Default time allowed for a push handler to stop
pub const DEFAULT_UNREGISTER_TIMEOUT: Duration = Duration::from_millis(100);

/// Named configuration slot an options snapshot belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionsSlot {
    /// Pre- and post-processors
    Processors,
    /// Pipeline behaviors
    Behaviors,
}

impl OptionsSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processors => "Processors",
            Self::Behaviors => "Behaviors",
        }
    }
}

impl fmt::Display for OptionsSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for commands handling messages of type `M`
pub struct MessageOptions<M> {
    /// Master switch; a disabled command returns without doing anything
    pub enabled: bool,
    pub sender: Option<SenderFactory<M>>,
    pub receiver: Option<ReceiverFactory<M>>,
    pub handler_client: Option<HandlerClientFactory<M>>,
    /// Wire payload factory; schedule falls back to JSON when absent
    pub message: Option<MessageFactory<M>>,
    /// Required by schedule, never defaulted
    pub enqueue_time: Option<EnqueueTimeResolver<M>>,
    pub on_received: Option<ReceivedHook<M>>,
    pub on_scheduled: Option<ScheduledHook<M>>,
    /// Cancel falls back to the context's pending queue when absent
    pub sequence_number: Option<SequenceNumberLookup<M>>,
    /// How long a push handler may take to stop
    pub unregister_timeout: Duration,
}

impl<M> MessageOptions<M> {
    /// Create disabled options with no collaborators configured
    pub fn new() -> Self {
        Self {
            enabled: false,
            sender: None,
            receiver: None,
            handler_client: None,
            message: None,
            enqueue_time: None,
            on_received: None,
            on_scheduled: None,
            sequence_number: None,
            unregister_timeout: DEFAULT_UNREGISTER_TIMEOUT,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_sender<F>(mut self, factory: F) -> Self
    where
        F: Fn(&M, Option<&PipelineContext>) -> Option<Arc<dyn MessageSender>>
            + Send
            + Sync
            + 'static,
    {
        self.sender = Some(Arc::new(factory));
        self
    }

    /// Use one sender for every message
    pub fn with_sender_instance(self, sender: Arc<dyn MessageSender>) -> Self {
        self.with_sender(move |_, _| Some(Arc::clone(&sender)))
    }

    pub fn with_receiver<F>(mut self, factory: F) -> Self
    where
        F: Fn(&M, Option<&PipelineContext>) -> Option<Arc<dyn MessageReceiver>>
            + Send
            + Sync
            + 'static,
    {
        self.receiver = Some(Arc::new(factory));
        self
    }

    /// Use one receiver for every message
    pub fn with_receiver_instance(self, receiver: Arc<dyn MessageReceiver>) -> Self {
        self.with_receiver(move |_, _| Some(Arc::clone(&receiver)))
    }

    pub fn with_handler_client<F>(mut self, factory: F) -> Self
    where
        F: Fn(&M, Option<&PipelineContext>) -> Option<Arc<dyn HandlerClient>>
            + Send
            + Sync
            + 'static,
    {
        self.handler_client = Some(Arc::new(factory));
        self
    }

    /// Use one handler client for every message
    pub fn with_handler_client_instance(self, client: Arc<dyn HandlerClient>) -> Self {
        self.with_handler_client(move |_, _| Some(Arc::clone(&client)))
    }

    pub fn with_message<F>(mut self, factory: F) -> Self
    where
        F: Fn(&M, Option<&PipelineContext>) -> Result<WireMessage, HookError>
            + Send
            + Sync
            + 'static,
    {
        self.message = Some(Arc::new(factory));
        self
    }

    pub fn with_enqueue_time<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&M, Option<&PipelineContext>) -> Option<Timestamp> + Send + Sync + 'static,
    {
        self.enqueue_time = Some(Arc::new(resolver));
        self
    }

    /// Enqueue at `delay` after the moment the command resolves the time
    pub fn with_enqueue_delay(self, delay: chrono::Duration) -> Self {
        self.with_enqueue_time(move |_, _| Some(Timestamp::from_now(delay)))
    }

    /// Read the enqueue time from the context's enqueue time slot
    pub fn with_enqueue_time_from_context(self) -> Self {
        self.with_enqueue_time(|_, ctx| ctx.and_then(PipelineContext::enqueue_time))
    }

    pub fn on_received<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ReceivedMessage, Option<&PipelineContext>, &M) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    {
        self.on_received = Some(Arc::new(hook));
        self
    }

    pub fn on_scheduled<F>(mut self, hook: F) -> Self
    where
        F: Fn(SequenceNumber, &WireMessage, Option<&PipelineContext>, &M) -> Result<(), HookError>
            + Send
            + Sync
            + 'static,
    {
        self.on_scheduled = Some(Arc::new(hook));
        self
    }

    pub fn with_sequence_number<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&PipelineContext, &M) -> Option<SequenceNumber> + Send + Sync + 'static,
    {
        self.sequence_number = Some(Arc::new(lookup));
        self
    }

    pub fn with_unregister_timeout(mut self, timeout: Duration) -> Self {
        self.unregister_timeout = timeout;
        self
    }

    /// Overlay the settings configured for `key` in `slot`
    ///
    /// Settings only switch the options on or off and tune timings. Channels
    /// and hooks always come from code.
    pub fn apply_settings(mut self, settings: &BusSettings, slot: OptionsSlot, key: &str) -> Self {
        self.enabled = settings.resolve_enabled(slot, key, self.enabled);

        if let Some(message_settings) = settings.message(slot, key) {
            if let Some(delay) = message_settings.enqueue_delay() {
                self = self.with_enqueue_delay(delay);
            }
            if let Some(timeout) = message_settings.unregister_timeout() {
                self.unregister_timeout = timeout;
            }
        }

        self
    }
}

impl<M> Default for MessageOptions<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for MessageOptions<M> {
    fn clone(&self) -> Self {
        Self {
            enabled: self.enabled,
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
            handler_client: self.handler_client.clone(),
            message: self.message.clone(),
            enqueue_time: self.enqueue_time.clone(),
            on_received: self.on_received.clone(),
            on_scheduled: self.on_scheduled.clone(),
            sequence_number: self.sequence_number.clone(),
            unregister_timeout: self.unregister_timeout,
        }
    }
}

impl<M> fmt::Debug for MessageOptions<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageOptions")
            .field("enabled", &self.enabled)
            .field("sender", &self.sender.is_some())
            .field("receiver", &self.receiver.is_some())
            .field("handler_client", &self.handler_client.is_some())
            .field("message", &self.message.is_some())
            .field("enqueue_time", &self.enqueue_time.is_some())
            .field("on_received", &self.on_received.is_some())
            .field("on_scheduled", &self.on_scheduled.is_some())
            .field("sequence_number", &self.sequence_number.is_some())
            .field("unregister_timeout", &self.unregister_timeout)
            .finish()
    }
}

#[cfg(test)]
#[path = "options_tests.rs"]
mod tests;
