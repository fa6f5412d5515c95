//! In-memory broker implementation for testing and development.
//!
//! This module provides a fully functional in-memory broker that:
//! - Hands out sender, receiver and handler-client channels per entity
//! - Assigns monotonic sequence numbers across the whole broker
//! - Holds scheduled messages until their enqueue time, and cancels them
//! - Wakes waiting receivers on new messages instead of polling
//!
//! All channels created from one [`InMemoryBroker`] share its storage, so a
//! message scheduled through one sender can be cancelled through another.

use crate::client::{HandlerClient, MessageHandler, MessageReceiver, MessageSender};
use crate::error::BrokerError;
use crate::message::{EntityName, ReceivedMessage, SequenceNumber, Timestamp, WireMessage};
use crate::provider::InMemoryConfig;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Storage shared by every channel of one broker
struct BrokerStorage {
    entities: HashMap<EntityName, EntityState>,
    next_sequence_number: i64,
}

impl BrokerStorage {
    fn new() -> Self {
        Self {
            entities: HashMap::new(),
            next_sequence_number: 1,
        }
    }

    fn entity_mut(&mut self, entity: &EntityName) -> &mut EntityState {
        self.entities.entry(entity.clone()).or_default()
    }

    fn allocate_sequence_number(&mut self) -> SequenceNumber {
        let sequence_number = SequenceNumber::new(self.next_sequence_number);
        self.next_sequence_number += 1;
        sequence_number
    }
}

/// Messages held for a single queue, topic or subscription
#[derive(Default)]
struct EntityState {
    /// Available messages in delivery order
    active: VecDeque<StoredMessage>,
    /// Messages waiting for their enqueue time
    scheduled: BTreeMap<SequenceNumber, StoredMessage>,
}

impl EntityState {
    fn len(&self) -> usize {
        self.active.len() + self.scheduled.len()
    }

    /// Move every scheduled message whose enqueue time has arrived into the
    /// active queue, earliest enqueue time first.
    fn promote_due(&mut self, now: Timestamp) {
        let mut due: Vec<SequenceNumber> = self
            .scheduled
            .iter()
            .filter(|(_, stored)| stored.available_at <= now)
            .map(|(sequence_number, _)| *sequence_number)
            .collect();

        if due.is_empty() {
            return;
        }

        due.sort_by_key(|sequence_number| {
            let stored = &self.scheduled[sequence_number];
            (stored.available_at, *sequence_number)
        });

        for sequence_number in due {
            if let Some(stored) = self.scheduled.remove(&sequence_number) {
                self.active.push_back(stored);
            }
        }
    }

    fn next_scheduled_at(&self) -> Option<Timestamp> {
        self.scheduled
            .values()
            .map(|stored| stored.available_at)
            .min()
    }
}

/// A message stored by the broker with metadata
#[derive(Clone)]
struct StoredMessage {
    message: WireMessage,
    sequence_number: SequenceNumber,
    enqueued_at: Timestamp,
    available_at: Timestamp,
    delivery_count: u32,
}

impl StoredMessage {
    fn new(message: &WireMessage, sequence_number: SequenceNumber, available_at: Timestamp) -> Self {
        Self {
            message: message.clone(),
            sequence_number,
            enqueued_at: Timestamp::now(),
            available_at,
            delivery_count: 0,
        }
    }

    fn deliver(mut self) -> ReceivedMessage {
        self.delivery_count += 1;
        ReceivedMessage {
            message_id: self.message.message_id,
            sequence_number: self.sequence_number,
            body: self.message.body,
            correlation_id: self.message.correlation_id,
            content_type: self.message.content_type,
            properties: self.message.properties,
            delivery_count: self.delivery_count,
            enqueued_at: self.enqueued_at,
        }
    }
}

struct Shared {
    storage: RwLock<BrokerStorage>,
    arrivals: Notify,
    config: InMemoryConfig,
}

impl Shared {
    fn read(&self) -> RwLockReadGuard<'_, BrokerStorage> {
        self.storage.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BrokerStorage> {
        self.storage.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a message, immediately available or scheduled for `available_at`
    fn enqueue(
        &self,
        entity: &EntityName,
        message: &WireMessage,
        available_at: Option<Timestamp>,
    ) -> Result<SequenceNumber, BrokerError> {
        if message.body.len() > self.config.max_message_size {
            return Err(BrokerError::MessageTooLarge {
                size: message.body.len(),
                max_size: self.config.max_message_size,
            });
        }

        let sequence_number = {
            let mut storage = self.write();

            if storage.entity_mut(entity).len() >= self.config.max_entity_size {
                return Err(BrokerError::EntityFull {
                    entity: entity.to_string(),
                    max_size: self.config.max_entity_size,
                });
            }

            let sequence_number = storage.allocate_sequence_number();
            let state = storage.entity_mut(entity);
            match available_at {
                Some(at) => {
                    state
                        .scheduled
                        .insert(sequence_number, StoredMessage::new(message, sequence_number, at));
                }
                None => {
                    state
                        .active
                        .push_back(StoredMessage::new(message, sequence_number, Timestamp::now()));
                }
            }
            sequence_number
        };

        self.arrivals.notify_waiters();
        Ok(sequence_number)
    }
}

// ============================================================================
// InMemoryBroker
// ============================================================================

/// In-memory broker handing out channels over shared storage
#[derive(Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    /// Create new in-memory broker with configuration
    pub fn new(config: InMemoryConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                storage: RwLock::new(BrokerStorage::new()),
                arrivals: Notify::new(),
                config,
            }),
        }
    }

    /// Open a sender for `entity`
    pub fn sender(&self, entity: &EntityName) -> InMemorySender {
        InMemorySender {
            shared: Arc::clone(&self.shared),
            entity: entity.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// Open a pull receiver for `entity`
    pub fn receiver(&self, entity: &EntityName) -> InMemoryReceiver {
        InMemoryReceiver {
            shared: Arc::clone(&self.shared),
            entity: entity.clone(),
            closed: AtomicBool::new(false),
        }
    }

    /// Open a push handler client for `entity`
    pub fn handler_client(&self, entity: &EntityName) -> InMemoryHandlerClient {
        InMemoryHandlerClient {
            shared: Arc::clone(&self.shared),
            entity: entity.clone(),
            registration: Mutex::new(None),
        }
    }

    /// Number of messages available for delivery right now
    pub fn active_count(&self, entity: &EntityName) -> usize {
        self.shared
            .read()
            .entities
            .get(entity)
            .map_or(0, |state| state.active.len())
    }

    /// Number of scheduled messages not yet promoted
    pub fn scheduled_count(&self, entity: &EntityName) -> usize {
        self.shared
            .read()
            .entities
            .get(entity)
            .map_or(0, |state| state.scheduled.len())
    }

    /// Sequence numbers of pending scheduled messages, ascending
    pub fn scheduled_sequence_numbers(&self, entity: &EntityName) -> Vec<SequenceNumber> {
        self.shared
            .read()
            .entities
            .get(entity)
            .map(|state| state.scheduled.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(InMemoryConfig::default())
    }
}

// ============================================================================
// Channels
// ============================================================================

fn ensure_open(closed: &AtomicBool, entity: &EntityName) -> Result<(), BrokerError> {
    if closed.load(Ordering::SeqCst) {
        return Err(BrokerError::ChannelClosed {
            entity: entity.to_string(),
        });
    }
    Ok(())
}

fn ensure_not_cancelled(signal: &CancellationToken) -> Result<(), BrokerError> {
    if signal.is_cancelled() {
        return Err(BrokerError::Cancelled);
    }
    Ok(())
}

/// Sender channel of the in-memory broker
pub struct InMemorySender {
    shared: Arc<Shared>,
    entity: EntityName,
    closed: AtomicBool,
}

impl InMemorySender {
    pub fn entity(&self) -> &EntityName {
        &self.entity
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSender for InMemorySender {
    async fn send(
        &self,
        message: &WireMessage,
        signal: &CancellationToken,
    ) -> Result<(), BrokerError> {
        ensure_not_cancelled(signal)?;
        ensure_open(&self.closed, &self.entity)?;

        let sequence_number = self.shared.enqueue(&self.entity, message, None)?;
        debug!(entity = %self.entity, sequence_number = %sequence_number, "Message sent");
        Ok(())
    }

    async fn schedule_message(
        &self,
        message: &WireMessage,
        enqueue_time: Timestamp,
        signal: &CancellationToken,
    ) -> Result<SequenceNumber, BrokerError> {
        ensure_not_cancelled(signal)?;
        ensure_open(&self.closed, &self.entity)?;

        let sequence_number = self
            .shared
            .enqueue(&self.entity, message, Some(enqueue_time))?;
        debug!(
            entity = %self.entity,
            sequence_number = %sequence_number,
            enqueue_time = %enqueue_time,
            "Message scheduled"
        );
        Ok(sequence_number)
    }

    async fn cancel_scheduled_message(
        &self,
        sequence_number: SequenceNumber,
        signal: &CancellationToken,
    ) -> Result<(), BrokerError> {
        ensure_not_cancelled(signal)?;
        ensure_open(&self.closed, &self.entity)?;

        let removed = self
            .shared
            .write()
            .entity_mut(&self.entity)
            .scheduled
            .remove(&sequence_number);

        match removed {
            Some(_) => {
                debug!(entity = %self.entity, sequence_number = %sequence_number, "Scheduled message cancelled");
                Ok(())
            }
            None => Err(BrokerError::ScheduledMessageNotFound {
                entity: self.entity.to_string(),
                sequence_number,
            }),
        }
    }

    async fn close(&self, _signal: &CancellationToken) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Pull receiver channel of the in-memory broker
pub struct InMemoryReceiver {
    shared: Arc<Shared>,
    entity: EntityName,
    closed: AtomicBool,
}

impl InMemoryReceiver {
    pub fn entity(&self) -> &EntityName {
        &self.entity
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageReceiver for InMemoryReceiver {
    async fn receive(
        &self,
        signal: &CancellationToken,
    ) -> Result<Option<ReceivedMessage>, BrokerError> {
        ensure_not_cancelled(signal)?;
        ensure_open(&self.closed, &self.entity)?;

        let deadline = Instant::now() + self.shared.config.receive_timeout();

        loop {
            // Register interest before inspecting storage so an arrival
            // between the check and the wait is not missed.
            let arrival = self.shared.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            let next_due = {
                let mut storage = self.shared.write();
                let state = storage.entity_mut(&self.entity);
                state.promote_due(Timestamp::now());

                if let Some(stored) = state.active.pop_front() {
                    return Ok(Some(stored.deliver()));
                }

                state.next_scheduled_at()
            };

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }

            let wake_at = match next_due {
                Some(at) => {
                    let until_due = at.duration_until().to_std().unwrap_or(Duration::ZERO);
                    deadline.min(now + until_due)
                }
                None => deadline,
            };

            tokio::select! {
                _ = signal.cancelled() => return Err(BrokerError::Cancelled),
                _ = &mut arrival => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn close(&self, _signal: &CancellationToken) -> Result<(), BrokerError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct Registration {
    stop: CancellationToken,
    task: JoinHandle<()>,
}

/// Push handler client of the in-memory broker
pub struct InMemoryHandlerClient {
    shared: Arc<Shared>,
    entity: EntityName,
    registration: Mutex<Option<Registration>>,
}

impl InMemoryHandlerClient {
    pub fn entity(&self) -> &EntityName {
        &self.entity
    }

    pub async fn is_registered(&self) -> bool {
        self.registration.lock().await.is_some()
    }
}

/// Deliver messages to `handler` until `stop` is cancelled
async fn pump(receiver: InMemoryReceiver, handler: Arc<dyn MessageHandler>, stop: CancellationToken) {
    while !stop.is_cancelled() {
        match receiver.receive(&stop).await {
            Ok(Some(message)) => {
                let sequence_number = message.sequence_number;
                if let Err(error) = handler.on_message(message).await {
                    debug!(
                        entity = %receiver.entity,
                        sequence_number = %sequence_number,
                        error = %error,
                        "Message handler failed"
                    );
                    handler.on_error(error).await;
                }
            }
            Ok(None) => {}
            Err(BrokerError::Cancelled) => break,
            Err(error) => {
                handler.on_error(error).await;
                break;
            }
        }
    }
}

#[async_trait]
impl HandlerClient for InMemoryHandlerClient {
    async fn register_message_handler(
        &self,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BrokerError> {
        let mut registration = self.registration.lock().await;
        if registration.is_some() {
            return Err(BrokerError::HandlerAlreadyRegistered {
                entity: self.entity.to_string(),
            });
        }

        let receiver = InMemoryReceiver {
            shared: Arc::clone(&self.shared),
            entity: self.entity.clone(),
            closed: AtomicBool::new(false),
        };
        let stop = CancellationToken::new();
        let task = tokio::spawn(pump(receiver, handler, stop.clone()));

        debug!(entity = %self.entity, "Message handler registered");
        *registration = Some(Registration { stop, task });
        Ok(())
    }

    async fn unregister_message_handler(&self, timeout: Duration) -> Result<(), BrokerError> {
        let Some(Registration { stop, mut task }) = self.registration.lock().await.take() else {
            return Ok(());
        };

        stop.cancel();

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => {
                debug!(entity = %self.entity, "Message handler unregistered");
                Ok(())
            }
            Ok(Err(join_error)) => Err(BrokerError::HandlerFailed {
                message: join_error.to_string(),
            }),
            Err(_) => {
                task.abort();
                Err(BrokerError::Timeout {
                    duration: chrono::Duration::from_std(timeout)
                        .unwrap_or_else(|_| chrono::Duration::zero()),
                })
            }
        }
    }
}
