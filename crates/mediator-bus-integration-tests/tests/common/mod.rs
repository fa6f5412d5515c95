//! Common test utilities for mediator-bus integration tests
//!
//! This module provides:
//! - A broker fixture with short receive waits
//! - Shared message types
//! - An inbox recording messages delivered to hooks

use bus_runtime::{
    EntityName, HandlerClient, InMemoryBroker, InMemoryConfig, MessageReceiver, MessageSender,
    ReceivedMessage, WireMessage,
};
use mediator_bus::{HookError, MessageOptions, PipelineContext};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Test Data
// ============================================================================

/// Request flowing through the pipeline in most tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: String,
    pub quantity: u32,
}

#[allow(dead_code)]
pub fn order(order_id: &str) -> OrderPlaced {
    OrderPlaced {
        order_id: order_id.to_string(),
        quantity: 1,
    }
}

/// Encode the request as the wire body
#[allow(dead_code)]
pub fn order_body(
    order: &OrderPlaced,
    _ctx: Option<&PipelineContext>,
) -> Result<WireMessage, HookError> {
    Ok(WireMessage::json(order)?)
}

// ============================================================================
// Broker Fixture
// ============================================================================

/// In-memory broker plus the entity every test talks to
#[derive(Clone)]
pub struct TestBroker {
    pub broker: InMemoryBroker,
    pub entity: EntityName,
}

impl TestBroker {
    /// Broker whose receives give up after `receive_timeout`
    pub fn new(receive_timeout: Duration) -> Self {
        let config = InMemoryConfig {
            receive_timeout_ms: receive_timeout.as_millis() as u64,
            ..InMemoryConfig::default()
        };

        Self {
            broker: InMemoryBroker::new(config),
            entity: EntityName::new("orders".to_string()).expect("valid entity name"),
        }
    }

    /// Options opening a fresh sender for every execution
    #[allow(dead_code)]
    pub fn sender_options(&self) -> MessageOptions<OrderPlaced> {
        let (broker, entity) = (self.broker.clone(), self.entity.clone());
        MessageOptions::new().enabled(true).with_sender(move |_, _| {
            let sender = broker.sender(&entity);
            Some(Arc::new(sender) as Arc<dyn MessageSender>)
        })
    }

    /// Options opening a fresh receiver for every execution
    #[allow(dead_code)]
    pub fn receiver_options(&self) -> MessageOptions<OrderPlaced> {
        let (broker, entity) = (self.broker.clone(), self.entity.clone());
        MessageOptions::new().enabled(true).with_receiver(move |_, _| {
            let receiver = broker.receiver(&entity);
            Some(Arc::new(receiver) as Arc<dyn MessageReceiver>)
        })
    }

    /// Options opening a fresh push client for every execution
    #[allow(dead_code)]
    pub fn handler_options(&self) -> MessageOptions<OrderPlaced> {
        let (broker, entity) = (self.broker.clone(), self.entity.clone());
        MessageOptions::new()
            .enabled(true)
            .with_handler_client(move |_, _| {
                let client = broker.handler_client(&entity);
                Some(Arc::new(client) as Arc<dyn HandlerClient>)
            })
    }

    #[allow(dead_code)]
    pub fn active(&self) -> usize {
        self.broker.active_count(&self.entity)
    }

    #[allow(dead_code)]
    pub fn scheduled(&self) -> usize {
        self.broker.scheduled_count(&self.entity)
    }
}

impl Default for TestBroker {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

// ============================================================================
// Inbox
// ============================================================================

/// Records the orders handed to an `on_received` hook
#[derive(Clone, Default)]
pub struct Inbox {
    orders: Arc<Mutex<Vec<OrderPlaced>>>,
}

#[allow(dead_code)]
impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach this inbox as the `on_received` hook of `options`
    pub fn attach(&self, options: MessageOptions<OrderPlaced>) -> MessageOptions<OrderPlaced> {
        let orders = Arc::clone(&self.orders);
        options.on_received(move |message: &ReceivedMessage, _, _| {
            orders.lock().unwrap().push(message.body_json()?);
            Ok(())
        })
    }

    pub fn orders(&self) -> Vec<OrderPlaced> {
        self.orders.lock().unwrap().clone()
    }

    /// Wait until at least `count` orders arrived or `within` elapsed
    pub async fn wait_for(&self, count: usize, within: Duration) -> Vec<OrderPlaced> {
        let deadline = tokio::time::Instant::now() + within;
        while self.orders.lock().unwrap().len() < count && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.orders()
    }
}
