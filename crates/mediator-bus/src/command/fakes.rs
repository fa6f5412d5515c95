//! Recording channel fakes shared by the command tests.

use async_trait::async_trait;
use bus_runtime::{
    BrokerError, HandlerClient, MessageHandler, MessageId, MessageReceiver, MessageSender,
    ReceivedMessage, SequenceNumber, Timestamp, WireMessage,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Domain message used throughout the command tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: String,
    pub quantity: u32,
}

pub fn order() -> OrderPlaced {
    OrderPlaced {
        order_id: "order-42".to_string(),
        quantity: 3,
    }
}

/// Broker interaction observed by a fake
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Send(WireMessage),
    Schedule(WireMessage, Timestamp),
    Cancel(SequenceNumber),
    Receive,
    Close,
    Register,
    Unregister(Duration),
}

fn broker_failure() -> BrokerError {
    BrokerError::ConnectionFailed {
        message: "connection reset".to_string(),
    }
}

/// Sender recording every call in order
pub struct RecordingSender {
    calls: Mutex<Vec<Call>>,
    fail: Mutex<bool>,
    interrupt: Mutex<bool>,
    fail_close: Mutex<bool>,
    close_signals: Mutex<Vec<bool>>,
    next_sequence_number: AtomicI64,
}

impl RecordingSender {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
            interrupt: Mutex::new(false),
            fail_close: Mutex::new(false),
            close_signals: Mutex::new(Vec::new()),
            next_sequence_number: AtomicI64::new(100),
        })
    }

    /// Make every broker call (but not close) fail with a connection error
    pub fn fail_calls(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Let broker calls succeed again after `fail_calls`
    pub fn recover(&self) {
        *self.fail.lock().unwrap() = false;
    }

    /// Make every broker call cancel its signal mid-flight and give up
    pub fn interrupt_calls(&self) {
        *self.interrupt.lock().unwrap() = true;
    }

    pub fn fail_close(&self) {
        *self.fail_close.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Close))
            .count()
    }

    /// Whether the signal handed to each close was already cancelled
    pub fn close_signals(&self) -> Vec<bool> {
        self.close_signals.lock().unwrap().clone()
    }

    fn record(&self, call: Call, signal: &CancellationToken) -> Result<(), BrokerError> {
        self.calls.lock().unwrap().push(call);
        if *self.interrupt.lock().unwrap() {
            signal.cancel();
            return Err(BrokerError::Cancelled);
        }
        if *self.fail.lock().unwrap() {
            return Err(broker_failure());
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(
        &self,
        message: &WireMessage,
        signal: &CancellationToken,
    ) -> Result<(), BrokerError> {
        self.record(Call::Send(message.clone()), signal)
    }

    async fn schedule_message(
        &self,
        message: &WireMessage,
        enqueue_time: Timestamp,
        signal: &CancellationToken,
    ) -> Result<SequenceNumber, BrokerError> {
        self.record(Call::Schedule(message.clone(), enqueue_time), signal)?;
        let value = self.next_sequence_number.fetch_add(1, Ordering::SeqCst);
        Ok(SequenceNumber::new(value))
    }

    async fn cancel_scheduled_message(
        &self,
        sequence_number: SequenceNumber,
        signal: &CancellationToken,
    ) -> Result<(), BrokerError> {
        self.record(Call::Cancel(sequence_number), signal)
    }

    async fn close(&self, signal: &CancellationToken) -> Result<(), BrokerError> {
        self.calls.lock().unwrap().push(Call::Close);
        self.close_signals.lock().unwrap().push(signal.is_cancelled());
        if *self.fail_close.lock().unwrap() {
            return Err(broker_failure());
        }
        Ok(())
    }
}

/// Receiver handing out a fixed queue of messages
pub struct RecordingReceiver {
    calls: Mutex<Vec<Call>>,
    messages: Mutex<VecDeque<ReceivedMessage>>,
    fail: Mutex<bool>,
    interrupt: Mutex<bool>,
    close_signals: Mutex<Vec<bool>>,
}

impl RecordingReceiver {
    pub fn new(messages: Vec<ReceivedMessage>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            messages: Mutex::new(messages.into()),
            fail: Mutex::new(false),
            interrupt: Mutex::new(false),
            close_signals: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_calls(&self) {
        *self.fail.lock().unwrap() = true;
    }

    /// Make every receive cancel its signal mid-flight and give up
    pub fn interrupt_calls(&self) {
        *self.interrupt.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Whether the signal handed to each close was already cancelled
    pub fn close_signals(&self) -> Vec<bool> {
        self.close_signals.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageReceiver for RecordingReceiver {
    async fn receive(
        &self,
        signal: &CancellationToken,
    ) -> Result<Option<ReceivedMessage>, BrokerError> {
        self.calls.lock().unwrap().push(Call::Receive);
        if *self.interrupt.lock().unwrap() {
            signal.cancel();
            return Err(BrokerError::Cancelled);
        }
        if *self.fail.lock().unwrap() {
            return Err(broker_failure());
        }
        Ok(self.messages.lock().unwrap().pop_front())
    }

    async fn close(&self, signal: &CancellationToken) -> Result<(), BrokerError> {
        self.calls.lock().unwrap().push(Call::Close);
        self.close_signals.lock().unwrap().push(signal.is_cancelled());
        Ok(())
    }
}

/// Handler client that keeps the registered handler for tests to drive
pub struct RecordingHandlerClient {
    calls: Mutex<Vec<Call>>,
    handler: Mutex<Option<Arc<dyn MessageHandler>>>,
    fail_register: Mutex<bool>,
}

impl RecordingHandlerClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            handler: Mutex::new(None),
            fail_register: Mutex::new(false),
        })
    }

    pub fn fail_register(&self) {
        *self.fail_register.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn handler(&self) -> Option<Arc<dyn MessageHandler>> {
        self.handler.lock().unwrap().clone()
    }
}

#[async_trait]
impl HandlerClient for RecordingHandlerClient {
    async fn register_message_handler(
        &self,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), BrokerError> {
        self.calls.lock().unwrap().push(Call::Register);
        if *self.fail_register.lock().unwrap() {
            return Err(broker_failure());
        }
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }

    async fn unregister_message_handler(&self, timeout: Duration) -> Result<(), BrokerError> {
        self.calls.lock().unwrap().push(Call::Unregister(timeout));
        self.handler.lock().unwrap().take();
        Ok(())
    }
}

/// A delivered message carrying `body`
pub fn received(sequence_number: i64, body: &str) -> ReceivedMessage {
    ReceivedMessage {
        message_id: MessageId::new(),
        sequence_number: SequenceNumber::new(sequence_number),
        body: body.to_string().into(),
        correlation_id: None,
        content_type: None,
        properties: HashMap::new(),
        delivery_count: 1,
        enqueued_at: Timestamp::now(),
    }
}
