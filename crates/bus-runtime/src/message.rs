//! Wire message types and the broker's core identifiers.

use crate::error::{SerializationError, ValidationError};
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue, topic or subscription path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityName(String);

impl EntityName {
    /// Create new entity name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > 260 {
            return Err(ValidationError::OutOfRange {
                field: "entity_name".to_string(),
                message: "must be 1-260 characters".to_string(),
            });
        }

        // Subscriptions are addressed as "<topic>/subscriptions/<name>"
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
        {
            return Err(ValidationError::InvalidFormat {
                field: "entity_name".to_string(),
                message: "only ASCII alphanumeric, '-', '_', '.' and '/' allowed".to_string(),
            });
        }

        if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
            return Err(ValidationError::InvalidFormat {
                field: "entity_name".to_string(),
                message: "no leading/trailing hyphens or consecutive hyphens".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Build the path of a topic subscription
    pub fn subscription(topic: &str, subscription: &str) -> Result<Self, ValidationError> {
        Self::new(format!("{}/subscriptions/{}", topic, subscription))
    }

    /// Get entity name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Unique identifier for wire messages
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Broker-assigned identifier of an enqueued or scheduled message.
///
/// Only the broker guarantees uniqueness; callers treat the value as opaque
/// and hand it back to cancel a scheduled delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(i64);

impl SequenceNumber {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SequenceNumber {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Create timestamp offset from the current time
    pub fn from_now(offset: Duration) -> Self {
        Self(Utc::now() + offset)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// True when this instant is strictly earlier than now
    pub fn is_past(&self) -> bool {
        self.0 < Utc::now()
    }

    /// Time remaining until this instant, zero once it has passed
    pub fn duration_until(&self) -> Duration {
        let remaining = self.0 - Utc::now();
        if remaining < Duration::zero() {
            Duration::zero()
        } else {
            remaining
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S%.3f UTC"))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dt = s.parse::<DateTime<Utc>>()?;
        Ok(Self::from_datetime(dt))
    }
}

// ============================================================================
// Message Types
// ============================================================================

/// Content type set on JSON-encoded bodies
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// The payload handed to the broker plus its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct WireMessage {
    pub message_id: MessageId,
    pub body: Bytes,
    pub correlation_id: Option<String>,
    pub content_type: Option<String>,
    pub scheduled_enqueue_time: Option<Timestamp>,
    pub properties: HashMap<String, String>,
}

impl WireMessage {
    /// Create new message with body
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            message_id: MessageId::new(),
            body: body.into(),
            correlation_id: None,
            content_type: None,
            scheduled_enqueue_time: None,
            properties: HashMap::new(),
        }
    }

    /// Create a message whose body is the JSON encoding of `value`
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, SerializationError> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(body).with_content_type(JSON_CONTENT_TYPE.to_string()))
    }

    /// Decode the body as JSON
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, SerializationError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Get the body as UTF-8 text
    pub fn body_text(&self) -> Result<&str, SerializationError> {
        std::str::from_utf8(&self.body).map_err(|_| SerializationError::InvalidUtf8)
    }

    /// Add correlation ID for tracking
    pub fn with_correlation_id(mut self, correlation_id: String) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Set content type
    pub fn with_content_type(mut self, content_type: String) -> Self {
        self.content_type = Some(content_type);
        self
    }

    /// Set scheduled delivery time
    pub fn with_scheduled_enqueue_time(mut self, time: Timestamp) -> Self {
        self.scheduled_enqueue_time = Some(time);
        self
    }

    /// Add an application property
    pub fn with_property(mut self, key: String, value: String) -> Self {
        self.properties.insert(key, value);
        self
    }
}

/// A message delivered by the broker with its delivery metadata
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub message_id: MessageId,
    pub sequence_number: SequenceNumber,
    pub body: Bytes,
    pub correlation_id: Option<String>,
    pub content_type: Option<String>,
    pub properties: HashMap<String, String>,
    pub delivery_count: u32,
    pub enqueued_at: Timestamp,
}

impl ReceivedMessage {
    /// Decode the body as JSON
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, SerializationError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Convert back to a wire message (for forwarding/replaying)
    pub fn message(&self) -> WireMessage {
        WireMessage {
            message_id: self.message_id.clone(),
            body: self.body.clone(),
            correlation_id: self.correlation_id.clone(),
            content_type: self.content_type.clone(),
            scheduled_enqueue_time: None,
            properties: self.properties.clone(),
        }
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
