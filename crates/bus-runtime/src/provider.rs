//! Broker provider configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the in-memory broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InMemoryConfig {
    /// Maximum number of active plus scheduled messages per entity
    pub max_entity_size: usize,
    /// Maximum body size in bytes
    pub max_message_size: usize,
    /// How long a receive waits for a message before returning nothing
    pub receive_timeout_ms: u64,
}

impl InMemoryConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

impl Default for InMemoryConfig {
    fn default() -> Self {
        Self {
            max_entity_size: 10_000,
            max_message_size: 256 * 1024, // 256KB, the Standard tier limit
            receive_timeout_ms: 1_000,
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
