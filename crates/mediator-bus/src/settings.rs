//! File and environment settings for message options.
//!
//! Sources, later ones overriding earlier ones:
//!  1. an optional YAML file
//!  2. environment variables prefixed `MEDIATOR_BUS` with `__` separators,
//!     e.g. `MEDIATOR_BUS__BEHAVIORS__ENABLED=false`
//!
//! Every field carries a serde default so an empty environment yields valid
//! settings. Message keys are matched case-insensitively because environment
//! variable names are lowercased by the loader.

use crate::error::SettingsError;
use crate::options::OptionsSlot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix for settings overrides
pub const ENV_PREFIX: &str = "MEDIATOR_BUS";

/// Settings for every options slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusSettings {
    pub processors: SlotSettings,
    pub behaviors: SlotSettings,
}

/// Settings for one options slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotSettings {
    /// Disabling a slot disables every message in it
    pub enabled: bool,

    /// Per-message overrides keyed by message name
    pub messages: HashMap<String, MessageSettings>,
}

impl Default for SlotSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            messages: HashMap::new(),
        }
    }
}

/// Overrides for one message type within a slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageSettings {
    pub enabled: Option<bool>,
    pub enqueue_delay_seconds: Option<u64>,
    pub unregister_timeout_ms: Option<u64>,
}

impl MessageSettings {
    pub fn enqueue_delay(&self) -> Option<chrono::Duration> {
        self.enqueue_delay_seconds
            .and_then(|seconds| i64::try_from(seconds).ok())
            .map(chrono::Duration::seconds)
    }

    pub fn unregister_timeout(&self) -> Option<Duration> {
        self.unregister_timeout_ms.map(Duration::from_millis)
    }
}

impl BusSettings {
    /// Load settings from an optional YAML file and the environment
    ///
    /// A missing file is only an error when a path is given explicitly.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading bus settings from file");
            builder = builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        let settings: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that cannot be applied
    pub fn validate(&self) -> Result<(), SettingsError> {
        for slot in [OptionsSlot::Processors, OptionsSlot::Behaviors] {
            for (name, message) in &self.slot(slot).messages {
                if message.unregister_timeout_ms == Some(0) {
                    return Err(SettingsError::Invalid {
                        key: format!("{}.messages.{}.unregister_timeout_ms", slot_key(slot), name),
                        message: "Unregister timeout must be greater than zero".to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    pub fn slot(&self, slot: OptionsSlot) -> &SlotSettings {
        match slot {
            OptionsSlot::Processors => &self.processors,
            OptionsSlot::Behaviors => &self.behaviors,
        }
    }

    /// Overrides for `key` in `slot`, if any are configured
    pub fn message(&self, slot: OptionsSlot, key: &str) -> Option<&MessageSettings> {
        self.slot(slot)
            .messages
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, settings)| settings)
    }

    /// Resolve the enabled flag for `key`, falling back to `default`
    ///
    /// A disabled slot always wins over message settings.
    pub fn resolve_enabled(&self, slot: OptionsSlot, key: &str, default: bool) -> bool {
        if !self.slot(slot).enabled {
            return false;
        }

        self.message(slot, key)
            .and_then(|message| message.enabled)
            .unwrap_or(default)
    }
}

fn slot_key(slot: OptionsSlot) -> &'static str {
    match slot {
        OptionsSlot::Processors => "processors",
        OptionsSlot::Behaviors => "behaviors",
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
