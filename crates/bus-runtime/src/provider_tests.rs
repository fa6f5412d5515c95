//! Tests for provider configuration.

use super::*;

#[test]
fn test_default_config() {
    let config = InMemoryConfig::default();

    assert_eq!(config.max_entity_size, 10_000);
    assert_eq!(config.max_message_size, 256 * 1024);
    assert_eq!(config.receive_timeout(), Duration::from_secs(1));
}

#[test]
fn test_partial_config_uses_defaults() {
    let config: InMemoryConfig =
        serde_json::from_str(r#"{ "receive_timeout_ms": 50 }"#).expect("valid config");

    assert_eq!(config.receive_timeout(), Duration::from_millis(50));
    assert_eq!(config.max_entity_size, 10_000);
}
