//! Tests for bus settings loading.

use super::*;
use serial_test::serial;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_yaml(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write settings");
    file
}

fn clear_env() {
    for (key, _) in std::env::vars() {
        if key.starts_with(ENV_PREFIX) {
            std::env::remove_var(key);
        }
    }
}

// ============================================================================
// Defaults and resolution
// ============================================================================

mod resolution {
    use super::*;

    #[test]
    fn test_defaults_keep_code_configuration() {
        let settings = BusSettings::default();

        assert!(settings.processors.enabled);
        assert!(settings.behaviors.enabled);
        assert!(settings.resolve_enabled(OptionsSlot::Processors, "OrderPlaced", true));
        assert!(!settings.resolve_enabled(OptionsSlot::Processors, "OrderPlaced", false));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_disabled_slot_wins_over_message() {
        let mut settings = BusSettings::default();
        settings.behaviors.enabled = false;
        settings.behaviors.messages.insert(
            "OrderPlaced".to_string(),
            MessageSettings {
                enabled: Some(true),
                ..Default::default()
            },
        );

        assert!(!settings.resolve_enabled(OptionsSlot::Behaviors, "OrderPlaced", true));
        assert!(settings.resolve_enabled(OptionsSlot::Processors, "OrderPlaced", true));
    }

    #[test]
    fn test_message_lookup_ignores_case() {
        let mut settings = BusSettings::default();
        settings.processors.messages.insert(
            "orderplaced".to_string(),
            MessageSettings {
                enabled: Some(false),
                enqueue_delay_seconds: Some(90),
                unregister_timeout_ms: Some(250),
            },
        );

        let message = settings
            .message(OptionsSlot::Processors, "OrderPlaced")
            .expect("message settings");
        assert_eq!(message.enqueue_delay(), Some(chrono::Duration::seconds(90)));
        assert_eq!(message.unregister_timeout(), Some(Duration::from_millis(250)));
        assert!(!settings.resolve_enabled(OptionsSlot::Processors, "OrderPlaced", true));
    }

    #[test]
    fn test_zero_unregister_timeout_is_rejected() {
        let mut settings = BusSettings::default();
        settings.behaviors.messages.insert(
            "Ping".to_string(),
            MessageSettings {
                unregister_timeout_ms: Some(0),
                ..Default::default()
            },
        );

        let err = settings.validate().expect_err("zero timeout is invalid");
        assert!(matches!(
            err,
            SettingsError::Invalid { ref key, .. }
                if key == "behaviors.messages.Ping.unregister_timeout_ms"
        ));
    }
}

// ============================================================================
// Loading
// ============================================================================

mod loading {
    use super::*;

    #[test]
    #[serial]
    fn test_load_without_sources_yields_defaults() {
        clear_env();

        let settings = BusSettings::load(None).expect("defaults load");
        assert_eq!(settings, BusSettings::default());
    }

    #[test]
    #[serial]
    fn test_load_from_yaml_file() {
        clear_env();
        let file = write_yaml(
            r#"
processors:
  enabled: true
  messages:
    OrderPlaced:
      enabled: true
      enqueue_delay_seconds: 60
behaviors:
  enabled: false
"#,
        );

        let settings = BusSettings::load(Some(file.path())).expect("file loads");

        assert!(!settings.behaviors.enabled);
        let message = settings
            .message(OptionsSlot::Processors, "OrderPlaced")
            .expect("message settings");
        assert_eq!(message.enabled, Some(true));
        assert_eq!(message.enqueue_delay_seconds, Some(60));
        assert_eq!(message.unregister_timeout_ms, None);
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_is_an_error() {
        clear_env();

        let result = BusSettings::load(Some(Path::new("/nonexistent/mediator-bus.yaml")));
        assert!(matches!(result, Err(SettingsError::Load(_))));
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        clear_env();
        let file = write_yaml(
            r#"
behaviors:
  enabled: true
"#,
        );
        std::env::set_var("MEDIATOR_BUS__BEHAVIORS__ENABLED", "false");
        std::env::set_var(
            "MEDIATOR_BUS__PROCESSORS__MESSAGES__PING__UNREGISTER_TIMEOUT_MS",
            "500",
        );

        let result = BusSettings::load(Some(file.path()));
        clear_env();

        let settings = result.expect("settings load");
        assert!(!settings.behaviors.enabled);
        let message = settings
            .message(OptionsSlot::Processors, "Ping")
            .expect("message settings");
        assert_eq!(message.unregister_timeout(), Some(Duration::from_millis(500)));
    }

    #[test]
    #[serial]
    fn test_invalid_environment_value_fails_validation() {
        clear_env();
        std::env::set_var(
            "MEDIATOR_BUS__BEHAVIORS__MESSAGES__PING__UNREGISTER_TIMEOUT_MS",
            "0",
        );

        let result = BusSettings::load(None);
        clear_env();

        assert!(matches!(result, Err(SettingsError::Invalid { .. })));
    }
}
