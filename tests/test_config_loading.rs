//! Configuration loading and validation tests
//!
//! Tests focus on BEHAVIOR of configuration loading, validation, and error handling.
//! We test observable outcomes, not implementation details of TOML parsing.

use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;
use wyze2mqtt::config::{BridgeConfig, ConfigError, InventoryPolicy};

#[test]
fn test_config_loads_successfully_from_valid_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[wyze]
email_env = "MY_WYZE_EMAIL"
device_model = "WLPA19"
timeout_secs = 10

[mqtt]
host_env = "MY_BROKER"
port = 8883
client_id = "lights"
username_env = "MQTT_USER"
password_env = "MQTT_PASS"

[bridge]
command_root = "home/lights"
inventory_topic = "home/inventory"
inventory_publish = "once"
refresh_interval_secs = 1800
reconnect_delay_secs = 10
reconnect_backoff_ms = [250, 1000]
"#
    )
    .unwrap();

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.wyze.email_env, "MY_WYZE_EMAIL");
    assert_eq!(config.wyze.device_model, "WLPA19");
    assert_eq!(config.wyze.timeout_secs, 10);
    assert_eq!(config.mqtt.host_env, "MY_BROKER");
    assert_eq!(config.mqtt.port, 8883);
    assert_eq!(config.mqtt.client_id, "lights");
    assert_eq!(config.mqtt.username_env, Some("MQTT_USER".to_string()));
    assert_eq!(config.mqtt.password_env, Some("MQTT_PASS".to_string()));
    assert_eq!(config.bridge.command_root, "home/lights");
    assert_eq!(config.bridge.inventory_topic, "home/inventory");
    assert_eq!(config.bridge.inventory_publish, InventoryPolicy::Once);
    assert_eq!(config.bridge.refresh_interval(), Duration::from_secs(1800));
    assert_eq!(config.bridge.reconnect_delay(), Duration::from_secs(10));
    assert_eq!(config.bridge.reconnect_backoff_ms, vec![250, 1000]);
}

#[test]
fn test_config_applies_defaults_for_missing_sections() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[mqtt]
port = 1884
"#
    )
    .unwrap();

    let config = BridgeConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.mqtt.port, 1884);
    assert_eq!(config.mqtt.host_env, "MQTT_BROKER_HOST");
    assert_eq!(config.wyze.password_env, "WYZE_PASSWORD");
    assert_eq!(config.wyze.key_id_env, "WYZE_KEY_ID");
    assert_eq!(config.wyze.api_key_env, "WYZE_API_KEY");
    assert_eq!(config.bridge.command_root, "wyze2mqtt");
    assert_eq!(config.bridge.inventory_publish, InventoryPolicy::EveryConnection);
    assert!(config.bridge.reconnect_backoff_ms.is_empty());
}

#[test]
fn test_config_returns_error_for_missing_file() {
    let result = BridgeConfig::load_from_file(std::path::Path::new(
        "/nonexistent/wyze2mqtt/config.toml",
    ));

    match result {
        Err(ConfigError::FileRead(_)) => {}
        other => panic!("Expected FileRead error, got {other:?}"),
    }
}

#[test]
fn test_config_returns_error_for_malformed_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "[bridge\ncommand_root = ").unwrap();

    let result = BridgeConfig::load_from_file(temp_file.path());

    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_returns_error_for_wrong_field_type() {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(
        temp_file,
        r#"
[bridge]
refresh_interval_secs = "hourly"
"#
    )
    .unwrap();

    let result = BridgeConfig::load_from_file(temp_file.path());

    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_returns_error_for_unknown_inventory_policy() {
    let result = BridgeConfig::from_toml_str(
        r#"
[bridge]
inventory_publish = "sometimes"
"#,
    );

    assert!(matches!(result, Err(ConfigError::TomlParse(_))));
}

#[test]
fn test_config_validation_rejects_empty_topics() {
    let result = BridgeConfig::from_toml_str(
        r#"
[bridge]
inventory_topic = "  "
"#,
    );

    match result {
        Err(ConfigError::InvalidConfig(message)) => {
            assert!(message.contains("bridge.inventory_topic"))
        }
        other => panic!("Expected InvalidConfig, got {other:?}"),
    }
}

#[test]
fn test_config_validation_rejects_wildcard_inventory_topic() {
    let result = BridgeConfig::from_toml_str(
        r#"
[bridge]
inventory_topic = "zigbee2mqtt/#"
"#,
    );

    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_config_validation_rejects_empty_device_model() {
    let result = BridgeConfig::from_toml_str(
        r#"
[wyze]
device_model = ""
"#,
    );

    assert!(matches!(result, Err(ConfigError::InvalidConfig(_))));
}

#[test]
fn test_optional_mqtt_credentials_absent_without_env_names() {
    let config = BridgeConfig::default();

    assert_eq!(config.get_mqtt_username(), None);
    assert_eq!(config.get_mqtt_password(), None);
}

#[test]
fn test_config_serializes_back_to_toml() {
    let config = BridgeConfig::default();

    let rendered = toml::to_string_pretty(&config).unwrap();
    let reparsed = BridgeConfig::from_toml_str(&rendered).unwrap();

    assert_eq!(reparsed, config);
    assert!(rendered.contains("inventory_publish = \"every_connection\""));
}
