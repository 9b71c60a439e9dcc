//! Configuration system for the Wyze MQTT bridge
//!
//! Tunables (topics, intervals, endpoints) come from an optional TOML file.
//! Secrets are never stored in the file: each section names the environment
//! variables that hold them, and they are resolved at startup.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Main bridge configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(default)]
    pub wyze: WyzeSection,
    #[serde(default)]
    pub mqtt: MqttSection,
    #[serde(default)]
    pub bridge: BridgeSection,
}

/// Wyze account and API section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WyzeSection {
    /// Environment variable containing the account email
    #[serde(default = "default_email_env")]
    pub email_env: String,
    /// Environment variable containing the account password
    #[serde(default = "default_password_env")]
    pub password_env: String,
    /// Environment variable containing the API key identifier
    #[serde(default = "default_key_id_env")]
    pub key_id_env: String,
    /// Environment variable containing the API key secret
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Authentication service base URL
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    /// Application API base URL
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Model identifier used for direct on/off/brightness calls
    #[serde(default = "default_device_model")]
    pub device_model: String,
}

fn default_email_env() -> String {
    "WYZE_EMAIL".to_string()
}

fn default_password_env() -> String {
    "WYZE_PASSWORD".to_string()
}

fn default_key_id_env() -> String {
    "WYZE_KEY_ID".to_string()
}

fn default_api_key_env() -> String {
    "WYZE_API_KEY".to_string()
}

fn default_auth_url() -> String {
    "https://auth-prod.api.wyze.com".to_string()
}

fn default_api_url() -> String {
    "https://api.wyzecam.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_device_model() -> String {
    "WLPA19C".to_string()
}

impl Default for WyzeSection {
    fn default() -> Self {
        Self {
            email_env: default_email_env(),
            password_env: default_password_env(),
            key_id_env: default_key_id_env(),
            api_key_env: default_api_key_env(),
            auth_url: default_auth_url(),
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            device_model: default_device_model(),
        }
    }
}

/// MQTT broker section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Environment variable containing the broker host (bare host or mqtt:// URL)
    #[serde(default = "default_host_env")]
    pub host_env: String,
    /// Broker port used when the host carries none
    #[serde(default = "default_port")]
    pub port: u16,
    /// Client identifier prefix
    #[serde(default = "default_client_id")]
    pub client_id: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
    /// Keep alive interval in seconds
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

fn default_host_env() -> String {
    "MQTT_BROKER_HOST".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "wyze2mqtt".to_string()
}

fn default_keep_alive() -> u64 {
    60
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            host_env: default_host_env(),
            port: default_port(),
            client_id: default_client_id(),
            username_env: None,
            password_env: None,
            keep_alive_secs: default_keep_alive(),
        }
    }
}

/// When the device inventory is written to the bus
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InventoryPolicy {
    /// Publish once for every successful broker connection
    #[default]
    EveryConnection,
    /// Publish on the first successful connection only
    Once,
}

/// Bridge behaviour section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSection {
    /// Root of the command topics: `<command_root>/<mac>/set`
    #[serde(default = "default_command_root")]
    pub command_root: String,
    /// Topic receiving one message per known device
    #[serde(default = "default_inventory_topic")]
    pub inventory_topic: String,
    #[serde(default)]
    pub inventory_publish: InventoryPolicy,
    /// Session refresh interval in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Delay between reconnection attempts in seconds
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_secs: u64,
    /// Optional backoff pattern in milliseconds tried before the fixed delay
    #[serde(default)]
    pub reconnect_backoff_ms: Vec<u64>,
}

fn default_command_root() -> String {
    "wyze2mqtt".to_string()
}

fn default_inventory_topic() -> String {
    "zigbee2mqtt/devices".to_string()
}

fn default_refresh_interval() -> u64 {
    3600
}

fn default_reconnect_delay() -> u64 {
    5
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            command_root: default_command_root(),
            inventory_topic: default_inventory_topic(),
            inventory_publish: InventoryPolicy::default(),
            refresh_interval_secs: default_refresh_interval(),
            reconnect_delay_secs: default_reconnect_delay(),
            reconnect_backoff_ms: Vec::new(),
        }
    }
}

impl BridgeSection {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Wyze account credentials resolved from the environment
#[derive(Clone, PartialEq)]
pub struct WyzeCredentials {
    pub email: String,
    pub password: String,
    pub key_id: String,
    pub api_key: String,
}

impl std::fmt::Debug for WyzeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WyzeCredentials")
            .field("email", &self.email)
            .field("password", &"***")
            .field("key_id", &self.key_id)
            .field("api_key", &"***")
            .finish()
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BridgeConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check topic roots and intervals for consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_topic_root("bridge.command_root", &self.bridge.command_root)?;
        validate_topic_root("bridge.inventory_topic", &self.bridge.inventory_topic)?;

        if self.bridge.refresh_interval_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "bridge.refresh_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.bridge.reconnect_delay_secs == 0 {
            return Err(ConfigError::InvalidConfig(
                "bridge.reconnect_delay_secs must be greater than 0".to_string(),
            ));
        }
        if self.wyze.device_model.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "wyze.device_model cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Helper method to get environment variable with consistent error handling
    fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
        env_var_name.and_then(|name| std::env::var(name).ok())
    }

    /// Helper method to get environment variable with error propagation
    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Resolve all four Wyze credentials; any missing variable is an error
    pub fn wyze_credentials(&self) -> Result<WyzeCredentials, ConfigError> {
        Ok(WyzeCredentials {
            email: Self::get_env_var_required(&self.wyze.email_env)?,
            password: Self::get_env_var_required(&self.wyze.password_env)?,
            key_id: Self::get_env_var_required(&self.wyze.key_id_env)?,
            api_key: Self::get_env_var_required(&self.wyze.api_key_env)?,
        })
    }

    /// Get the broker host from its environment variable
    pub fn mqtt_host(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.mqtt.host_env)
    }

    /// Get MQTT username from environment variable
    pub fn get_mqtt_username(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from environment variable
    pub fn get_mqtt_password(&self) -> Option<String> {
        Self::get_env_var_optional(self.mqtt.password_env.as_ref())
    }
}

fn validate_topic_root(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidConfig(format!("{field} cannot be empty")));
    }
    if value.contains('+') || value.contains('#') {
        return Err(ConfigError::InvalidConfig(format!(
            "{field} '{value}' must not contain MQTT wildcards"
        )));
    }
    Ok(())
}
