//! Pure connection state management for the MQTT listener
//!
//! This module contains pure functions for connection state, reconnect
//! timing, broker option building and topic handling.

use crate::config::{BridgeSection, MqttSection};
use rumqttc::v5::MqttOptions;
use rumqttc::Transport as RumqttcTransport;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Listener connection state, published on a watch channel
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionState {
    /// Opening a connection to the broker
    Connecting,
    /// ConnAck received, inventory not yet published
    Connected,
    /// Command filter subscription confirmed
    Subscribed,
    /// Consuming command messages
    Streaming,
    /// Connection lost with reason
    Disconnected(String),
    /// Waiting out the reconnect delay (attempt count)
    Reconnecting(u32),
    /// Shutdown requested, no further connections
    Stopped,
}

/// Reconnection configuration
///
/// Retries are unlimited. The delay follows `backoff_pattern` (milliseconds)
/// and then stays at `sustained_delay`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    pub backoff_pattern: Vec<u64>,
    pub sustained_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            backoff_pattern: Vec::new(),
            sustained_delay: Duration::from_secs(5),
        }
    }
}

impl From<&BridgeSection> for ReconnectConfig {
    fn from(section: &BridgeSection) -> Self {
        Self {
            backoff_pattern: section.reconnect_backoff_ms.clone(),
            sustained_delay: section.reconnect_delay(),
        }
    }
}

impl ReconnectConfig {
    /// Backoff delay for the given attempt, counted from 1 (pure function)
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        let index = attempt.saturating_sub(1) as usize;
        self.backoff_pattern
            .get(index)
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or(self.sustained_delay)
    }
}

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Connection refused by broker: {0}")]
    ConnectionRefused(String),
    #[error("No ConnAck received within {0:?}")]
    ConnAckTimeout(Duration),
    #[error("Connection lost: {0}")]
    ConnectionLost(String),
    #[error("Publishing failed: {0}")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Subscription failed: {0}")]
    SubscriptionFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Invalid broker URL: {0}")]
    InvalidBrokerUrl(String),
}

/// Where the broker lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

impl BrokerAddress {
    /// Parse a broker host (pure function)
    ///
    /// Accepts a bare host (`broker.local`), `host:port`, or a URL with an
    /// `mqtt://`, `tcp://`, `mqtts://` or `ssl://` scheme. A bare host uses
    /// `default_port`.
    pub fn parse(raw: &str, default_port: u16) -> Result<Self, MqttError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(MqttError::InvalidBrokerUrl(raw.to_string()));
        }

        if raw.contains("://") {
            let url = Url::parse(raw).map_err(|_| MqttError::InvalidBrokerUrl(raw.to_string()))?;
            let tls = match url.scheme() {
                "mqtt" | "tcp" => false,
                "mqtts" | "ssl" => true,
                _ => return Err(MqttError::InvalidBrokerUrl(raw.to_string())),
            };
            let host = url
                .host_str()
                .ok_or_else(|| MqttError::InvalidBrokerUrl(raw.to_string()))?;
            let port = url
                .port()
                .unwrap_or(if tls { 8883 } else { default_port });
            return Ok(Self {
                host: host.to_string(),
                port,
                tls,
            });
        }

        match raw.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                let port = port
                    .parse()
                    .map_err(|_| MqttError::InvalidBrokerUrl(raw.to_string()))?;
                Ok(Self {
                    host: host.to_string(),
                    port,
                    tls: false,
                })
            }
            Some(_) => Err(MqttError::InvalidBrokerUrl(raw.to_string())),
            None => Ok(Self {
                host: raw.to_string(),
                port: default_port,
                tls: false,
            }),
        }
    }
}

/// Build MQTT options for one connection attempt
///
/// Each attempt gets a fresh client id so a half-closed previous session
/// on the broker cannot kick the new one.
pub fn configure_mqtt_options(
    config: &MqttSection,
    address: &BrokerAddress,
    credentials: Option<&(String, String)>,
) -> MqttOptions {
    let client_id = format!(
        "{}-{}",
        config.client_id,
        chrono::Utc::now().timestamp_millis()
    );
    let mut mqtt_options = MqttOptions::new(client_id, address.host.clone(), address.port);

    if address.tls {
        mqtt_options.set_transport(RumqttcTransport::tls_with_default_config());
    }

    if let Some((username, password)) = credentials {
        mqtt_options.set_credentials(username, password);
    }

    mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    mqtt_options.set_clean_start(true);

    mqtt_options
}

/// Topic construction and matching for the command namespace
pub struct TopicBuilder;

impl TopicBuilder {
    /// Subscription filter for commands: `<root>/+/set`
    pub fn command_filter(root: &str) -> String {
        format!("{}/+/set", root.trim_end_matches('/'))
    }

    /// Command topic for one device: `<root>/<mac>/set`
    pub fn command_topic(root: &str, device_mac: &str) -> String {
        format!("{}/{}/set", root.trim_end_matches('/'), device_mac)
    }

    /// Device address from a command topic: the segment right after `root`
    ///
    /// `root` may span several levels (`home/wyze`); the address is the level
    /// the `+` of [`Self::command_filter`] matched.
    pub fn device_address<'a>(root: &str, topic: &'a str) -> Option<&'a str> {
        let depth = root.trim_end_matches('/').split('/').count();
        topic.split('/').nth(depth).filter(|segment| !segment.is_empty())
    }

    /// MQTT filter matching with `+` and `#` wildcards (pure function)
    pub fn matches_filter(filter: &str, topic: &str) -> bool {
        let mut filter_levels = filter.split('/');
        let mut topic_levels = topic.split('/');

        loop {
            match (filter_levels.next(), topic_levels.next()) {
                (Some("#"), _) => return true,
                (Some("+"), Some(_)) => continue,
                (Some(f), Some(t)) if f == t => continue,
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}
