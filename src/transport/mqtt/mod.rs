//! MQTT transport built on rumqttc (MQTT v5)
//!
//! # Architecture
//!
//! - [`connection`] - Pure option building, reconnect policy, topic helpers
//! - [`message_handler`] - Pure routing of rumqttc events
//! - [`client`] - Impure I/O: the connector and live connection
//!
//! # Usage
//!
//! ```rust,no_run
//! use wyze2mqtt::config::MqttSection;
//! use wyze2mqtt::transport::mqtt::RumqttcConnector;
//! use wyze2mqtt::transport::{BusConnection, BusConnector};
//!
//! # tokio_test::block_on(async {
//! let mut connector = RumqttcConnector::new(MqttSection::default(), "localhost", None)?;
//! let mut connection = connector.connect().await?;
//! connection.subscribe("wyze2mqtt/+/set").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod message_handler;

pub use client::{RumqttcConnection, RumqttcConnector};
pub use connection::{BrokerAddress, ConnectionState, MqttError, ReconnectConfig, TopicBuilder};
pub use message_handler::{EventRoute, MessageHandler};
