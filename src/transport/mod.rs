//! Transport layer for the bridge
//!
//! The listener talks to the broker through [`BusConnector`] and
//! [`BusConnection`] so the connection state machine can run against an
//! in-memory bus in tests. [`mqtt`] holds the rumqttc implementation.

use async_trait::async_trait;

pub mod mqtt;

pub use mqtt::MqttError;

/// A message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Factory for broker connections, one per connection epoch
#[async_trait]
pub trait BusConnector: Send {
    type Connection: BusConnection;

    /// Open a new connection; resolves once the broker has accepted it
    async fn connect(&mut self) -> Result<Self::Connection, MqttError>;
}

/// One live broker connection
///
/// Any error returned from these methods means the connection is gone and
/// must be replaced.
#[async_trait]
pub trait BusConnection: Send {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), MqttError>;

    async fn subscribe(&mut self, filter: &str) -> Result<(), MqttError>;

    /// Wait for the next inbound message
    async fn next_message(&mut self) -> Result<InboundMessage, MqttError>;

    async fn disconnect(&mut self) -> Result<(), MqttError>;
}

