//! rumqttc connector and connection
//!
//! rumqttc only moves packets while its event loop is polled, and its
//! request channel is bounded. Every operation on [`RumqttcConnection`]
//! therefore polls the event loop until its own packet has been sent,
//! buffering any publishes that arrive meanwhile.

use super::connection::{configure_mqtt_options, BrokerAddress, MqttError};
use super::message_handler::{EventRoute, MessageHandler};
use crate::config::MqttSection;
use crate::transport::{BusConnection, BusConnector, InboundMessage};
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, EventLoop};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, trace};

const REQUEST_CHANNEL_CAPACITY: usize = 10;
const CONNACK_TIMEOUT: Duration = Duration::from_secs(30);
const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Opens rumqttc connections to one broker
pub struct RumqttcConnector {
    config: MqttSection,
    address: BrokerAddress,
    credentials: Option<(String, String)>,
    connack_timeout: Duration,
}

impl RumqttcConnector {
    /// `host` is a bare host, `host:port` or an `mqtt(s)://` URL
    pub fn new(
        config: MqttSection,
        host: &str,
        credentials: Option<(String, String)>,
    ) -> Result<Self, MqttError> {
        let address = BrokerAddress::parse(host, config.port)?;
        Ok(Self {
            config,
            address,
            credentials,
            connack_timeout: CONNACK_TIMEOUT,
        })
    }

    pub fn address(&self) -> &BrokerAddress {
        &self.address
    }

    /// Create a fresh client and event loop for one connection attempt
    fn create_connection(&self) -> (AsyncClient, EventLoop) {
        let mqtt_options =
            configure_mqtt_options(&self.config, &self.address, self.credentials.as_ref());
        AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY)
    }
}

#[async_trait]
impl BusConnector for RumqttcConnector {
    type Connection = RumqttcConnection;

    async fn connect(&mut self) -> Result<RumqttcConnection, MqttError> {
        debug!(
            "Connecting to MQTT broker {}:{} (tls: {})",
            self.address.host, self.address.port, self.address.tls
        );

        let (client, event_loop) = self.create_connection();
        let mut connection = RumqttcConnection::new(client, event_loop);

        tokio::time::timeout(self.connack_timeout, connection.wait_for_connack())
            .await
            .map_err(|_| MqttError::ConnAckTimeout(self.connack_timeout))??;

        Ok(connection)
    }
}

/// One live rumqttc connection
pub struct RumqttcConnection {
    client: AsyncClient,
    event_loop: EventLoop,
    pending: VecDeque<InboundMessage>,
}

impl RumqttcConnection {
    fn new(client: AsyncClient, event_loop: EventLoop) -> Self {
        Self {
            client,
            event_loop,
            pending: VecDeque::new(),
        }
    }

    async fn poll_route(&mut self) -> Result<EventRoute, MqttError> {
        let event = self
            .event_loop
            .poll()
            .await
            .map_err(|e| MqttError::ConnectionLost(e.to_string()))?;
        Ok(MessageHandler::route_mqtt_event(&event))
    }

    async fn wait_for_connack(&mut self) -> Result<(), MqttError> {
        loop {
            let route = self
                .event_loop
                .poll()
                .await
                .map(|event| MessageHandler::route_mqtt_event(&event))
                .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))?;

            match route {
                EventRoute::ConnectionAcknowledged { accepted: true, .. } => return Ok(()),
                EventRoute::ConnectionAcknowledged {
                    accepted: false,
                    reason,
                } => return Err(MqttError::ConnectionRefused(reason)),
                EventRoute::Disconnected => {
                    return Err(MqttError::ConnectionRefused(
                        "Broker disconnected before ConnAck".to_string(),
                    ))
                }
                other => trace!("Waiting for ConnAck, got {:?}", other),
            }
        }
    }

    /// Poll until `done` matches, keeping inbound messages for later
    async fn drive_until(&mut self, done: fn(&EventRoute) -> bool) -> Result<(), MqttError> {
        loop {
            let route = self.poll_route().await?;
            if done(&route) {
                return Ok(());
            }
            match route {
                EventRoute::MessageReceived { topic, payload, .. } => {
                    self.pending.push_back(InboundMessage { topic, payload });
                }
                EventRoute::Disconnected => {
                    return Err(MqttError::ConnectionLost(
                        "Broker sent DISCONNECT".to_string(),
                    ))
                }
                other => trace!("Event while flushing: {:?}", other),
            }
        }
    }
}

#[async_trait]
impl BusConnection for RumqttcConnection {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), MqttError> {
        self.client
            .publish(topic.to_string(), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;
        self.drive_until(|route| matches!(route, EventRoute::PublishSent { .. }))
            .await
    }

    async fn subscribe(&mut self, filter: &str) -> Result<(), MqttError> {
        self.client
            .subscribe(filter.to_string(), QoS::AtLeastOnce)
            .await
            .map_err(|e| MqttError::SubscriptionFailed(Box::new(e)))?;
        self.drive_until(|route| matches!(route, EventRoute::SubscriptionConfirmed { .. }))
            .await
    }

    async fn next_message(&mut self) -> Result<InboundMessage, MqttError> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(message);
        }

        loop {
            match self.poll_route().await? {
                EventRoute::MessageReceived { topic, payload, .. } => {
                    return Ok(InboundMessage { topic, payload })
                }
                EventRoute::Disconnected => {
                    return Err(MqttError::ConnectionLost(
                        "Broker sent DISCONNECT".to_string(),
                    ))
                }
                other => trace!("MQTT event: {:?}", other),
            }
        }
    }

    async fn disconnect(&mut self) -> Result<(), MqttError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))?;

        // The DISCONNECT packet only leaves once the event loop runs
        let flushed = tokio::time::timeout(DISCONNECT_FLUSH_TIMEOUT, async {
            while self.event_loop.poll().await.is_ok() {}
        })
        .await;
        if flushed.is_err() {
            debug!("Timed out flushing MQTT disconnect");
        }
        Ok(())
    }
}
