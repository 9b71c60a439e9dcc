//! MQTT listener state machine
//!
//! One connection epoch is: connect, publish the device inventory (per
//! [`InventoryPolicy`]), subscribe to `<root>/+/set`, then consume
//! commands until the connection drops. A dropped connection waits out the
//! reconnect delay and starts a new epoch; retries never give up. Commands
//! are dispatched one at a time in arrival order.
//!
//! ```text
//! Connecting -> Connected -> Subscribed -> Streaming
//!      ^                                      |
//!      +---- Reconnecting <- Disconnected <---+
//! ```

use crate::config::{BridgeSection, InventoryPolicy};
use crate::directory::DeviceDirectory;
use crate::dispatcher::{CommandDispatcher, DispatchOutcome};
use crate::shutdown;
use crate::transport::mqtt::{ConnectionState, ReconnectConfig, TopicBuilder};
use crate::transport::{BusConnection, BusConnector, InboundMessage, MqttError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

/// Listener settings taken from the `[bridge]` config section
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    pub command_root: String,
    pub inventory_topic: String,
    pub inventory_policy: InventoryPolicy,
    pub reconnect: ReconnectConfig,
}

impl From<&BridgeSection> for ListenerSettings {
    fn from(section: &BridgeSection) -> Self {
        Self {
            command_root: section.command_root.clone(),
            inventory_topic: section.inventory_topic.clone(),
            inventory_policy: section.inventory_publish,
            reconnect: ReconnectConfig::from(section),
        }
    }
}

impl Default for ListenerSettings {
    fn default() -> Self {
        Self::from(&BridgeSection::default())
    }
}

pub struct BusListener<C: BusConnector> {
    connector: C,
    directory: Arc<DeviceDirectory>,
    dispatcher: CommandDispatcher,
    settings: ListenerSettings,
    command_filter: String,
    inventory_published: bool,
    reconnect_attempts: u32,
    epoch: u32,
    state_tx: watch::Sender<ConnectionState>,
}

impl<C: BusConnector> BusListener<C> {
    pub fn new(
        connector: C,
        directory: Arc<DeviceDirectory>,
        dispatcher: CommandDispatcher,
        settings: ListenerSettings,
    ) -> Self {
        let command_filter = TopicBuilder::command_filter(&settings.command_root);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected(
            "Not started".to_string(),
        ));

        Self {
            connector,
            directory,
            dispatcher,
            settings,
            command_filter,
            inventory_published: false,
            reconnect_attempts: 0,
            epoch: 0,
            state_tx,
        }
    }

    /// Watch the connection state
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn command_filter(&self) -> &str {
        &self.command_filter
    }

    /// Whether the inventory has been published on any epoch yet
    pub fn inventory_published(&self) -> bool {
        self.inventory_published
    }

    /// Number of connection epochs started so far
    pub fn epochs(&self) -> u32 {
        self.epoch
    }

    /// Decide whether this epoch publishes the inventory (pure function)
    pub fn should_publish_inventory(policy: InventoryPolicy, already_published: bool) -> bool {
        match policy {
            InventoryPolicy::EveryConnection => true,
            InventoryPolicy::Once => !already_published,
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state.clone());
        if previous != state {
            debug!("Listener state: {:?} -> {:?}", previous, state);
        }
    }

    /// Run epochs until shutdown is requested
    pub async fn run(&mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!("Started MQTT listener for {}", self.command_filter);

        while !shutdown::is_requested(&shutdown_rx) {
            let reason = match self.run_epoch(&mut shutdown_rx).await {
                Ok(()) => break,
                Err(e) => e.to_string(),
            };
            if shutdown::is_requested(&shutdown_rx) {
                break;
            }

            self.set_state(ConnectionState::Disconnected(reason.clone()));
            let attempt = self.reconnect_attempts.saturating_add(1);
            let delay = self.settings.reconnect.calculate_backoff_delay(attempt);
            warn!(
                "MQTT connection lost ({}), reconnecting in {:?} (attempt {})",
                reason, delay, attempt
            );

            if !shutdown::interruptible_sleep(&mut shutdown_rx, delay).await {
                break;
            }
            self.reconnect_attempts = attempt;
            self.set_state(ConnectionState::Reconnecting(attempt));
        }

        self.set_state(ConnectionState::Stopped);
        info!("MQTT listener stopped");
    }

    /// One connection epoch; `Ok` only when shutdown ended it
    async fn run_epoch(&mut self, shutdown_rx: &mut watch::Receiver<bool>) -> Result<(), MqttError> {
        self.set_state(ConnectionState::Connecting);

        let mut connection = tokio::select! {
            connection = self.connector.connect() => connection?,
            _ = shutdown::requested(shutdown_rx) => return Ok(()),
        };

        self.epoch += 1;
        self.reconnect_attempts = 0;
        self.set_state(ConnectionState::Connected);
        info!(epoch = self.epoch, "Connected to MQTT broker");

        let span = crate::mqtt_span!(epoch = self.epoch);
        let result = async {
            if Self::should_publish_inventory(
                self.settings.inventory_policy,
                self.inventory_published,
            ) {
                self.publish_inventory(&mut connection).await?;
                self.inventory_published = true;
            }

            connection.subscribe(&self.command_filter).await?;
            self.set_state(ConnectionState::Subscribed);
            info!("Subscribed to {}", self.command_filter);

            self.set_state(ConnectionState::Streaming);
            self.stream(&mut connection, shutdown_rx).await
        }
        .instrument(span)
        .await;

        if result.is_ok() {
            if let Err(e) = connection.disconnect().await {
                debug!("MQTT disconnect failed: {}", e);
            }
        }
        result
    }

    async fn publish_inventory(&self, connection: &mut C::Connection) -> Result<(), MqttError> {
        let payloads = self.directory.inventory_payloads();
        let count = payloads.len();

        for payload in payloads {
            connection
                .publish(&self.settings.inventory_topic, payload)
                .await?;
        }

        info!(
            "Published {} devices to {}",
            count, self.settings.inventory_topic
        );
        Ok(())
    }

    async fn stream(
        &self,
        connection: &mut C::Connection,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> Result<(), MqttError> {
        loop {
            let message = tokio::select! {
                message = connection.next_message() => message?,
                _ = shutdown::requested(shutdown_rx) => return Ok(()),
            };
            self.handle_message(message).await;
        }
    }

    /// Dispatch one inbound message; failures are logged, never returned
    async fn handle_message(&self, message: InboundMessage) {
        debug!(
            "[{}] {}",
            message.topic,
            String::from_utf8_lossy(&message.payload)
        );

        if !TopicBuilder::matches_filter(&self.command_filter, &message.topic) {
            debug!("Ignoring message on {}", message.topic);
            return;
        }
        let Some(device_mac) =
            TopicBuilder::device_address(&self.settings.command_root, &message.topic)
        else {
            debug!("No device address in {}", message.topic);
            return;
        };

        let span = crate::command_span!(device_mac = %device_mac);
        async {
            match self.dispatcher.dispatch(device_mac, &message.payload).await {
                Ok(DispatchOutcome::Executed(state)) => {
                    info!("Executed '{}' on {}", state.as_str(), device_mac)
                }
                Ok(DispatchOutcome::Ignored { state }) => {
                    debug!("Ignoring unknown state {:?} for {}", state, device_mac)
                }
                Err(e) => error!("Failed to handle command for {}: {}", device_mac, e),
            }
        }
        .instrument(span)
        .await;
    }
}
