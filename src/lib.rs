//! wyze2mqtt - MQTT bridge for Wyze smart bulbs
//!
//! Listens for JSON commands on `<root>/<mac>/set` and turns them into Wyze
//! cloud API calls, publishes the account's device inventory to the broker
//! on connect, and keeps the Wyze session alive with periodic token
//! refreshes.
//!
//! # Overview
//!
//! - [`wyze`] - Wyze HTTP client, token session and device types
//! - [`directory`] - Device list fetched once at startup
//! - [`control`] / [`dispatcher`] - Command payloads to bulb operations
//! - [`listener`] - MQTT connection state machine with reconnects
//! - [`refresher`] - Periodic token refresh
//! - [`bridge`] - Startup and concurrent supervision of the above
//!
//! # Quick Start
//!
//! ```rust
//! use wyze2mqtt::dispatcher::{CommandDispatcher, LightState};
//!
//! let command = CommandDispatcher::parse_command(br#"{"state":"on","brightness":80}"#).unwrap();
//! assert_eq!(LightState::parse(&command.state), Some(LightState::On));
//! assert_eq!(command.levels().unwrap(), None);
//! ```

pub mod bridge;
pub mod config;
pub mod control;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod observability;
pub mod refresher;
pub mod shutdown;
pub mod testing;
pub mod transport;
pub mod wyze;

pub use bridge::Bridge;
pub use config::*;
pub use error::{BridgeError, BridgeResult};
pub use transport::mqtt::RumqttcConnector;
