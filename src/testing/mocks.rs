//! Mock implementations for testing
//!
//! Provides a mock Wyze [`DeviceApi`] and a scripted in-memory MQTT bus so
//! the listener, refresher and bridge can be exercised without a broker or
//! the Wyze cloud.

use crate::config::WyzeCredentials;
use crate::transport::{BusConnection, BusConnector, InboundMessage, MqttError};
use crate::wyze::{BulbInfo, DeviceApi, DeviceRecord, TokenPair, WyzeError};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// One recorded call against [`MockDeviceApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    Login { email: String },
    RefreshToken { refresh_token: String },
    DevicesList,
    BulbInfo { mac: String },
    PowerState { mac: String, model: String },
    TurnOn { mac: String, model: String },
    TurnOff { mac: String, model: String },
    SetBrightness { mac: String, model: String, value: i64 },
    SetColorTemp { mac: String, model: String, value: i64 },
}

#[derive(Debug, Default)]
struct RefreshCounts {
    calls: u32,
    issued: u32,
}

/// Mock Wyze API
///
/// Login hands out `access-0`/`refresh-0`. The n-th successful refresh
/// hands out `access-n`/`refresh-n`, so chained refreshes are visible in
/// the recorded tokens.
#[derive(Debug, Default)]
pub struct MockDeviceApi {
    devices: Vec<DeviceRecord>,
    bulbs: HashMap<String, BulbInfo>,
    fail_login: bool,
    fail_devices_list: bool,
    fail_control: bool,
    failing_refreshes: Vec<u32>,
    refresh_counts: Mutex<RefreshCounts>,
    calls: Arc<Mutex<Vec<DeviceCall>>>,
}

impl MockDeviceApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(mut self, devices: Vec<DeviceRecord>) -> Self {
        self.devices = devices;
        self
    }

    /// Register the bulb info returned for `mac` (exact match); `power_state`
    /// reads `is_on` from the same entry
    pub fn with_bulb(mut self, mac: &str, info: BulbInfo) -> Self {
        self.bulbs.insert(mac.to_string(), info);
        self
    }

    pub fn failing_login(mut self) -> Self {
        self.fail_login = true;
        self
    }

    pub fn failing_devices_list(mut self) -> Self {
        self.fail_devices_list = true;
        self
    }

    /// Every power, brightness, color temperature and info call fails
    pub fn failing_control(mut self) -> Self {
        self.fail_control = true;
        self
    }

    /// Fail the given refresh call (1-based)
    pub fn failing_refresh_on(mut self, call_number: u32) -> Self {
        self.failing_refreshes.push(call_number);
        self
    }

    pub async fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().await.clone()
    }

    /// Refresh tokens presented so far, in order
    pub async fn refresh_tokens_used(&self) -> Vec<String> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                DeviceCall::RefreshToken { refresh_token } => Some(refresh_token.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn clear_history(&self) {
        self.calls.lock().await.clear();
    }

    async fn record(&self, call: DeviceCall) {
        self.calls.lock().await.push(call);
    }

    fn control_result(&self) -> Result<(), WyzeError> {
        if self.fail_control {
            Err(WyzeError::Api {
                code: "5000".to_string(),
                message: "Mock control failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeviceApi for MockDeviceApi {
    async fn login(&self, credentials: &WyzeCredentials) -> Result<TokenPair, WyzeError> {
        self.record(DeviceCall::Login {
            email: credentials.email.clone(),
        })
        .await;

        if self.fail_login {
            return Err(WyzeError::AuthenticationFailed(
                "Mock login failure".to_string(),
            ));
        }
        Ok(TokenPair::new("access-0", "refresh-0"))
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, WyzeError> {
        self.record(DeviceCall::RefreshToken {
            refresh_token: refresh_token.to_string(),
        })
        .await;

        let mut counts = self.refresh_counts.lock().await;
        counts.calls += 1;
        if self.failing_refreshes.contains(&counts.calls) {
            return Err(WyzeError::Network("Mock refresh failure".to_string()));
        }

        counts.issued += 1;
        Ok(TokenPair::new(
            format!("access-{}", counts.issued),
            format!("refresh-{}", counts.issued),
        ))
    }

    async fn devices_list(&self) -> Result<Vec<DeviceRecord>, WyzeError> {
        self.record(DeviceCall::DevicesList).await;

        if self.fail_devices_list {
            return Err(WyzeError::Http {
                status: 500,
                body: "Mock device list failure".to_string(),
            });
        }
        Ok(self.devices.clone())
    }

    async fn bulb_info(&self, device_mac: &str) -> Result<BulbInfo, WyzeError> {
        self.record(DeviceCall::BulbInfo {
            mac: device_mac.to_string(),
        })
        .await;

        self.control_result()?;
        self.bulbs
            .get(device_mac)
            .cloned()
            .ok_or_else(|| WyzeError::DeviceNotFound(device_mac.to_string()))
    }

    async fn power_state(&self, device_mac: &str, device_model: &str) -> Result<bool, WyzeError> {
        self.record(DeviceCall::PowerState {
            mac: device_mac.to_string(),
            model: device_model.to_string(),
        })
        .await;

        self.control_result()?;
        self.bulbs
            .get(device_mac)
            .map(|info| info.is_on)
            .ok_or_else(|| WyzeError::DeviceNotFound(device_mac.to_string()))
    }

    async fn turn_on(&self, device_mac: &str, device_model: &str) -> Result<(), WyzeError> {
        self.record(DeviceCall::TurnOn {
            mac: device_mac.to_string(),
            model: device_model.to_string(),
        })
        .await;
        self.control_result()
    }

    async fn turn_off(&self, device_mac: &str, device_model: &str) -> Result<(), WyzeError> {
        self.record(DeviceCall::TurnOff {
            mac: device_mac.to_string(),
            model: device_model.to_string(),
        })
        .await;
        self.control_result()
    }

    async fn set_brightness(
        &self,
        device_mac: &str,
        device_model: &str,
        brightness: i64,
    ) -> Result<(), WyzeError> {
        self.record(DeviceCall::SetBrightness {
            mac: device_mac.to_string(),
            model: device_model.to_string(),
            value: brightness,
        })
        .await;
        self.control_result()
    }

    async fn set_color_temp(
        &self,
        device_mac: &str,
        device_model: &str,
        color_temp: i64,
    ) -> Result<(), WyzeError> {
        self.record(DeviceCall::SetColorTemp {
            mac: device_mac.to_string(),
            model: device_model.to_string(),
            value: color_temp,
        })
        .await;
        self.control_result()
    }
}

/// Scripted bus event for one connection epoch
#[derive(Debug, Clone)]
pub enum BusEvent {
    Message { topic: String, payload: Vec<u8> },
    /// The connection drops with this reason
    ConnectionLost(String),
}

impl BusEvent {
    pub fn message(topic: &str, payload: &str) -> Self {
        BusEvent::Message {
            topic: topic.to_string(),
            payload: payload.as_bytes().to_vec(),
        }
    }

    pub fn lost(reason: &str) -> Self {
        BusEvent::ConnectionLost(reason.to_string())
    }
}

/// Everything the mock bus observed; epochs count from 1
#[derive(Debug, Default)]
pub struct BusRecord {
    pub connect_attempts: u32,
    pub connected_at: Vec<Instant>,
    pub published: Vec<(u32, String, Vec<u8>)>,
    pub subscriptions: Vec<(u32, String)>,
    pub disconnects: u32,
}

impl BusRecord {
    pub fn published_in_epoch(&self, epoch: u32) -> Vec<(String, Vec<u8>)> {
        self.published
            .iter()
            .filter(|(e, _, _)| *e == epoch)
            .map(|(_, topic, payload)| (topic.clone(), payload.clone()))
            .collect()
    }
}

/// In-memory [`BusConnector`] driven by a per-epoch script
///
/// Each successful connect consumes the next script. Once a script runs
/// out the connection stays open and silent.
#[derive(Debug, Default)]
pub struct MockBusConnector {
    scripts: VecDeque<Vec<BusEvent>>,
    connect_failures: u32,
    epochs: u32,
    record: Arc<Mutex<BusRecord>>,
}

impl MockBusConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the script for the next connection epoch
    pub fn with_epoch(mut self, events: Vec<BusEvent>) -> Self {
        self.scripts.push_back(events);
        self
    }

    /// Refuse the first `count` connection attempts
    pub fn failing_connects(mut self, count: u32) -> Self {
        self.connect_failures = count;
        self
    }

    pub fn record(&self) -> Arc<Mutex<BusRecord>> {
        Arc::clone(&self.record)
    }
}

#[async_trait]
impl BusConnector for MockBusConnector {
    type Connection = MockBusConnection;

    async fn connect(&mut self) -> Result<MockBusConnection, MqttError> {
        let mut record = self.record.lock().await;
        record.connect_attempts += 1;

        if self.connect_failures > 0 {
            self.connect_failures -= 1;
            return Err(MqttError::ConnectionRefused(
                "Mock broker unavailable".to_string(),
            ));
        }

        self.epochs += 1;
        record.connected_at.push(Instant::now());

        Ok(MockBusConnection {
            epoch: self.epochs,
            events: self.scripts.pop_front().unwrap_or_default().into(),
            record: Arc::clone(&self.record),
        })
    }
}

pub struct MockBusConnection {
    epoch: u32,
    events: VecDeque<BusEvent>,
    record: Arc<Mutex<BusRecord>>,
}

#[async_trait]
impl BusConnection for MockBusConnection {
    async fn publish(&mut self, topic: &str, payload: Vec<u8>) -> Result<(), MqttError> {
        self.record
            .lock()
            .await
            .published
            .push((self.epoch, topic.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&mut self, filter: &str) -> Result<(), MqttError> {
        self.record
            .lock()
            .await
            .subscriptions
            .push((self.epoch, filter.to_string()));
        Ok(())
    }

    async fn next_message(&mut self) -> Result<InboundMessage, MqttError> {
        match self.events.pop_front() {
            Some(BusEvent::Message { topic, payload }) => Ok(InboundMessage { topic, payload }),
            Some(BusEvent::ConnectionLost(reason)) => Err(MqttError::ConnectionLost(reason)),
            None => std::future::pending().await,
        }
    }

    async fn disconnect(&mut self) -> Result<(), MqttError> {
        self.record.lock().await.disconnects += 1;
        Ok(())
    }
}
