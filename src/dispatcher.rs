//! Command dispatcher
//!
//! Turns one inbound `(device mac, payload)` pair into a bulb operation.
//! Every failure comes back as a value; the caller logs it and moves on to
//! the next message.

use crate::control::{BulbController, LightLevels};
use crate::wyze::WyzeError;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Payload of a `<root>/<mac>/set` message
///
/// `brightness` and `temperature` are kept as raw JSON; `null` counts as
/// absent. They are only interpreted when a power-on needs both.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LightCommand {
    pub state: String,
    #[serde(default)]
    pub brightness: Option<Value>,
    #[serde(default)]
    pub temperature: Option<Value>,
}

impl LightCommand {
    /// Both levels as integers, or `None` when either one is missing
    pub fn levels(&self) -> Result<Option<LightLevels>, DispatchError> {
        match (&self.brightness, &self.temperature) {
            (Some(brightness), Some(temperature)) => Ok(Some(LightLevels {
                brightness: level_value("brightness", brightness)?,
                color_temp: level_value("temperature", temperature)?,
            })),
            _ => Ok(None),
        }
    }
}

/// Integers and integral floats are accepted; anything else is rejected
fn level_value(field: &'static str, value: &Value) -> Result<i64, DispatchError> {
    value
        .as_i64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
                .map(|v| v as i64)
        })
        .ok_or_else(|| DispatchError::InvalidLevel {
            field,
            value: value.to_string(),
        })
}

/// Requested power state after normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightState {
    On,
    Off,
    Toggle,
}

impl LightState {
    /// Trim surrounding whitespace, then match exactly (case-sensitive)
    pub fn parse(state: &str) -> Option<Self> {
        match state.trim() {
            "on" => Some(LightState::On),
            "off" => Some(LightState::Off),
            "toggle" => Some(LightState::Toggle),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LightState::On => "on",
            LightState::Off => "off",
            LightState::Toggle => "toggle",
        }
    }
}

/// What happened to a well-formed message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Executed(LightState),
    /// The `state` field named no known command
    Ignored { state: String },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to decode message: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("Invalid {field} value: {value}")]
    InvalidLevel { field: &'static str, value: String },
    #[error("Device command failed: {0}")]
    Control(#[from] WyzeError),
}

pub struct CommandDispatcher {
    controller: BulbController,
}

impl CommandDispatcher {
    pub fn new(controller: BulbController) -> Self {
        Self { controller }
    }

    /// Parse a raw payload (pure function)
    pub fn parse_command(payload: &[u8]) -> Result<LightCommand, DispatchError> {
        Ok(serde_json::from_slice(payload)?)
    }

    pub async fn dispatch(
        &self,
        device_mac: &str,
        payload: &[u8],
    ) -> Result<DispatchOutcome, DispatchError> {
        let command = Self::parse_command(payload)?;

        let Some(state) = LightState::parse(&command.state) else {
            return Ok(DispatchOutcome::Ignored {
                state: command.state,
            });
        };

        match state {
            LightState::On => {
                let levels = command.levels()?;
                self.controller.turn_on(device_mac, levels).await?
            }
            LightState::Off => self.controller.turn_off(device_mac).await?,
            LightState::Toggle => {
                let levels = command.levels()?;
                self.controller.toggle(device_mac, levels).await?
            }
        }

        Ok(DispatchOutcome::Executed(state))
    }
}
