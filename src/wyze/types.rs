//! Data shapes exchanged with the Wyze API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque description of one device, exactly as the service returned it
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct DeviceRecord(Map<String, Value>);

impl DeviceRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn mac(&self) -> Option<&str> {
        self.0.get("mac").and_then(Value::as_str)
    }

    pub fn product_model(&self) -> Option<&str> {
        self.0.get("product_model").and_then(Value::as_str)
    }

    pub fn nickname(&self) -> Option<&str> {
        self.0.get("nickname").and_then(Value::as_str)
    }

    /// Power state from `device_params.switch_state`, when present
    pub fn switch_state(&self) -> Option<bool> {
        let state = self.0.get("device_params")?.get("switch_state")?;
        match state {
            Value::Number(n) => n.as_i64().map(|v| v == 1),
            Value::String(s) => Some(s == "1"),
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Serialize the record for publication on the bus
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }
}

impl From<Value> for DeviceRecord {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self(fields),
            _ => Self::default(),
        }
    }
}

/// Live bulb state as reported by the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulbInfo {
    /// Device address in the service's own format
    pub mac: String,
    pub model: String,
    pub is_on: bool,
}

/// Access/refresh token pair for the device-control session
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}
