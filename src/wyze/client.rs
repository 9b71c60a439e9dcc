//! Wyze HTTP API client
//!
//! Login goes to the authentication service; everything else is a JSON POST
//! against the application API carrying a common set of app fields and the
//! session's current access token.

use super::session::Session;
use super::types::{BulbInfo, DeviceRecord, TokenPair};
use super::{DeviceApi, WyzeError};
use crate::config::{WyzeCredentials, WyzeSection};
use crate::error::sanitize_error_message;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const APP_NAME: &str = "com.hualai.WyzeCam";
const APP_VERSION: &str = "2.18.43";
const APP_SC: &str = "9f275790cab94a72bd206c8876429f3c";
const APP_SV: &str = "9d74946e652647e9b6c9d59326aef104";
const USER_AGENT: &str = concat!("wyze2mqtt/", env!("CARGO_PKG_VERSION"));

/// Property id for power (`"1"` on, `"0"` off)
pub const PID_POWER: &str = "P3";
/// Property id for brightness
pub const PID_BRIGHTNESS: &str = "P1501";
/// Property id for color temperature
pub const PID_COLOR_TEMP: &str = "P1502";

/// Wyze client configuration
#[derive(Debug, Clone)]
pub struct WyzeClientConfig {
    pub auth_url: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for WyzeClientConfig {
    fn default() -> Self {
        Self::from(&WyzeSection::default())
    }
}

impl From<&WyzeSection> for WyzeClientConfig {
    fn from(section: &WyzeSection) -> Self {
        Self {
            auth_url: section.auth_url.trim_end_matches('/').to_string(),
            api_url: section.api_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(section.timeout_secs),
        }
    }
}

/// HTTP implementation of [`DeviceApi`]
pub struct WyzeClient {
    config: WyzeClientConfig,
    client: Client,
    session: Session,
    phone_id: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    mfa_options: Option<Value>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    code: Value,
    msg: Option<String>,
    data: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct PropertyEntry {
    pid: String,
    value: Value,
}

impl WyzeClient {
    /// Create a client that reads its access token from `session`
    pub fn new(config: WyzeClientConfig, session: Session) -> Result<Self, WyzeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WyzeError::Network(e.to_string()))?;

        Ok(Self {
            config,
            client,
            session,
            phone_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Wyze expects the password hashed with MD5 three times (pure function)
    pub fn hash_password(password: &str) -> String {
        let mut hashed = password.to_string();
        for _ in 0..3 {
            hashed = format!("{:x}", md5::compute(hashed.as_bytes()));
        }
        hashed
    }

    /// Build a request body with the common app fields (pure function)
    fn build_request_body(phone_id: &str, access_token: &str, extra: Value) -> Value {
        let mut body = Map::new();
        body.insert("sc".to_string(), json!(APP_SC));
        body.insert("sv".to_string(), json!(APP_SV));
        body.insert("app_ver".to_string(), json!(format!("{APP_NAME}___{APP_VERSION}")));
        body.insert("app_version".to_string(), json!(APP_VERSION));
        body.insert("app_name".to_string(), json!(APP_NAME));
        body.insert("phone_system_type".to_string(), json!(1));
        body.insert("phone_id".to_string(), json!(phone_id));
        body.insert(
            "ts".to_string(),
            json!(chrono::Utc::now().timestamp_millis()),
        );
        body.insert("access_token".to_string(), json!(access_token));

        if let Value::Object(fields) = extra {
            body.extend(fields);
        }
        Value::Object(body)
    }

    /// Unwrap the `{code, msg, data}` envelope (pure function)
    fn parse_envelope(envelope: ApiEnvelope) -> Result<Value, WyzeError> {
        let code = match &envelope.code {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        if code == "1" {
            Ok(envelope.data.unwrap_or(Value::Null))
        } else {
            Err(WyzeError::Api {
                code,
                message: envelope.msg.unwrap_or_default(),
            })
        }
    }

    /// Extract a token pair from a refresh response `data` object (pure function)
    fn parse_token_pair(data: &Value) -> Result<TokenPair, WyzeError> {
        let access_token = data.get("access_token").and_then(Value::as_str);
        let refresh_token = data.get("refresh_token").and_then(Value::as_str);

        match (access_token, refresh_token) {
            (Some(access), Some(refresh)) => Ok(TokenPair::new(access, refresh)),
            _ => Err(WyzeError::InvalidResponse(
                "token response missing access_token or refresh_token".to_string(),
            )),
        }
    }

    /// Read the power property out of a property list (pure function)
    fn power_state_from_properties(properties: &[PropertyEntry]) -> Option<bool> {
        properties
            .iter()
            .find(|entry| entry.pid == PID_POWER)
            .map(|entry| match &entry.value {
                Value::String(s) => s == "1",
                Value::Number(n) => n.as_i64() == Some(1),
                _ => false,
            })
    }

    /// Make a single application API request (impure I/O)
    async fn post_api(&self, path: &str, extra: Value) -> Result<Value, WyzeError> {
        let body = Self::build_request_body(&self.phone_id, &self.session.access_token(), extra);
        let url = format!("{}{}", self.config.api_url, path);

        debug!("Wyze API request: {}", path);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| WyzeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WyzeError::Http {
                status: status.as_u16(),
                body: sanitize_error_message(&body),
            });
        }

        let envelope: ApiEnvelope = response
            .json()
            .await
            .map_err(|e| WyzeError::InvalidResponse(e.to_string()))?;

        let result = Self::parse_envelope(envelope);
        if let Err(ref e) = result {
            if e.is_token_expired() {
                warn!("Wyze access token expired; waiting for the next session refresh");
            }
        }
        result
    }

    async fn set_property(
        &self,
        device_mac: &str,
        device_model: &str,
        pid: &str,
        value: String,
    ) -> Result<(), WyzeError> {
        self.post_api(
            "/app/v2/device/set_property",
            json!({
                "device_mac": device_mac,
                "device_model": device_model,
                "pid": pid,
                "pvalue": value,
            }),
        )
        .await?;

        debug!("Set {} = {} on {} ({})", pid, value, device_mac, device_model);
        Ok(())
    }

    /// Power property from the device's property list; `None` when absent
    async fn fetch_power_state(
        &self,
        device_mac: &str,
        device_model: &str,
    ) -> Result<Option<bool>, WyzeError> {
        let data = self
            .post_api(
                "/app/v2/device/get_property_list",
                json!({
                    "device_mac": device_mac,
                    "device_model": device_model,
                    "target_pid_list": [],
                }),
            )
            .await?;

        let properties: Vec<PropertyEntry> = data
            .get("property_list")
            .cloned()
            .map(serde_json::from_value::<Vec<PropertyEntry>>)
            .transpose()
            .map_err(|e| WyzeError::InvalidResponse(format!("property_list: {e}")))?
            .unwrap_or_default();

        Ok(Self::power_state_from_properties(&properties))
    }
}

#[async_trait]
impl DeviceApi for WyzeClient {
    async fn login(&self, credentials: &WyzeCredentials) -> Result<TokenPair, WyzeError> {
        info!("Starting Wyze login for {}", credentials.email);

        let response = self
            .client
            .post(format!("{}/api/user/login", self.config.auth_url))
            .header("keyid", &credentials.key_id)
            .header("apikey", &credentials.api_key)
            .json(&json!({
                "email": credentials.email,
                "password": Self::hash_password(&credentials.password),
            }))
            .send()
            .await
            .map_err(|e| WyzeError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WyzeError::AuthenticationFailed(format!(
                "login rejected with status {}: {}",
                status.as_u16(),
                sanitize_error_message(&body)
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| WyzeError::InvalidResponse(e.to_string()))?;

        match (login.access_token, login.refresh_token) {
            (Some(access), Some(refresh)) if !access.is_empty() => {
                info!("Wyze login complete");
                Ok(TokenPair::new(access, refresh))
            }
            _ if login.mfa_options.as_ref().is_some_and(|v| !v.is_null()) => {
                Err(WyzeError::AuthenticationFailed(
                    "account requires multi-factor authentication, which is not supported"
                        .to_string(),
                ))
            }
            _ => Err(WyzeError::AuthenticationFailed(
                login
                    .description
                    .unwrap_or_else(|| "login response carried no tokens".to_string()),
            )),
        }
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, WyzeError> {
        let data = self
            .post_api(
                "/app/user/refresh_token",
                json!({ "refresh_token": refresh_token }),
            )
            .await?;

        Self::parse_token_pair(&data)
    }

    async fn devices_list(&self) -> Result<Vec<DeviceRecord>, WyzeError> {
        let data = self
            .post_api("/app/v2/home_page/get_object_list", json!({}))
            .await?;

        let devices = data
            .get("device_list")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));

        let records: Vec<DeviceRecord> = serde_json::from_value(devices)
            .map_err(|e| WyzeError::InvalidResponse(format!("device_list: {e}")))?;

        debug!("Fetched {} devices from Wyze", records.len());
        Ok(records)
    }

    async fn bulb_info(&self, device_mac: &str) -> Result<BulbInfo, WyzeError> {
        let devices = self.devices_list().await?;
        let record = devices
            .iter()
            .find(|d| d.mac().is_some_and(|mac| mac.eq_ignore_ascii_case(device_mac)))
            .ok_or_else(|| WyzeError::DeviceNotFound(device_mac.to_string()))?;

        let mac = record.mac().unwrap_or(device_mac).to_string();
        let model = record
            .product_model()
            .ok_or_else(|| {
                WyzeError::InvalidResponse(format!("device {mac} has no product_model"))
            })?
            .to_string();

        let is_on = self
            .fetch_power_state(&mac, &model)
            .await?
            .or_else(|| record.switch_state())
            .unwrap_or(false);

        Ok(BulbInfo { mac, model, is_on })
    }

    async fn power_state(&self, device_mac: &str, device_model: &str) -> Result<bool, WyzeError> {
        Ok(self
            .fetch_power_state(device_mac, device_model)
            .await?
            .unwrap_or(false))
    }

    async fn turn_on(&self, device_mac: &str, device_model: &str) -> Result<(), WyzeError> {
        self.set_property(device_mac, device_model, PID_POWER, "1".to_string())
            .await
    }

    async fn turn_off(&self, device_mac: &str, device_model: &str) -> Result<(), WyzeError> {
        self.set_property(device_mac, device_model, PID_POWER, "0".to_string())
            .await
    }

    async fn set_brightness(
        &self,
        device_mac: &str,
        device_model: &str,
        brightness: i64,
    ) -> Result<(), WyzeError> {
        self.set_property(
            device_mac,
            device_model,
            PID_BRIGHTNESS,
            brightness.to_string(),
        )
        .await
    }

    async fn set_color_temp(
        &self,
        device_mac: &str,
        device_model: &str,
        color_temp: i64,
    ) -> Result<(), WyzeError> {
        self.set_property(
            device_mac,
            device_model,
            PID_COLOR_TEMP,
            color_temp.to_string(),
        )
        .await
    }
}
