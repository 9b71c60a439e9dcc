//! Wyze device-control API
//!
//! The bridge only talks to Wyze through the [`DeviceApi`] trait so the
//! command path can be exercised against mocks. [`WyzeClient`] is the HTTP
//! implementation used by the binary.

use async_trait::async_trait;
use thiserror::Error;

pub mod client;
pub mod session;
pub mod types;

pub use client::{WyzeClient, WyzeClientConfig};
pub use session::Session;
pub use types::{BulbInfo, DeviceRecord, TokenPair};

use crate::config::WyzeCredentials;

/// Remote device-control operations needed by the bridge
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Exchange account credentials for a fresh token pair
    async fn login(&self, credentials: &WyzeCredentials) -> Result<TokenPair, WyzeError>;

    /// Exchange a refresh token for a new token pair
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair, WyzeError>;

    /// Fetch every device registered on the account
    async fn devices_list(&self) -> Result<Vec<DeviceRecord>, WyzeError>;

    /// Current power state plus the mac/model as the service reports them
    async fn bulb_info(&self, device_mac: &str) -> Result<BulbInfo, WyzeError>;

    /// Current power state of a device whose mac and model are already known
    async fn power_state(&self, device_mac: &str, device_model: &str) -> Result<bool, WyzeError>;

    async fn turn_on(&self, device_mac: &str, device_model: &str) -> Result<(), WyzeError>;

    async fn turn_off(&self, device_mac: &str, device_model: &str) -> Result<(), WyzeError>;

    async fn set_brightness(
        &self,
        device_mac: &str,
        device_model: &str,
        brightness: i64,
    ) -> Result<(), WyzeError>;

    async fn set_color_temp(
        &self,
        device_mac: &str,
        device_model: &str,
        color_temp: i64,
    ) -> Result<(), WyzeError>;
}

/// Wyze API errors
#[derive(Debug, Clone, Error)]
pub enum WyzeError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Wyze API error {code}: {message}")]
    Api { code: String, message: String },
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}

impl WyzeError {
    /// Wyze reports an expired access token with API code 2001
    pub fn is_token_expired(&self) -> bool {
        matches!(self, WyzeError::Api { code, .. } if code == "2001")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wyze_error_display() {
        let errors = vec![
            WyzeError::AuthenticationFailed("test".to_string()),
            WyzeError::Api {
                code: "1001".to_string(),
                message: "test".to_string(),
            },
            WyzeError::Http {
                status: 500,
                body: "test".to_string(),
            },
            WyzeError::Network("test".to_string()),
            WyzeError::InvalidResponse("test".to_string()),
            WyzeError::DeviceNotFound("test".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_token_expired_detection() {
        let expired = WyzeError::Api {
            code: "2001".to_string(),
            message: "AccessTokenError".to_string(),
        };
        assert!(expired.is_token_expired());
        assert!(!WyzeError::Network("timeout".to_string()).is_token_expired());
    }
}
