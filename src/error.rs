//! Top-level error types for the bridge
//!
//! Component errors ([`ConfigError`], [`WyzeError`], [`MqttError`]) convert
//! into [`BridgeError`] with `?`. Only startup errors are fatal; once the
//! bridge is running every failure is logged and absorbed.

use crate::config::ConfigError;
use crate::transport::MqttError;
use crate::wyze::WyzeError;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

const MAX_ERROR_MESSAGE_LEN: usize = 500;
const TRUNCATE_SUFFIX: &str = "...[truncated]";

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Wyze API error: {0}")]
    DeviceApi(#[from] WyzeError),

    #[error("Transport error: {0}")]
    Transport(#[from] MqttError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl BridgeError {
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

fn secret_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r#"(?i)(password|token|key|secret)("?\s*[=:]\s*"?)[^\s",}]+"#).ok())
        .as_ref()
}

/// Redact credential-looking values and cap the length of an upstream
/// error message before it is logged
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = match secret_pattern() {
        Some(pattern) => pattern.replace_all(message, "${1}${2}***").to_string(),
        None => message.to_string(),
    };

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let mut cut = MAX_ERROR_MESSAGE_LEN - TRUNCATE_SUFFIX.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(TRUNCATE_SUFFIX);
    }

    sanitized
}
