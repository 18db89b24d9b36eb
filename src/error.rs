//! Client error taxonomy
//!
//! Component errors ([`TransportError`], [`RestError`], [`ConfigError`],
//! [`crate::protocol::DecodeError`]) live next to their components. [`ClientError`] is
//! what the lifecycle API returns, with [`ErrorCode`] giving the numeric codes hosts
//! switch on.

use crate::config::ConfigError;
use crate::gateway::GatewayState;
use crate::rest::RestError;
use crate::transport::TransportError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Errors returned by the lifecycle API
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Already connected to the gateway (state: {state})")]
    AlreadyConnected { state: GatewayState },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Bot token rejected")]
    Unauthorized,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Numeric error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    AlreadyConnected = 1,
    Network = 2,
    Protocol = 3,
    Config = 4,
    Unauthorized = 5,
}

impl ErrorCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

impl From<RestError> for ClientError {
    fn from(error: RestError) -> Self {
        match error {
            RestError::Protocol(message) => ClientError::Protocol { message },
            RestError::Unauthorized => ClientError::Unauthorized,
            other => ClientError::Network {
                message: other.to_string(),
            },
        }
    }
}

impl ClientError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::AlreadyConnected { .. } => ErrorCode::AlreadyConnected,
            ClientError::Transport(_) | ClientError::Network { .. } => ErrorCode::Network,
            ClientError::Protocol { .. } => ErrorCode::Protocol,
            ClientError::Config(_) => ErrorCode::Config,
            ClientError::Unauthorized => ErrorCode::Unauthorized,
        }
    }

    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Display text with secrets removed, safe to log
    pub fn sanitized(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("valid secret pattern")
});

static AUTH_HEADER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(Bot|Bearer)\s+[A-Za-z0-9._\-]{8,}").expect("valid auth pattern"));

const MAX_MESSAGE_LEN: usize = 500;

/// Redact credentials and cap the length of text headed for the log
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = SECRET_PATTERN.replace_all(message, "${1}=***");
    let mut sanitized = AUTH_HEADER_PATTERN
        .replace_all(&sanitized, "${1} ***")
        .into_owned();

    if sanitized.len() > MAX_MESSAGE_LEN {
        let suffix = "...[truncated]";
        let mut cut = MAX_MESSAGE_LEN - suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(suffix);
    }

    sanitized
}

/// Result type for lifecycle operations
pub type ClientResult<T> = Result<T, ClientError>;
