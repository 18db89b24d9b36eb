//! REST API client
//!
//! Covers the calls the gateway lifecycle needs (gateway discovery, token validation) and
//! the one outbound action bots need most, posting a message. Every call owns its own
//! [`ResponseBuffer`], so the client is safe to use from inside an event handler while the
//! gateway is mid-tick.
//!
//! Failed calls are logged at error level through the client's [`Logger`] before the error
//! is returned.

use crate::config::ClientSettings;
use crate::error::sanitize_error_message;
use crate::observability::Logger;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::debug;

pub mod buffer;

pub use buffer::ResponseBuffer;

/// REST failures
#[derive(Debug, Error)]
pub enum RestError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Bot token rejected by the API")]
    Unauthorized,
    #[error("Unexpected response body: {0}")]
    Protocol(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl RestError {
    /// True when the call completed but the peer answered with data we cannot use
    pub fn is_protocol(&self) -> bool {
        matches!(self, RestError::Protocol(_))
    }
}

/// Response of `GET /gateway/bot`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayBotInfo {
    pub url: String,
    pub shards: u32,
    #[serde(default)]
    pub session_start_limit: Option<SessionStartLimit>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionStartLimit {
    pub total: u32,
    pub remaining: u32,
    pub reset_after: u64,
    #[serde(default)]
    pub max_concurrency: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

/// HTTP client bound to one bot token
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
    logger: Logger,
}

impl fmt::Debug for RestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    pub fn new(token: &str, settings: &ClientSettings) -> Result<Self, RestError> {
        let mut authorization = HeaderValue::from_str(&format!("Bot {token}"))
            .map_err(|_| RestError::InvalidInput("token is not a valid header value".into()))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);

        let http = Client::builder()
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            logger: Logger::default(),
        })
    }

    /// Log through `logger` instead of a default one, normally the owning context's
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn logged<T>(&self, call: &str, result: Result<T, RestError>) -> Result<T, RestError> {
        if let Err(e) = &result {
            self.logger.error(format!(
                "{call} failed: {}",
                sanitize_error_message(&e.to_string())
            ));
        }
        result
    }

    /// Read the whole body, turning non-success statuses into errors
    async fn read_body(mut response: Response) -> Result<ResponseBuffer, RestError> {
        let status = response.status();

        let mut buffer = ResponseBuffer::new();
        while let Some(chunk) = response.chunk().await? {
            buffer.extend_from_slice(&chunk);
        }

        if status == StatusCode::UNAUTHORIZED {
            return Err(RestError::Unauthorized);
        }
        if !status.is_success() {
            return Err(RestError::Status {
                status: status.as_u16(),
                body: buffer.to_string_lossy(),
            });
        }
        Ok(buffer)
    }

    /// `GET /gateway`: the URL to open the streaming connection against
    pub async fn get_gateway_url(&self) -> Result<String, RestError> {
        let result = self.fetch_gateway_url().await;
        self.logged("GET /gateway", result)
    }

    /// `GET /gateway/bot`: authenticated discovery, fails with `Unauthorized` on a bad token
    pub async fn validate_token(&self) -> Result<GatewayBotInfo, RestError> {
        let result = self.fetch_gateway_bot().await;
        self.logged("GET /gateway/bot", result)
    }

    /// `POST /channels/{channel_id}/messages` with `{"content": ...}`
    pub async fn post_message(&self, channel_id: &str, content: &str) -> Result<(), RestError> {
        let result = self.create_message(channel_id, content).await;
        self.logged(&format!("POST /channels/{channel_id}/messages"), result)
    }

    async fn fetch_gateway_url(&self) -> Result<String, RestError> {
        let response = self.http.get(self.endpoint("/gateway")).send().await?;
        let buffer = Self::read_body(response).await?;

        debug!("received data from /gateway: {}", buffer.to_string_lossy());
        parse_gateway_url(&buffer)
    }

    async fn fetch_gateway_bot(&self) -> Result<GatewayBotInfo, RestError> {
        let response = self.http.get(self.endpoint("/gateway/bot")).send().await?;
        let buffer = Self::read_body(response).await?;

        buffer
            .decode_json()
            .map_err(|e| RestError::Protocol(format!("gateway/bot: {e}")))
    }

    async fn create_message(&self, channel_id: &str, content: &str) -> Result<(), RestError> {
        if channel_id.is_empty() || !channel_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(RestError::InvalidInput(format!(
                "invalid channel id {channel_id:?}"
            )));
        }
        if content.is_empty() {
            return Err(RestError::InvalidInput(
                "message content must not be empty".to_string(),
            ));
        }

        let response = self
            .http
            .post(self.endpoint(&format!("/channels/{channel_id}/messages")))
            .json(&CreateMessage { content })
            .send()
            .await?;
        Self::read_body(response).await?;

        debug!(channel_id, "message posted");
        Ok(())
    }
}

/// The discovery body is either a bare JSON string or an object with a string `url`
pub fn parse_gateway_url(buffer: &ResponseBuffer) -> Result<String, RestError> {
    let value: Value = buffer.decode_json().map_err(|e| {
        RestError::Protocol(format!(
            "couldn't decode /gateway response {:?}: {e}",
            buffer.to_string_lossy()
        ))
    })?;

    match value {
        Value::String(url) => Ok(url),
        Value::Object(ref fields) => match fields.get("url") {
            Some(Value::String(url)) => Ok(url.clone()),
            _ => Err(RestError::Protocol(format!(
                "/gateway response carries no string url: {value}"
            ))),
        },
        other => Err(RestError::Protocol(format!(
            "/gateway response is not a string: {other}"
        ))),
    }
}
