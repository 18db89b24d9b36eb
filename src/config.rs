//! Bot configuration
//!
//! A TOML file with three optional sections. Every field has a default, so an empty file
//! is a valid configuration that talks to the production service.
//!
//! ```toml
//! [bot]
//! token_env = "DISCORD_BOT_TOKEN"
//! log_level = 31
//!
//! [api]
//! base_url = "https://discord.com/api/v10"
//! request_timeout_secs = 30
//!
//! [gateway]
//! version = 10
//! intents = 33281
//! handshake_timeout_secs = 10
//! ```
//!
//! The token itself never lives in the file; `token_env` names the environment variable
//! that holds it.

use crate::observability::LogLevel;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_TOKEN_ENV: &str = "DISCORD_BOT_TOKEN";

/// GUILDS | GUILD_MESSAGES | MESSAGE_CONTENT
pub const DEFAULT_INTENTS: u64 = 1 | (1 << 9) | (1 << 15);

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BotConfig {
    #[serde(default)]
    pub bot: BotSection,
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub gateway: GatewaySection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BotSection {
    /// Environment variable containing the bot token
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Bitmask of enabled log severities (error=1, warning=2, info=4, notice=8, debug=16)
    #[serde(default = "default_log_level")]
    pub log_level: u32,
}

impl Default for BotSection {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewaySection {
    /// Gateway protocol version appended to the discovered URL
    #[serde(default = "default_gateway_version")]
    pub version: u8,
    #[serde(default = "default_intents")]
    pub intents: u64,
    /// Call `GET /gateway/bot` during connect to reject bad tokens early
    #[serde(default)]
    pub validate_token_on_connect: bool,
    /// Give up on a socket upgrade that has not finished after this long
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            version: default_gateway_version(),
            intents: default_intents(),
            validate_token_on_connect: false,
            handshake_timeout_secs: default_handshake_timeout(),
        }
    }
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

fn default_log_level() -> u32 {
    LogLevel::all().bits()
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!(
        "DiscordBot ({}, {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

fn default_gateway_version() -> u8 {
    10
}

fn default_intents() -> u64 {
    DEFAULT_INTENTS
}

fn default_handshake_timeout() -> u64 {
    10
}

/// Configuration errors. Fatal at startup, never raised once a context exists.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Bot token is missing or empty")]
    MissingToken,
    #[error("Invalid log level mask {0}: only bits 0-4 may be set")]
    InvalidLogLevel(u32),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BotConfig {
    /// Load and validate a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: BotConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.log_level()?;
        self.settings().validate()
    }

    pub fn log_level(&self) -> Result<LogLevel, ConfigError> {
        LogLevel::from_mask(self.bot.log_level)
            .ok_or(ConfigError::InvalidLogLevel(self.bot.log_level))
    }

    /// Resolve the token from the configured environment variable
    pub fn token(&self) -> Result<String, ConfigError> {
        let token = std::env::var(&self.bot.token_env)
            .map_err(|_| ConfigError::EnvVarNotFound(self.bot.token_env.clone()))?;
        validate_token(&token)?;
        Ok(token)
    }

    pub fn settings(&self) -> ClientSettings {
        ClientSettings {
            api_base_url: self.api.base_url.clone(),
            request_timeout: Duration::from_secs(self.api.request_timeout_secs),
            user_agent: self.api.user_agent.clone(),
            gateway_version: self.gateway.version,
            intents: self.gateway.intents,
            validate_token_on_connect: self.gateway.validate_token_on_connect,
            handshake_timeout: Duration::from_secs(self.gateway.handshake_timeout_secs),
        }
    }
}

/// Runtime settings a context is created with
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub user_agent: String,
    pub gateway_version: u8,
    pub intents: u64,
    pub validate_token_on_connect: bool,
    /// Upper bound on a socket upgrade, measured from `connect`
    pub handshake_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        BotConfig::default().settings()
    }
}

impl ClientSettings {
    /// Settings pointing the REST client at `base_url`, everything else default
    pub fn with_api_base_url(base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.api_base_url).map_err(|e| {
            ConfigError::InvalidConfig(format!("api base url {}: {e}", self.api_base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidConfig(format!(
                "api base url must be http(s), got {}",
                url.scheme()
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "request timeout must be greater than 0".to_string(),
            ));
        }
        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "handshake timeout must be greater than 0".to_string(),
            ));
        }
        if self.gateway_version == 0 {
            return Err(ConfigError::InvalidConfig(
                "gateway version must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Tokens are opaque, but an empty one or one with embedded whitespace is never valid
pub fn validate_token(token: &str) -> Result<(), ConfigError> {
    if token.trim().is_empty() {
        return Err(ConfigError::MissingToken);
    }
    if token.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidConfig(
            "bot token must not contain whitespace".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: BotConfig = toml::from_str("").unwrap();
        assert_eq!(config, BotConfig::default());
        assert_eq!(config.bot.log_level, 31);
        assert_eq!(config.gateway.version, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_settings_from_config() {
        let config: BotConfig = toml::from_str(
            r#"
[api]
base_url = "http://localhost:9999/api"
request_timeout_secs = 5

[gateway]
intents = 513
validate_token_on_connect = true
"#,
        )
        .unwrap();

        let settings = config.settings();
        assert_eq!(settings.api_base_url, "http://localhost:9999/api");
        assert_eq!(settings.request_timeout, Duration::from_secs(5));
        assert_eq!(settings.intents, 513);
        assert!(settings.validate_token_on_connect);
        assert_eq!(settings.gateway_version, 10);
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = BotConfig::default();
        config.bot.log_level = 64;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel(64))
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        let settings = ClientSettings::with_api_base_url("not a url");
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));

        let settings = ClientSettings::with_api_base_url("ftp://example.com");
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let settings = ClientSettings {
            request_timeout: Duration::ZERO,
            ..ClientSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = ClientSettings {
            handshake_timeout: Duration::ZERO,
            ..ClientSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_handshake_timeout_from_gateway_section() {
        let config: BotConfig = toml::from_str("[gateway]\nhandshake_timeout_secs = 3\n").unwrap();
        assert_eq!(config.settings().handshake_timeout, Duration::from_secs(3));
        assert_eq!(
            ClientSettings::default().handshake_timeout,
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_validate_token() {
        assert!(validate_token("abc").is_ok());
        assert!(matches!(validate_token(""), Err(ConfigError::MissingToken)));
        assert!(matches!(
            validate_token("   "),
            Err(ConfigError::MissingToken)
        ));
        assert!(matches!(
            validate_token("ab c"),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_token_from_missing_env_var() {
        let mut config = BotConfig::default();
        config.bot.token_env = "LIBDISCORD_TEST_TOKEN_THAT_DOES_NOT_EXIST".to_string();
        assert!(matches!(
            config.token(),
            Err(ConfigError::EnvVarNotFound(_))
        ));
    }

    #[test]
    fn test_default_user_agent_names_the_library() {
        let settings = ClientSettings::default();
        assert!(settings.user_agent.starts_with("DiscordBot (libdiscord"));
    }
}
