//! libdiscord - a small Discord bot client
//!
//! Connects a bot to the Discord gateway, keeps the connection alive and hands every
//! gateway event to one host-supplied callback.
//!
//! # Overview
//!
//! - [`rest`]: gateway discovery, token validation and posting messages over HTTPS
//! - [`transport`]: the WebSocket the gateway speaks over
//! - [`protocol`]: gateway payloads, op codes and the event decoder
//! - [`gateway`]: connection state, heartbeat schedule and session bookkeeping
//! - [`dispatch`]: the callback bridge and its crash containment
//! - [`context`]: the per-bot context and its cooperative `service` loop
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use libdiscord::{CallbackReason, Context, ContextInfo, EventContext, EventHandler};
//! use libdiscord::{GatewayState, HandlerResult, LogLevel, Payload};
//! use std::time::Duration;
//!
//! struct Ayy;
//!
//! #[async_trait::async_trait]
//! impl EventHandler for Ayy {
//!     async fn on_event(
//!         &mut self,
//!         ctx: &EventContext<'_>,
//!         reason: CallbackReason,
//!         payload: Option<&Payload>,
//!     ) -> HandlerResult {
//!         if reason != CallbackReason::MessageCreate {
//!             return Ok(());
//!         }
//!         let message = payload.and_then(|p| p.as_object());
//!         let content = message.and_then(|m| m.get("content")).and_then(|c| c.as_str());
//!         let channel = message.and_then(|m| m.get("channel_id")).and_then(|c| c.as_str());
//!         if let (Some("ayy"), Some(channel)) = (content, channel) {
//!             ctx.post_message(channel, "lmao").await?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let info = ContextInfo::new("my-bot-token", Ayy).with_log_level(LogLevel::ERROR);
//! let mut ctx = Context::new(info)?;
//! ctx.connect().await?;
//! while ctx.gateway_connection_state() != GatewayState::Disconnected {
//!     ctx.service(Duration::from_millis(20)).await;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod observability;
pub mod protocol;
pub mod rest;
pub mod testing;
pub mod transport;

pub use config::{BotConfig, ClientSettings, ConfigError};
pub use context::{Context, ContextInfo};
pub use dispatch::{
    DispatchOutcome, Dispatcher, EventContext, EventHandler, HandlerError, HandlerResult,
};
pub use error::{ClientError, ClientResult, ErrorCode};
pub use gateway::{ConnectionStats, GatewayState};
pub use observability::{LogLevel, Logger, Severity};
pub use protocol::{CallbackReason, Event, Payload};
pub use rest::{RestClient, RestError};
pub use transport::{HandshakeStatus, Transport, TransportError, WebSocketTransport};
