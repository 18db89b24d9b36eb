//! Callback bridge between decoded events and the host
//!
//! The host supplies one [`EventHandler`]. Each decoded dispatch event produces exactly one
//! call, in arrival order. Whatever the handler does (return an error, panic) stays inside
//! the handler: the connection state and the service loop are never affected.

use crate::error::sanitize_error_message;
use crate::gateway::{ConnectionStats, GatewayState};
use crate::observability::Logger;
use crate::protocol::{CallbackReason, Payload};
use crate::rest::{RestClient, RestError};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use thiserror::Error;

/// Failure reported by a handler
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler returned status {0}")]
    Status(i32),
    #[error("REST call failed: {0}")]
    Rest(#[from] RestError),
    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self::Failed(message.into())
    }
}

pub type HandlerResult = Result<(), HandlerError>;

/// Read-only view of the context handed to the handler
///
/// Outbound calls go through [`EventContext::rest`]; the REST client owns no state shared
/// with the gateway loop, so calling it here is safe.
pub struct EventContext<'a> {
    state: GatewayState,
    logger: &'a Logger,
    rest: &'a RestClient,
    stats: &'a ConnectionStats,
    session_id: Option<&'a str>,
}

impl<'a> EventContext<'a> {
    pub fn new(
        state: GatewayState,
        logger: &'a Logger,
        rest: &'a RestClient,
        stats: &'a ConnectionStats,
        session_id: Option<&'a str>,
    ) -> Self {
        Self {
            state,
            logger,
            rest,
            stats,
            session_id,
        }
    }

    pub fn state(&self) -> GatewayState {
        self.state
    }

    pub fn logger(&self) -> &Logger {
        self.logger
    }

    pub fn rest(&self) -> &RestClient {
        self.rest
    }

    pub fn stats(&self) -> &ConnectionStats {
        self.stats
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id
    }

    /// Shorthand for `ctx.rest().post_message(..)`
    pub async fn post_message(&self, channel_id: &str, content: &str) -> Result<(), RestError> {
        self.rest.post_message(channel_id, content).await
    }
}

/// Host callback
///
/// `payload` is `None` only for [`CallbackReason::UserDefined`] events raised without one.
#[async_trait]
pub trait EventHandler: Send {
    async fn on_event(
        &mut self,
        ctx: &EventContext<'_>,
        reason: CallbackReason,
        payload: Option<&Payload>,
    ) -> HandlerResult;
}

/// How one handler invocation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    HandlerFailed(String),
    HandlerPanicked(String),
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DispatchOutcome::Delivered)
    }
}

pub struct Dispatcher;

impl Dispatcher {
    /// Invoke `handler` once, containing errors and panics
    pub async fn dispatch(
        handler: &mut dyn EventHandler,
        ctx: &EventContext<'_>,
        reason: CallbackReason,
        payload: Option<&Payload>,
    ) -> DispatchOutcome {
        let result = AssertUnwindSafe(handler.on_event(ctx, reason, payload))
            .catch_unwind()
            .await;

        match result {
            Ok(Ok(())) => DispatchOutcome::Delivered,
            Ok(Err(e)) => {
                let message = sanitize_error_message(&e.to_string());
                ctx.logger()
                    .warn(format!("handler failed for {reason}: {message}"));
                DispatchOutcome::HandlerFailed(message)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                ctx.logger()
                    .error(format!("handler panicked for {reason}: {message}"));
                DispatchOutcome::HandlerPanicked(message)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
