//! Per-bot context and the gateway service loop
//!
//! A [`Context`] is created once per bot from a [`ContextInfo`], then driven by the host:
//!
//! ```rust,no_run
//! use libdiscord::{CallbackReason, Context, ContextInfo, EventContext, EventHandler};
//! use libdiscord::{GatewayState, HandlerResult, Payload};
//! use std::time::Duration;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl EventHandler for Echo {
//!     async fn on_event(
//!         &mut self,
//!         _ctx: &EventContext<'_>,
//!         _reason: CallbackReason,
//!         _payload: Option<&Payload>,
//!     ) -> HandlerResult {
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let mut ctx = Context::new(ContextInfo::new("token", Echo))?;
//! ctx.connect().await?;
//! while ctx.gateway_connection_state() != GatewayState::Disconnected {
//!     ctx.service(Duration::from_millis(20)).await;
//! }
//! ctx.destroy().await;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```
//!
//! Only `&mut self` methods change the gateway state, so the context is the single writer.
//! Other tasks can watch the state through [`Context::subscribe_state`].

use crate::config::{validate_token, ClientSettings, ConfigError};
use crate::dispatch::{DispatchOutcome, Dispatcher, EventContext, EventHandler};
use crate::error::{sanitize_error_message, ClientError};
use crate::gateway::{
    gateway_url, log_state_transition, ConnectionStats, GatewaySession, GatewayState,
    HeartbeatAction, HeartbeatSchedule, StateEvent,
};
use crate::observability::{LogLevel, Logger};
use crate::protocol::{
    decode, CallbackReason, ControlFrame, Event, GatewayEvent, GatewayPayload, IdentifyPayload,
    Payload, ReadyPayload,
};
use crate::transport::{HandshakeStatus, Transport, TransportError, WebSocketTransport};
use bytes::Bytes;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Configuration consumed by [`Context::new`]
pub struct ContextInfo {
    pub token: String,
    pub log_level: LogLevel,
    pub handler: Box<dyn EventHandler>,
    pub settings: ClientSettings,
}

impl ContextInfo {
    /// Full log verbosity and production endpoints
    pub fn new(token: impl Into<String>, handler: impl EventHandler + 'static) -> Self {
        Self {
            token: token.into(),
            log_level: LogLevel::all(),
            handler: Box::new(handler),
            settings: ClientSettings::default(),
        }
    }

    pub fn with_log_level(mut self, log_level: LogLevel) -> Self {
        self.log_level = log_level;
        self
    }

    pub fn with_settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }
}

impl fmt::Debug for ContextInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextInfo")
            .field("token", &"***")
            .field("log_level", &self.log_level)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// One bot instance: configuration, connection state, handler, transport and REST client
pub struct Context<T: Transport = WebSocketTransport> {
    token: String,
    logger: Logger,
    settings: ClientSettings,
    state: watch::Sender<GatewayState>,
    handler: Box<dyn EventHandler>,
    transport: T,
    rest: crate::rest::RestClient,
    session: Option<GatewaySession>,
    user_events: VecDeque<Option<Payload>>,
    stats: ConnectionStats,
}

impl Context<WebSocketTransport> {
    /// Create a context that talks to the gateway over a real WebSocket
    pub fn new(info: ContextInfo) -> Result<Self, ConfigError> {
        Self::with_transport(info, WebSocketTransport::new())
    }
}

impl<T: Transport> Context<T> {
    /// Create a context over any [`Transport`]
    pub fn with_transport(info: ContextInfo, transport: T) -> Result<Self, ConfigError> {
        let logger = Logger::new(info.log_level);

        if let Err(e) = validate_token(&info.token).and_then(|()| info.settings.validate()) {
            logger.error(format!("couldn't create context: {e}"));
            return Err(e);
        }

        let rest = crate::rest::RestClient::new(&info.token, &info.settings)
            .map_err(|e| {
                let e = ConfigError::InvalidConfig(sanitize_error_message(&e.to_string()));
                logger.error(format!("couldn't create context: {e}"));
                e
            })?
            .with_logger(logger.clone());

        let (state, _) = watch::channel(GatewayState::Unconnected);
        logger.debug("context created");

        Ok(Self {
            token: info.token,
            logger,
            settings: info.settings,
            state,
            handler: info.handler,
            transport,
            rest,
            session: None,
            user_events: VecDeque::new(),
            stats: ConnectionStats::default(),
        })
    }

    /// Current state. Stable until the next `connect` or `service` call.
    pub fn gateway_connection_state(&self) -> GatewayState {
        *self.state.borrow()
    }

    /// Observe state changes from another task
    pub fn subscribe_state(&self) -> watch::Receiver<GatewayState> {
        self.state.subscribe()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn rest(&self) -> &crate::rest::RestClient {
        &self.rest
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().and_then(GatewaySession::session_id)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Queue a `UserDefined` event, dispatched at the start of the next `service` call
    pub fn emit_user_event(&mut self, payload: Option<Payload>) {
        self.user_events.push_back(payload);
    }

    fn set_state(&mut self, event: StateEvent) {
        let from = self.gateway_connection_state();
        let to = from.next(event);
        if from != to {
            self.state.send_replace(to);
            log_state_transition(&self.logger, from, to);
        }
    }

    fn fail<E: Into<ClientError>>(&self, error: E) -> ClientError {
        let error = error.into();
        self.logger.error(error.sanitized());
        error
    }

    /// Discover the gateway and move to `Connecting`
    ///
    /// The socket itself is opened by the next `service` call. On error the state is left
    /// untouched; retrying is up to the host.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        let state = self.gateway_connection_state();
        if !state.can_connect() {
            return Err(self.fail(ClientError::AlreadyConnected { state }));
        }

        // the REST client logs its own failures
        let raw_url = self.rest.get_gateway_url().await?;

        if self.settings.validate_token_on_connect {
            let info = self.rest.validate_token().await?;
            self.logger.debug(format!(
                "token accepted, recommended shards: {}",
                info.shards
            ));
        }

        let url = gateway_url(&raw_url, self.settings.gateway_version).map_err(|e| {
            self.fail(ClientError::protocol(format!(
                "gateway url {raw_url:?} is not a valid url: {e}"
            )))
        })?;

        self.transport.close().await;
        self.logger.info(format!("gateway url: {url}"));
        self.session = Some(GatewaySession::new(url));
        self.set_state(StateEvent::ConnectSucceeded);
        Ok(())
    }

    /// Do one bounded unit of gateway work
    ///
    /// Dispatches queued user events, then, depending on the state, advances the socket
    /// handshake, keeps the heartbeat going, and dispatches whatever frames arrive within
    /// `timeout`. A handshake that needs longer than `timeout` carries over to the next
    /// call, up to `handshake_timeout` from `connect`.
    pub async fn service(&mut self, timeout: Duration) {
        let started = Instant::now();

        self.dispatch_user_events().await;

        if !self.gateway_connection_state().is_active() {
            return;
        }

        if !self.transport.is_open() {
            if self.gateway_connection_state() == GatewayState::Connected {
                self.abort_connection(TransportError::ConnectionLost.into())
                    .await;
                return;
            }
            let budget = timeout.saturating_sub(started.elapsed());
            if !self.open_transport(budget).await {
                return;
            }
        }

        if let Err(e) = self.maintain_heartbeat().await {
            self.abort_connection(e).await;
            return;
        }

        let budget = timeout.saturating_sub(started.elapsed());
        let poll_timeout = match &self.session {
            Some(session) => session.poll_budget(budget, Instant::now()),
            None => budget,
        };

        let outcome = self.transport.poll(poll_timeout).await;
        for frame in &outcome.frames {
            if !self.gateway_connection_state().is_active() {
                self.logger
                    .debug("dropping frames received after the connection ended");
                break;
            }
            self.handle_frame(frame).await;
        }

        if outcome.connection_lost && self.gateway_connection_state().is_active() {
            self.abort_connection(TransportError::ConnectionLost.into())
                .await;
        }
    }

    /// Close the socket and release the context
    pub async fn destroy(mut self) {
        self.transport.close().await;
        self.logger.info("context destroyed");
    }

    /// Start or resume the handshake for at most `budget`. True once the socket is open.
    async fn open_transport(&mut self, budget: Duration) -> bool {
        let Some((url, age)) = self
            .session
            .as_ref()
            .map(|s| (s.url().clone(), s.age(Instant::now())))
        else {
            self.lose_connection("no gateway session".to_string()).await;
            return false;
        };

        let limit = self.settings.handshake_timeout;
        let wait = budget.min(limit.saturating_sub(age));

        match self.transport.open(&url, wait).await {
            Ok(HandshakeStatus::Open) => {
                self.logger.debug(format!("socket open to {url}"));
                true
            }
            Ok(HandshakeStatus::Pending) => {
                let age = self
                    .session
                    .as_ref()
                    .map_or(limit, |s| s.age(Instant::now()));
                if age >= limit {
                    let error = TransportError::HandshakeTimeout {
                        url: url.to_string(),
                        timeout: limit,
                    };
                    self.abort_connection(error.into()).await;
                } else {
                    self.logger
                        .debug(format!("handshake with {url} still in progress"));
                }
                false
            }
            Err(e) => {
                self.abort_connection(e.into()).await;
                false
            }
        }
    }

    async fn maintain_heartbeat(&mut self) -> Result<(), ClientError> {
        let now = Instant::now();
        let Some(session) = self.session.as_ref() else {
            return Ok(());
        };
        let Some(schedule) = session.heartbeat() else {
            return Ok(());
        };

        match schedule.check(now) {
            HeartbeatAction::NotDue => Ok(()),
            HeartbeatAction::Zombied => Err(ClientError::network(format!(
                "heartbeat not acknowledged within {:?}",
                schedule.interval()
            ))),
            HeartbeatAction::Due => {
                self.send_heartbeat().await?;
                if let Some(schedule) = self.session.as_mut().and_then(GatewaySession::heartbeat_mut)
                {
                    schedule.record_sent(now);
                }
                Ok(())
            }
        }
    }

    async fn send_heartbeat(&mut self) -> Result<(), ClientError> {
        let sequence = self.session.as_ref().and_then(GatewaySession::last_sequence);
        self.send_payload(&GatewayPayload::heartbeat(sequence))
            .await?;
        self.stats.heartbeats_sent += 1;
        self.logger.debug(format!("heartbeat sent (seq {sequence:?})"));
        Ok(())
    }

    async fn send_payload(&mut self, payload: &GatewayPayload) -> Result<(), ClientError> {
        let frame = payload
            .to_frame()
            .map_err(|e| ClientError::protocol(format!("couldn't encode payload: {e}")))?;
        self.transport.send(Bytes::from(frame)).await?;
        Ok(())
    }

    /// The server ended the session; not an error on our side
    async fn lose_connection(&mut self, reason: String) {
        self.logger
            .warn(format!("gateway connection lost: {reason}"));
        self.teardown().await;
    }

    /// The connection failed underneath us
    async fn abort_connection(&mut self, error: ClientError) {
        self.logger
            .error(format!("gateway connection lost: {}", error.sanitized()));
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        self.transport.close().await;
        self.session = None;
        self.stats.connected_since = None;
        self.stats.disconnects += 1;
        self.set_state(StateEvent::ConnectionLost);
    }

    async fn handle_frame(&mut self, frame: &[u8]) {
        self.stats.frames_received += 1;

        match decode(frame) {
            Ok(GatewayEvent::Control(control)) => self.handle_control(control).await,
            Ok(GatewayEvent::Dispatch(event)) => self.handle_dispatch(event).await,
            Err(e) => {
                self.stats.malformed_frames += 1;
                self.logger.error(format!(
                    "dropping malformed frame: {}",
                    sanitize_error_message(&e.to_string())
                ));
            }
        }
    }

    async fn handle_control(&mut self, control: ControlFrame) {
        match control {
            ControlFrame::Hello { heartbeat_interval } => {
                self.handle_hello(heartbeat_interval).await;
            }
            ControlFrame::Heartbeat => {
                if let Err(e) = self.send_heartbeat().await {
                    self.abort_connection(e).await;
                } else if let Some(schedule) =
                    self.session.as_mut().and_then(GatewaySession::heartbeat_mut)
                {
                    schedule.record_requested(Instant::now());
                }
            }
            ControlFrame::HeartbeatAck => {
                self.stats.heartbeat_acks += 1;
                if let Some(schedule) =
                    self.session.as_mut().and_then(GatewaySession::heartbeat_mut)
                {
                    if let Some(latency) = schedule.record_ack(Instant::now()) {
                        self.stats.last_heartbeat_latency = Some(latency);
                        self.logger
                            .debug(format!("heartbeat acknowledged in {latency:?}"));
                    }
                }
            }
            ControlFrame::Reconnect => {
                self.logger.notice("gateway requested a reconnect");
                self.lose_connection("server requested reconnect".to_string())
                    .await;
            }
            ControlFrame::InvalidSession { resumable } => {
                self.lose_connection(format!("session invalidated (resumable: {resumable})"))
                    .await;
            }
            ControlFrame::Unknown { op } => {
                self.logger.debug(format!("ignoring gateway op {op}"));
            }
        }
    }

    async fn handle_hello(&mut self, heartbeat_interval: u64) {
        if heartbeat_interval == 0 {
            self.logger
                .error("dropping hello with a zero heartbeat interval");
            return;
        }

        let interval = Duration::from_millis(heartbeat_interval);
        let already_identified = match self.session.as_mut() {
            Some(session) => {
                session.start_heartbeat(HeartbeatSchedule::with_random_jitter(
                    interval,
                    Instant::now(),
                ));
                session.identified()
            }
            None => return,
        };
        self.logger
            .debug(format!("hello received, heartbeat interval {interval:?}"));

        if already_identified {
            return;
        }

        let identify = IdentifyPayload::new(self.token.clone(), self.settings.intents);
        let sent = match GatewayPayload::identify(&identify) {
            Ok(payload) => self.send_payload(&payload).await,
            Err(e) => Err(ClientError::protocol(format!("couldn't encode identify: {e}"))),
        };

        match sent {
            Ok(()) => {
                if let Some(session) = self.session.as_mut() {
                    session.mark_identified();
                }
                self.logger.debug("identify sent");
            }
            Err(e) => self.abort_connection(e).await,
        }
    }

    async fn handle_dispatch(&mut self, event: Event) {
        if let Some(session) = self.session.as_mut() {
            session.observe_sequence(event.sequence);
        }

        if event.reason == CallbackReason::Ready {
            match serde_json::from_value::<ReadyPayload>(event.payload.clone()) {
                Ok(ready) => {
                    if let Some(session) = self.session.as_mut() {
                        session.set_session_id(ready.session_id);
                    }
                }
                Err(e) => {
                    self.logger.error(format!("READY without a session id: {e}"));
                }
            }
            if self.gateway_connection_state() == GatewayState::Connecting {
                self.stats.connected_since = Some(Instant::now());
                self.set_state(StateEvent::HandshakeCompleted);
            }
        }

        if event.reason == CallbackReason::Unhandled {
            self.logger
                .debug(format!("dispatching unhandled event {}", event.name));
        }

        self.invoke_handler(event.reason, Some(&event.payload)).await;
    }

    async fn dispatch_user_events(&mut self) {
        while let Some(payload) = self.user_events.pop_front() {
            self.invoke_handler(CallbackReason::UserDefined, payload.as_ref())
                .await;
        }
    }

    async fn invoke_handler(&mut self, reason: CallbackReason, payload: Option<&Payload>) {
        let state = self.gateway_connection_state();
        let session_id = self.session.as_ref().and_then(GatewaySession::session_id);
        let ctx = EventContext::new(state, &self.logger, &self.rest, &self.stats, session_id);

        let outcome = Dispatcher::dispatch(self.handler.as_mut(), &ctx, reason, payload).await;

        self.stats.events_dispatched += 1;
        if outcome != DispatchOutcome::Delivered {
            self.stats.handler_failures += 1;
        }
    }
}

impl<T: Transport> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.gateway_connection_state())
            .field("log_level", &self.logger.mask())
            .field("session", &self.session)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
