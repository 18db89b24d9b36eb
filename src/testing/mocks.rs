//! Mock implementations for testing
//!
//! [`MockTransport`] stands in for the gateway socket and [`RecordingHandler`] for the host
//! callback. Both are cheap to clone; clones share state, so a test keeps one copy for
//! scripting and assertions and hands the other to the context. [`CapturedLogs`] collects
//! what was logged on the test's thread.

use crate::dispatch::{EventContext, EventHandler, HandlerError, HandlerResult};
use crate::gateway::GatewayState;
use crate::protocol::{CallbackReason, GatewayPayload, Payload};
use crate::transport::{Frame, HandshakeStatus, PollOutcome, Transport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use url::Url;

/// Scripted in-memory transport
///
/// `poll` never waits: it hands back every queued frame at once, plus a connection loss
/// if one was scripted with [`MockTransport::drop_connection`].
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inbound: Arc<Mutex<VecDeque<Frame>>>,
    sent: Arc<Mutex<Vec<Frame>>>,
    opened: Arc<Mutex<Vec<Url>>>,
    open: Arc<AtomicBool>,
    lose_connection: Arc<AtomicBool>,
    fail_open: Arc<AtomicBool>,
    stall_open: Arc<AtomicBool>,
    fail_send: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose handshake always fails
    pub fn with_failing_open() -> Self {
        let transport = Self::default();
        transport.fail_open.store(true, Ordering::SeqCst);
        transport
    }

    /// A transport whose handshake never finishes until [`MockTransport::finish_handshake`]
    ///
    /// Each `open` call waits out its whole timeout and reports the handshake as pending.
    pub fn with_stalled_open() -> Self {
        let transport = Self::default();
        transport.stall_open.store(true, Ordering::SeqCst);
        transport
    }

    pub fn finish_handshake(&self) {
        self.stall_open.store(false, Ordering::SeqCst);
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub async fn push_frame(&self, frame: impl Into<Bytes>) {
        self.inbound.lock().await.push_back(frame.into());
    }

    pub async fn push_json(&self, value: Value) {
        self.push_frame(value.to_string()).await;
    }

    /// Report a connection loss on the next poll, after any queued frames
    pub fn drop_connection(&self) {
        self.lose_connection.store(true, Ordering::SeqCst);
    }

    pub async fn sent_frames(&self) -> Vec<Frame> {
        self.sent.lock().await.clone()
    }

    /// Sent frames decoded as gateway payloads; undecodable frames are skipped
    pub async fn sent_payloads(&self) -> Vec<GatewayPayload> {
        self.sent
            .lock()
            .await
            .iter()
            .filter_map(|frame| serde_json::from_slice(frame).ok())
            .collect()
    }

    pub async fn opened_urls(&self) -> Vec<Url> {
        self.opened.lock().await.clone()
    }

    pub async fn clear_sent(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &mut self,
        url: &Url,
        timeout: Duration,
    ) -> Result<HandshakeStatus, TransportError> {
        self.opened.lock().await.push(url.clone());
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(TransportError::Handshake {
                url: url.to_string(),
                source: "mock handshake refused".into(),
            });
        }
        if self.stall_open.load(Ordering::SeqCst) {
            tokio::time::sleep(timeout).await;
            return Ok(HandshakeStatus::Pending);
        }
        self.lose_connection.store(false, Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);
        Ok(HandshakeStatus::Open)
    }

    async fn poll(&mut self, _timeout: Duration) -> PollOutcome {
        if !self.is_open() {
            return PollOutcome::lost();
        }

        let frames: Vec<Frame> = self.inbound.lock().await.drain(..).collect();
        let connection_lost = self.lose_connection.swap(false, Ordering::SeqCst);
        if connection_lost {
            self.open.store(false, Ordering::SeqCst);
        }

        PollOutcome {
            frames,
            connection_lost,
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        if !self.is_open() {
            return Err(TransportError::NotOpen);
        }
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(TransportError::Send("mock send failure".into()));
        }
        self.sent.lock().await.push(frame);
        Ok(())
    }

    async fn close(&mut self) {
        self.open.store(false, Ordering::SeqCst);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// One recorded handler invocation
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub reason: CallbackReason,
    pub payload: Option<Payload>,
    pub state: GatewayState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Behavior {
    #[default]
    Succeed,
    Fail,
    Panic,
}

/// Handler that records every call
#[derive(Debug, Clone, Default)]
pub struct RecordingHandler {
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    behavior: Behavior,
    reply_to_ayy: bool,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records, then returns an error from every call
    pub fn failing() -> Self {
        Self {
            behavior: Behavior::Fail,
            ..Self::default()
        }
    }

    /// Records, then panics on every call
    pub fn panicking() -> Self {
        Self {
            behavior: Behavior::Panic,
            ..Self::default()
        }
    }

    /// Answer `MESSAGE_CREATE` with content "ayy" by posting "lmao" to the same channel
    pub fn replying() -> Self {
        Self {
            reply_to_ayy: true,
            ..Self::default()
        }
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn reasons(&self) -> Vec<CallbackReason> {
        self.calls.lock().await.iter().map(|c| c.reason).collect()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn on_event(
        &mut self,
        ctx: &EventContext<'_>,
        reason: CallbackReason,
        payload: Option<&Payload>,
    ) -> HandlerResult {
        self.calls.lock().await.push(RecordedCall {
            reason,
            payload: payload.cloned(),
            state: ctx.state(),
        });

        match self.behavior {
            Behavior::Succeed => {}
            Behavior::Fail => return Err(HandlerError::Status(-1)),
            Behavior::Panic => panic!("recording handler panicked on {reason}"),
        }

        if self.reply_to_ayy && reason == CallbackReason::MessageCreate {
            let content = payload.and_then(|p| p.get("content")).and_then(Value::as_str);
            let channel = payload
                .and_then(|p| p.get("channel_id"))
                .and_then(Value::as_str);
            if let (Some("ayy"), Some(channel)) = (content, channel) {
                ctx.post_message(channel, "lmao").await?;
            }
        }

        Ok(())
    }
}

/// In-memory `tracing` sink for asserting on log output
#[derive(Debug, Clone, Default)]
pub struct CapturedLogs {
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send this thread's events here, plain text without colors, until the guard drops
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        let buffer = self.buffer.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&buffer).into_owned()
    }

    /// Lines emitted at ERROR level
    pub fn errors(&self) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(" ERROR "))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_transport_lifecycle() {
        let mut transport = MockTransport::new();
        let handle = transport.clone();
        let url = Url::parse("wss://gateway.test/?v=10&encoding=json").unwrap();

        assert!(transport.poll(Duration::ZERO).await.connection_lost);
        assert!(matches!(
            transport.send(Bytes::from_static(b"{}")).await,
            Err(TransportError::NotOpen)
        ));

        let status = transport.open(&url, Duration::ZERO).await.unwrap();
        assert_eq!(status, HandshakeStatus::Open);
        handle.push_json(json!({"op": 11})).await;
        transport.send(Bytes::from_static(b"{\"op\":1,\"d\":null}")).await.unwrap();

        let outcome = transport.poll(Duration::ZERO).await;
        assert_eq!(outcome.frames.len(), 1);
        assert!(!outcome.connection_lost);
        assert_eq!(handle.opened_urls().await, vec![url]);
        assert_eq!(handle.sent_payloads().await[0].op, 1);
    }

    #[tokio::test]
    async fn test_drop_connection_returns_queued_frames_first() {
        let mut transport = MockTransport::new();
        let handle = transport.clone();
        transport
            .open(&Url::parse("wss://gateway.test/").unwrap(), Duration::ZERO)
            .await
            .unwrap();

        handle.push_frame("first").await;
        handle.drop_connection();

        let outcome = transport.poll(Duration::ZERO).await;
        assert_eq!(outcome.frames, vec![Bytes::from_static(b"first")]);
        assert!(outcome.connection_lost);
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_failing_open() {
        let mut transport = MockTransport::with_failing_open();
        let url = Url::parse("wss://gateway.test/").unwrap();
        let result = transport.open(&url, Duration::ZERO).await;
        assert!(matches!(result, Err(TransportError::Handshake { .. })));
        assert!(!transport.is_open());
    }

    #[tokio::test]
    async fn test_stalled_open_stays_pending_until_finished() {
        let mut transport = MockTransport::with_stalled_open();
        let handle = transport.clone();
        let url = Url::parse("wss://gateway.test/").unwrap();

        let status = transport.open(&url, Duration::from_millis(1)).await.unwrap();
        assert_eq!(status, HandshakeStatus::Pending);
        assert!(!transport.is_open());

        handle.finish_handshake();
        let status = transport.open(&url, Duration::from_millis(1)).await.unwrap();
        assert_eq!(status, HandshakeStatus::Open);
        assert!(transport.is_open());
        assert_eq!(handle.opened_urls().await.len(), 2);
    }

    #[test]
    fn test_captured_logs_separate_errors() {
        let logs = CapturedLogs::new();
        let _guard = logs.install();

        tracing::warn!("just a warning");
        tracing::error!("socket went away");

        let errors = logs.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("socket went away"));
        assert!(logs.contents().contains("just a warning"));
    }
}
