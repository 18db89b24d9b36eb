//! Streaming transport for the gateway connection
//!
//! The [`Transport`] trait hides the socket from the connection state machine so it can be
//! driven by [`WebSocketTransport`] in production and by
//! [`crate::testing::MockTransport`] in tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub mod websocket;

pub use websocket::WebSocketTransport;

/// One complete message read from or written to the socket
pub type Frame = Bytes;

/// What one call to [`Transport::poll`] produced
///
/// Frames that arrived before the connection dropped are still returned, in arrival
/// order, alongside `connection_lost`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollOutcome {
    pub frames: Vec<Frame>,
    pub connection_lost: bool,
}

impl PollOutcome {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn lost() -> Self {
        Self {
            frames: Vec::new(),
            connection_lost: true,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.frames.is_empty() && !self.connection_lost
    }
}

/// Progress of [`Transport::open`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// The socket is upgraded and ready for `poll` and `send`
    Open,
    /// The upgrade is still in flight; the next `open` call with the same URL resumes it
    Pending,
}

/// Socket-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Handshake with {url} failed")]
    Handshake {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Handshake with {url} did not finish within {timeout:?}")]
    HandshakeTimeout { url: String, timeout: Duration },
    #[error("Connection lost")]
    ConnectionLost,
    #[error("Transport is not open")]
    NotOpen,
    #[error("Failed to send frame")]
    Send(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Bidirectional frame transport
#[async_trait]
pub trait Transport: Send {
    /// Start or resume the upgrade handshake, waiting at most `timeout` for it
    ///
    /// Any previously open socket is closed first. A handshake that has not finished
    /// within `timeout` is kept and reported as [`HandshakeStatus::Pending`].
    async fn open(
        &mut self,
        url: &Url,
        timeout: Duration,
    ) -> Result<HandshakeStatus, TransportError>;

    /// Wait up to `timeout` for inbound data and return every frame that is ready
    async fn poll(&mut self, timeout: Duration) -> PollOutcome;

    /// Write a whole frame. Never drops data silently.
    async fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Close the socket if one is open and abandon any pending handshake
    async fn close(&mut self);

    fn is_open(&self) -> bool;
}
