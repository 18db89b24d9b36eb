//! WebSocket transport on `tokio-tungstenite`
//!
//! `wss://` URLs are upgraded over rustls with the webpki root store. Ping/pong control
//! messages are answered by tungstenite itself and never reach the caller.
//!
//! The upgrade handshake is kept as a boxed future between `open` calls, so a slow gateway
//! costs each caller at most the timeout it passed in.

use super::{Frame, HandshakeStatus, PollOutcome, Transport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{FutureExt, SinkExt, StreamExt};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::client::Response;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

type HandshakeFuture =
    Pin<Box<dyn Future<Output = Result<(WsStream, Response), tungstenite::Error>> + Send>>;

/// Upper bound on frames collected by a single poll once the first one has arrived
const MAX_FRAMES_PER_POLL: usize = 64;

/// An upgrade that has been started but not finished
struct PendingHandshake {
    url: Url,
    future: HandshakeFuture,
}

impl PendingHandshake {
    fn start(url: &Url) -> Self {
        Self {
            url: url.clone(),
            future: Box::pin(connect_async(url.to_string())),
        }
    }
}

/// Production gateway transport
#[derive(Default)]
pub struct WebSocketTransport {
    stream: Option<WsStream>,
    handshake: Option<PendingHandshake>,
}

impl WebSocketTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one stream item into the outcome. Returns false once the connection is gone.
    fn absorb(
        item: Option<Result<Message, tungstenite::Error>>,
        outcome: &mut PollOutcome,
    ) -> bool {
        match item {
            Some(Ok(Message::Text(text))) => {
                outcome.frames.push(Bytes::from(text));
                true
            }
            Some(Ok(Message::Binary(data))) => {
                outcome.frames.push(Bytes::from(data));
                true
            }
            Some(Ok(Message::Close(close))) => {
                match close {
                    Some(frame) => warn!(
                        code = u16::from(frame.code),
                        reason = %frame.reason,
                        "Gateway closed the connection"
                    ),
                    None => warn!("Gateway closed the connection"),
                }
                outcome.connection_lost = true;
                false
            }
            Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => true,
            Some(Err(e)) => {
                debug!("WebSocket read failed: {}", e);
                outcome.connection_lost = true;
                false
            }
            None => {
                outcome.connection_lost = true;
                false
            }
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(
        &mut self,
        url: &Url,
        timeout: Duration,
    ) -> Result<HandshakeStatus, TransportError> {
        let mut handshake = match self.handshake.take() {
            Some(pending) if pending.url == *url => pending,
            _ => {
                self.close().await;
                PendingHandshake::start(url)
            }
        };

        match tokio::time::timeout(timeout, handshake.future.as_mut()).await {
            Err(_) => {
                debug!(%url, "WebSocket handshake still in progress");
                self.handshake = Some(handshake);
                Ok(HandshakeStatus::Pending)
            }
            Ok(Err(e)) => Err(TransportError::Handshake {
                url: url.to_string(),
                source: Box::new(e),
            }),
            Ok(Ok((stream, response))) => {
                debug!(status = %response.status(), "WebSocket handshake complete");
                self.stream = Some(stream);
                Ok(HandshakeStatus::Open)
            }
        }
    }

    async fn poll(&mut self, timeout: Duration) -> PollOutcome {
        let Some(stream) = self.stream.as_mut() else {
            return PollOutcome::lost();
        };

        let mut outcome = PollOutcome::idle();

        let first = match tokio::time::timeout(timeout, stream.next()).await {
            Ok(item) => item,
            Err(_) => return outcome,
        };

        let mut alive = Self::absorb(first, &mut outcome);
        while alive && outcome.frames.len() < MAX_FRAMES_PER_POLL {
            match stream.next().now_or_never() {
                Some(item) => alive = Self::absorb(item, &mut outcome),
                None => break,
            }
        }

        if outcome.connection_lost {
            self.stream = None;
        }
        outcome
    }

    async fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;

        let message = match String::from_utf8(frame.to_vec()) {
            Ok(text) => Message::Text(text),
            Err(e) => Message::Binary(e.into_bytes()),
        };

        // `send` flushes, so the frame is either fully written or an error comes back
        if let Err(e) = stream.send(message).await {
            self.stream = None;
            return Err(TransportError::Send(Box::new(e)));
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.handshake = None;
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                debug!("Error while closing WebSocket: {}", e);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}
