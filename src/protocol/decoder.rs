//! Inbound frame decoding
//!
//! Pure functions only: bytes in, [`GatewayEvent`] out. The decoder looks at no more of the
//! payload than it needs to route the frame; dispatch bodies pass through untouched.

use super::events::Event;
use super::messages::{GatewayPayload, HelloPayload};
use super::OpCode;
use serde_json::Value;
use thiserror::Error;

/// Frames the connection state machine consumes itself
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFrame {
    Hello { heartbeat_interval: u64 },
    /// The server wants a heartbeat right now
    Heartbeat,
    HeartbeatAck,
    Reconnect,
    InvalidSession { resumable: bool },
    /// An op code this client does not know, or one only clients send
    Unknown { op: u64 },
}

/// Result of decoding one inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    Control(ControlFrame),
    Dispatch(Event),
}

/// Malformed data from the peer. The frame is dropped; the connection carries on.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed gateway frame: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("Dispatch frame without an event name")]
    MissingDiscriminator,
    #[error("Invalid {op} payload: {source}")]
    InvalidPayload {
        op: OpCode,
        #[source]
        source: serde_json::Error,
    },
}

/// Decode one frame
pub fn decode(frame: &[u8]) -> Result<GatewayEvent, DecodeError> {
    let payload: GatewayPayload = serde_json::from_slice(frame).map_err(DecodeError::Malformed)?;
    decode_payload(payload)
}

/// Route an already parsed envelope
pub fn decode_payload(payload: GatewayPayload) -> Result<GatewayEvent, DecodeError> {
    let Some(op) = payload.op_code() else {
        return Ok(GatewayEvent::Control(ControlFrame::Unknown { op: payload.op }));
    };

    let control = match op {
        OpCode::Dispatch => {
            let name = payload.t.ok_or(DecodeError::MissingDiscriminator)?;
            let body = payload.d.unwrap_or(Value::Null);
            return Ok(GatewayEvent::Dispatch(Event::from_dispatch(
                name, payload.s, body,
            )));
        }
        OpCode::Hello => {
            let hello: HelloPayload =
                serde_json::from_value(payload.d.unwrap_or(Value::Null))
                    .map_err(|source| DecodeError::InvalidPayload { op, source })?;
            ControlFrame::Hello {
                heartbeat_interval: hello.heartbeat_interval,
            }
        }
        OpCode::Heartbeat => ControlFrame::Heartbeat,
        OpCode::HeartbeatAck => ControlFrame::HeartbeatAck,
        OpCode::Reconnect => ControlFrame::Reconnect,
        OpCode::InvalidSession => ControlFrame::InvalidSession {
            resumable: payload.d.as_ref().and_then(Value::as_bool).unwrap_or(false),
        },
        OpCode::Identify | OpCode::PresenceUpdate | OpCode::Resume => {
            ControlFrame::Unknown { op: payload.op }
        }
    };

    Ok(GatewayEvent::Control(control))
}
