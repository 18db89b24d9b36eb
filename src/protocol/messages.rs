//! Gateway payload envelope and the client-sent payloads
//!
//! Every gateway message, in either direction, is a JSON object
//! `{"op": <integer>, "d": <any>, "s": <u64|null>, "t": <string|null>}`.

use super::OpCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw gateway envelope
///
/// `op` is kept as a raw `u64` so that op codes this client does not know about still
/// decode, whatever their width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayPayload {
    pub op: u64,

    #[serde(default)]
    pub d: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayPayload {
    fn outbound(op: OpCode, d: Option<Value>) -> Self {
        Self {
            op: op.as_u8().into(),
            d,
            s: None,
            t: None,
        }
    }

    /// op 1: `d` carries the last sequence number received, or null before any dispatch
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::outbound(OpCode::Heartbeat, Some(last_sequence.map_or(Value::Null, Value::from)))
    }

    /// op 2: start a session
    pub fn identify(identify: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Ok(Self::outbound(
            OpCode::Identify,
            Some(serde_json::to_value(identify)?),
        ))
    }

    pub fn op_code(&self) -> Option<OpCode> {
        u8::try_from(self.op).ok().and_then(OpCode::from_u8)
    }

    /// Serialize into the bytes of one text frame
    pub fn to_frame(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// `d` of op 10
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

/// `d` of op 2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub properties: IdentifyProperties,
    pub intents: u64,
}

/// Connection properties reported in Identify
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: env!("CARGO_PKG_NAME").to_string(),
            device: env!("CARGO_PKG_NAME").to_string(),
        }
    }
}

impl IdentifyPayload {
    pub fn new(token: impl Into<String>, intents: u64) -> Self {
        Self {
            token: token.into(),
            properties: IdentifyProperties::default(),
            intents,
        }
    }
}

/// The fields of the READY dispatch this client keeps
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_heartbeat_before_any_dispatch_sends_null() {
        let frame = GatewayPayload::heartbeat(None).to_frame().unwrap();
        let value: Value = serde_json::from_slice(&frame).unwrap();
        assert_eq!(value, json!({"op": 1, "d": null}));
    }

    #[test]
    fn test_heartbeat_carries_last_sequence() {
        let payload = GatewayPayload::heartbeat(Some(42));
        assert_eq!(payload.d, Some(json!(42)));
        assert_eq!(payload.op_code(), Some(OpCode::Heartbeat));
    }

    #[test]
    fn test_identify_shape() {
        let identify = IdentifyPayload::new("abc", 513);
        let payload = GatewayPayload::identify(&identify).unwrap();
        let value: Value = serde_json::from_slice(&payload.to_frame().unwrap()).unwrap();

        assert_eq!(value["op"], 2);
        assert_eq!(value["d"]["token"], "abc");
        assert_eq!(value["d"]["intents"], 513);
        assert_eq!(value["d"]["properties"]["browser"], "libdiscord");
        assert!(value.get("s").is_none());
        assert!(value.get("t").is_none());
    }

    #[test]
    fn test_envelope_defaults_missing_fields() {
        let payload: GatewayPayload = serde_json::from_str(r#"{"op": 11}"#).unwrap();
        assert_eq!(payload.op_code(), Some(OpCode::HeartbeatAck));
        assert_eq!(payload.d, None);
        assert_eq!(payload.s, None);
        assert_eq!(payload.t, None);
    }

    #[test]
    fn test_op_beyond_u8_has_no_op_code() {
        let payload: GatewayPayload = serde_json::from_str(r#"{"op": 267, "d": null}"#).unwrap();
        assert_eq!(payload.op, 267);
        assert_eq!(payload.op_code(), None);
    }

    #[test]
    fn test_ready_payload_ignores_extra_fields() {
        let ready: ReadyPayload = serde_json::from_value(json!({
            "v": 10,
            "session_id": "sess-1",
            "user": {"id": "1", "username": "bot"},
            "guilds": []
        }))
        .unwrap();
        assert_eq!(ready.session_id, "sess-1");
        assert_eq!(ready.resume_gateway_url, None);
    }
}
