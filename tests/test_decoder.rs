//! Decoder behavior on well-formed, unknown and hostile input

use libdiscord::protocol::{decode, ControlFrame, DecodeError, GatewayEvent, OpCode};
use libdiscord::CallbackReason;
use proptest::prelude::*;
use serde_json::json;

fn frame(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

proptest! {
    #[test]
    fn unknown_event_names_are_unhandled(name in "[a-z_]{1,32}", seq in any::<u64>()) {
        // gateway event names are upper case, so none of these collide with a known one
        let bytes = frame(json!({"op": 0, "s": seq, "t": name, "d": {"x": 1}}));

        match decode(&bytes).unwrap() {
            GatewayEvent::Dispatch(event) => {
                prop_assert_eq!(event.reason, CallbackReason::Unhandled);
                prop_assert_eq!(event.name, name);
                prop_assert_eq!(event.sequence, Some(seq));
                prop_assert_eq!(event.payload, json!({"x": 1}));
            }
            other => prop_assert!(false, "expected dispatch, got {:?}", other),
        }
    }

    #[test]
    fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = decode(&bytes);
    }

    #[test]
    fn unassigned_op_codes_decode_as_unknown(op in 12u64..=u32::MAX as u64) {
        let bytes = frame(json!({"op": op, "d": null}));
        prop_assert_eq!(
            decode(&bytes).unwrap(),
            GatewayEvent::Control(ControlFrame::Unknown { op })
        );
    }

    #[test]
    fn hello_interval_is_preserved(interval in 1u64..=u32::MAX as u64) {
        let bytes = frame(json!({"op": 10, "d": {"heartbeat_interval": interval}}));
        prop_assert_eq!(
            decode(&bytes).unwrap(),
            GatewayEvent::Control(ControlFrame::Hello { heartbeat_interval: interval })
        );
    }
}

#[test]
fn test_known_events_map_to_reasons() {
    let cases = [
        ("READY", CallbackReason::Ready),
        ("RESUMED", CallbackReason::Resumed),
        ("MESSAGE_CREATE", CallbackReason::MessageCreate),
        ("MESSAGE_UPDATE", CallbackReason::MessageUpdate),
        ("MESSAGE_DELETE", CallbackReason::MessageDelete),
        ("GUILD_CREATE", CallbackReason::GuildCreate),
        ("CHANNEL_CREATE", CallbackReason::ChannelCreate),
        ("TYPING_START", CallbackReason::TypingStart),
        ("PRESENCE_UPDATE", CallbackReason::PresenceUpdate),
    ];

    for (name, reason) in cases {
        let bytes = frame(json!({"op": 0, "s": 1, "t": name, "d": {}}));
        match decode(&bytes).unwrap() {
            GatewayEvent::Dispatch(event) => assert_eq!(event.reason, reason, "{name}"),
            other => panic!("{name}: expected dispatch, got {other:?}"),
        }
    }
}

#[test]
fn test_dispatch_without_body_has_null_payload() {
    let bytes = frame(json!({"op": 0, "s": 2, "t": "TYPING_START"}));
    match decode(&bytes).unwrap() {
        GatewayEvent::Dispatch(event) => assert!(event.payload.is_null()),
        other => panic!("expected dispatch, got {other:?}"),
    }
}

#[test]
fn test_control_frames() {
    assert_eq!(
        decode(br#"{"op":11}"#).unwrap(),
        GatewayEvent::Control(ControlFrame::HeartbeatAck)
    );
    assert_eq!(
        decode(br#"{"op":1,"d":null}"#).unwrap(),
        GatewayEvent::Control(ControlFrame::Heartbeat)
    );
    assert_eq!(
        decode(br#"{"op":7,"d":null}"#).unwrap(),
        GatewayEvent::Control(ControlFrame::Reconnect)
    );
    assert_eq!(
        decode(br#"{"op":9,"d":true}"#).unwrap(),
        GatewayEvent::Control(ControlFrame::InvalidSession { resumable: true })
    );
}

#[test]
fn test_malformed_frames_are_errors() {
    assert!(matches!(decode(b"not json"), Err(DecodeError::Malformed(_))));
    assert!(matches!(decode(b"{\"d\":{}}"), Err(DecodeError::Malformed(_))));
    assert!(matches!(
        decode(br#"{"op":0,"d":{}}"#),
        Err(DecodeError::MissingDiscriminator)
    ));
    assert!(matches!(
        decode(br#"{"op":10,"d":{"interval":5}}"#),
        Err(DecodeError::InvalidPayload {
            op: OpCode::Hello,
            ..
        })
    ));
}
