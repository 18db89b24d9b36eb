//! Gateway wire protocol
//!
//! - [`opcodes`] - the `op` values of gateway payloads
//! - [`messages`] - the JSON envelope and the payloads this client sends
//! - [`events`] - dispatch events and the [`CallbackReason`] mapping
//! - [`decoder`] - bytes to [`GatewayEvent`]

pub mod decoder;
pub mod events;
pub mod messages;
pub mod opcodes;

pub use decoder::{decode, decode_payload, ControlFrame, DecodeError, GatewayEvent};
pub use events::{CallbackReason, Event, Payload};
pub use messages::{GatewayPayload, HelloPayload, IdentifyPayload, IdentifyProperties, ReadyPayload};
pub use opcodes::OpCode;
