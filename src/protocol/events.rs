//! Dispatch events and the reasons handed to the host callback

use serde::{Deserialize, Serialize};
use std::fmt;

/// Schema-agnostic event body: null, bool, number, string, array or object
pub type Payload = serde_json::Value;

/// Why the host callback is being invoked
///
/// Dispatch names this client does not recognise arrive as [`CallbackReason::Unhandled`]
/// with the raw name still available on the [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallbackReason {
    /// Raised by the host itself through `Context::emit_user_event`
    UserDefined,
    Ready,
    Resumed,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    GuildCreate,
    ChannelCreate,
    TypingStart,
    PresenceUpdate,
    Unhandled,
}

impl CallbackReason {
    /// Map a dispatch `t` value to a reason
    pub fn from_event_name(name: &str) -> Self {
        match name {
            "READY" => Self::Ready,
            "RESUMED" => Self::Resumed,
            "MESSAGE_CREATE" => Self::MessageCreate,
            "MESSAGE_UPDATE" => Self::MessageUpdate,
            "MESSAGE_DELETE" => Self::MessageDelete,
            "GUILD_CREATE" => Self::GuildCreate,
            "CHANNEL_CREATE" => Self::ChannelCreate,
            "TYPING_START" => Self::TypingStart,
            "PRESENCE_UPDATE" => Self::PresenceUpdate,
            _ => Self::Unhandled,
        }
    }

    /// The gateway name for reasons that come off the wire
    pub const fn event_name(self) -> Option<&'static str> {
        match self {
            Self::Ready => Some("READY"),
            Self::Resumed => Some("RESUMED"),
            Self::MessageCreate => Some("MESSAGE_CREATE"),
            Self::MessageUpdate => Some("MESSAGE_UPDATE"),
            Self::MessageDelete => Some("MESSAGE_DELETE"),
            Self::GuildCreate => Some("GUILD_CREATE"),
            Self::ChannelCreate => Some("CHANNEL_CREATE"),
            Self::TypingStart => Some("TYPING_START"),
            Self::PresenceUpdate => Some("PRESENCE_UPDATE"),
            Self::UserDefined | Self::Unhandled => None,
        }
    }
}

impl fmt::Display for CallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One decoded dispatch, consumed once by the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub reason: CallbackReason,
    /// The raw discriminator, e.g. `MESSAGE_CREATE`
    pub name: String,
    pub sequence: Option<u64>,
    pub payload: Payload,
}

impl Event {
    pub fn from_dispatch(name: impl Into<String>, sequence: Option<u64>, payload: Payload) -> Self {
        let name = name.into();
        Self {
            reason: CallbackReason::from_event_name(&name),
            name,
            sequence,
            payload,
        }
    }
}
