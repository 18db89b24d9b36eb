//! Gateway connection state and its transition table
//!
//! Pure functions only; the context owns the current value and applies the result.

use crate::observability::Logger;
use std::fmt;

/// Connection state of one context. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GatewayState {
    /// Created, `connect` never succeeded
    #[default]
    Unconnected,
    /// Gateway URL discovered, handshake in progress across `service` calls
    Connecting,
    /// READY received; frames are being dispatched
    Connected,
    /// Connection lost. Only an explicit `connect` leaves this state.
    Disconnected,
}

/// Inputs that move the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    /// `connect` discovered the gateway
    ConnectSucceeded,
    /// READY arrived
    HandshakeCompleted,
    /// Socket failure, close, missed heartbeat ack, or the server asked us to go away
    ConnectionLost,
}

impl GatewayState {
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayState::Unconnected => "unconnected",
            GatewayState::Connecting => "connecting",
            GatewayState::Connected => "connected",
            GatewayState::Disconnected => "disconnected",
        }
    }

    /// Whether `connect` may start a new attempt from here
    pub fn can_connect(self) -> bool {
        matches!(self, GatewayState::Unconnected | GatewayState::Disconnected)
    }

    /// Whether `service` has socket work to do
    pub fn is_active(self) -> bool {
        matches!(self, GatewayState::Connecting | GatewayState::Connected)
    }

    /// Apply `event`. Events that make no sense in the current state leave it unchanged.
    pub fn next(self, event: StateEvent) -> GatewayState {
        match (self, event) {
            (GatewayState::Unconnected | GatewayState::Disconnected, StateEvent::ConnectSucceeded) => {
                GatewayState::Connecting
            }
            (GatewayState::Connecting, StateEvent::HandshakeCompleted) => GatewayState::Connected,
            (GatewayState::Connecting | GatewayState::Connected, StateEvent::ConnectionLost) => {
                GatewayState::Disconnected
            }
            (current, _) => current,
        }
    }
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log a transition through the owning context's logger
pub fn log_state_transition(logger: &Logger, from: GatewayState, to: GatewayState) {
    match (from, to) {
        (GatewayState::Unconnected | GatewayState::Disconnected, GatewayState::Connecting) => {
            logger.info("connecting to gateway");
        }
        (GatewayState::Connecting, GatewayState::Connected) => {
            logger.notice("gateway connection established");
        }
        (_, GatewayState::Disconnected) => {
            logger.warn(format!("gateway state: {from} -> {to}"));
        }
        _ => {
            logger.debug(format!("gateway state: {from} -> {to}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [GatewayState; 4] = [
        GatewayState::Unconnected,
        GatewayState::Connecting,
        GatewayState::Connected,
        GatewayState::Disconnected,
    ];

    #[test]
    fn test_initial_state() {
        assert_eq!(GatewayState::default(), GatewayState::Unconnected);
    }

    #[test]
    fn test_connect_only_reaches_connecting() {
        assert_eq!(
            GatewayState::Unconnected.next(StateEvent::ConnectSucceeded),
            GatewayState::Connecting
        );
        assert_eq!(
            GatewayState::Disconnected.next(StateEvent::ConnectSucceeded),
            GatewayState::Connecting
        );
        assert_eq!(
            GatewayState::Connected.next(StateEvent::ConnectSucceeded),
            GatewayState::Connected
        );
    }

    #[test]
    fn test_connected_requires_handshake_from_connecting() {
        assert_eq!(
            GatewayState::Connecting.next(StateEvent::HandshakeCompleted),
            GatewayState::Connected
        );
        for state in [GatewayState::Unconnected, GatewayState::Disconnected] {
            assert_eq!(state.next(StateEvent::HandshakeCompleted), state);
        }
    }

    #[test]
    fn test_loss_only_affects_active_states() {
        assert_eq!(
            GatewayState::Connected.next(StateEvent::ConnectionLost),
            GatewayState::Disconnected
        );
        assert_eq!(
            GatewayState::Connecting.next(StateEvent::ConnectionLost),
            GatewayState::Disconnected
        );
        assert_eq!(
            GatewayState::Unconnected.next(StateEvent::ConnectionLost),
            GatewayState::Unconnected
        );
    }

    #[test]
    fn test_no_transition_skips_connecting() {
        for state in ALL {
            for event in [
                StateEvent::ConnectSucceeded,
                StateEvent::HandshakeCompleted,
                StateEvent::ConnectionLost,
            ] {
                let next = state.next(event);
                if state == GatewayState::Unconnected {
                    assert_ne!(next, GatewayState::Connected);
                }
            }
        }
    }

    #[test]
    fn test_state_predicates() {
        assert!(GatewayState::Unconnected.can_connect());
        assert!(GatewayState::Disconnected.can_connect());
        assert!(!GatewayState::Connecting.can_connect());
        assert!(!GatewayState::Connected.can_connect());

        assert!(GatewayState::Connecting.is_active());
        assert!(GatewayState::Connected.is_active());
        assert!(!GatewayState::Disconnected.is_active());
    }

    #[test]
    fn test_display() {
        assert_eq!(GatewayState::Connected.to_string(), "connected");
    }
}
