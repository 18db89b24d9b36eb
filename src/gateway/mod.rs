//! Gateway connection state machine building blocks
//!
//! - [`state`] - [`GatewayState`] and its transition table
//! - [`heartbeat`] - jittered keep-alive scheduling and zombie detection
//! - [`session`] - per-connection data (URL, sequence, session id)
//! - [`stats`] - counters
//!
//! The loop that drives them is `Context::service`.

pub mod heartbeat;
pub mod session;
pub mod state;
pub mod stats;

pub use heartbeat::{HeartbeatAction, HeartbeatSchedule};
pub use session::{gateway_url, GatewaySession};
pub use state::{log_state_transition, GatewayState, StateEvent};
pub use stats::ConnectionStats;
