//! Testing utilities and mock implementations
//!
//! Lets the connection state machine run without a network: a scripted transport for the
//! gateway side and a recording handler for the host side.

pub mod mocks;

pub use mocks::*;
