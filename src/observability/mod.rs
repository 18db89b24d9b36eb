//! Logging for gateway clients
//!
//! The global `tracing` subscriber is installed by the host; each context filters
//! through its own [`Logger`].

pub mod logging;

pub use logging::{init_default_logging, init_logging, LogFormat, LogLevel, Logger, Severity};
