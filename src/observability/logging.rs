//! Structured logging for gateway clients
//!
//! Two layers live here:
//!
//! - [`init_logging`] / [`init_default_logging`] install the process-wide `tracing`
//!   subscriber. Output always goes to stderr so it never mixes with a host's stdout.
//! - [`Logger`] is the per-context filter. Every [`crate::Context`] owns one, configured
//!   from the [`LogLevel`] bitmask the host passed in, so several bots with different
//!   verbosity can share one process.
//!
//! ## Environment Variables
//!
//! - `LOG_LEVEL`: subscriber level (ERROR, WARN, INFO, DEBUG, TRACE) - defaults to DEBUG
//! - `LOG_FORMAT`: output format (json, pretty, compact) - defaults to compact
//! - `RUST_LOG`: overrides the filter entirely (env_logger syntax)
//!
//! ```bash
//! LOG_FORMAT=json ./ayylmao -t $DISCORD_BOT_TOKEN -l 7
//! ```

use bitflags::bitflags;
use std::env;
use std::fmt;
use tracing::Level;
use tracing_subscriber::{fmt as tracing_fmt, prelude::*, EnvFilter};

/// Log output format options
#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    /// JSON format for structured logging (machine-readable)
    Json,
    /// Pretty format with colors and indentation (human-readable)
    Pretty,
    /// Compact format with colors but minimal spacing (terminal-friendly)
    Compact,
}

impl LogFormat {
    /// Parse log format from string, falling back to compact output
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Compact,
        }
    }
}

/// Install the global subscriber. Calling it twice is harmless; the second call is ignored.
pub fn init_logging(level: Level, format: LogFormat) {
    let mut filter = EnvFilter::new(level.to_string())
        // Reduce noise from dependencies
        .add_directive("tungstenite=warn".parse().expect("static directive"))
        .add_directive("tokio_tungstenite=warn".parse().expect("static directive"))
        .add_directive("hyper=warn".parse().expect("static directive"))
        .add_directive("reqwest=warn".parse().expect("static directive"));

    // Allow RUST_LOG to override
    if let Ok(rust_log) = env::var("RUST_LOG") {
        filter = EnvFilter::new(rust_log);
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Json => subscriber
            .with(tracing_fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => subscriber
            .with(
                tracing_fmt::layer()
                    .pretty()
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Compact => subscriber
            .with(
                tracing_fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("global subscriber already installed");
    }
}

/// Initialize logging from environment variables
pub fn init_default_logging() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "DEBUG".to_string());
    let format = env::var("LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    init_logging(parse_level(&log_level), LogFormat::parse(&format));
}

fn parse_level(value: &str) -> Level {
    match value.to_uppercase().as_str() {
        "ERROR" => Level::ERROR,
        "WARN" => Level::WARN,
        "INFO" => Level::INFO,
        "TRACE" => Level::TRACE,
        _ => Level::DEBUG,
    }
}

bitflags! {
    /// Per-context verbosity mask. Each severity is enabled independently.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LogLevel: u32 {
        const ERROR = 1;
        const WARNING = 1 << 1;
        const INFO = 1 << 2;
        const NOTICE = 1 << 3;
        const DEBUG = 1 << 4;
    }
}

impl LogLevel {
    /// Parse a raw mask such as `31` or `3`. Bits outside the five levels are rejected.
    pub fn from_mask(mask: u32) -> Option<Self> {
        Self::from_bits(mask)
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::all()
    }
}

/// A single log severity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Notice,
    Debug,
}

impl Severity {
    pub fn flag(self) -> LogLevel {
        match self {
            Severity::Error => LogLevel::ERROR,
            Severity::Warning => LogLevel::WARNING,
            Severity::Info => LogLevel::INFO,
            Severity::Notice => LogLevel::NOTICE,
            Severity::Debug => LogLevel::DEBUG,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Notice => "notice",
            Severity::Debug => "debug",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context-scoped logger
///
/// Filters by the owning context's mask, then forwards to `tracing` with the
/// severity attached as a field. Notice has no `tracing` counterpart and is emitted at
/// INFO with `severity = "notice"`.
#[derive(Debug, Clone)]
pub struct Logger {
    mask: LogLevel,
}

impl Logger {
    pub fn new(mask: LogLevel) -> Self {
        Self { mask }
    }

    pub fn mask(&self) -> LogLevel {
        self.mask
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        self.mask.contains(severity.flag())
    }

    /// Emit `message` if `severity` is enabled. Returns whether anything was emitted.
    pub fn log(&self, severity: Severity, message: impl fmt::Display) -> bool {
        if !self.enabled(severity) {
            return false;
        }

        match severity {
            Severity::Error => tracing::error!(severity = %severity, "{}", message),
            Severity::Warning => tracing::warn!(severity = %severity, "{}", message),
            Severity::Info | Severity::Notice => {
                tracing::info!(severity = %severity, "{}", message)
            }
            Severity::Debug => tracing::debug!(severity = %severity, "{}", message),
        }
        true
    }

    pub fn error(&self, message: impl fmt::Display) -> bool {
        self.log(Severity::Error, message)
    }

    pub fn warn(&self, message: impl fmt::Display) -> bool {
        self.log(Severity::Warning, message)
    }

    pub fn info(&self, message: impl fmt::Display) -> bool {
        self.log(Severity::Info, message)
    }

    pub fn notice(&self, message: impl fmt::Display) -> bool {
        self.log(Severity::Notice, message)
    }

    pub fn debug(&self, message: impl fmt::Display) -> bool {
        self.log(Severity::Debug, message)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::default())
    }
}
