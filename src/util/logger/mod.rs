//! Logger for fiberpool
//!
//! Compact `[LEVEL] worker-thread: message key=value` lines on stderr. The
//! thread name column is the pool worker (`<pool>-worker-<n>`) for events a
//! worker emits, and `main` for registration and shutdown events.
//!
//! # Usage
//!
//! ```rust
//! use fiberpool::util::logger::{self, LogLevel};
//!
//! logger::init_with_level(LogLevel::Debug);
//! tracing::info!(pool = "demo", "pool ready");
//! ```

use std::str::FromStr;

use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

/// Log level applied to the scheduler's own events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level '{}'", other)),
        }
    }
}

/// Crate events at `level`, everything else only from WARN up.
pub fn filter_for(level: LogLevel) -> Targets {
    Targets::new()
        .with_target(crate::NAME, LevelFilter::from_level(level.into()))
        .with_default(LevelFilter::WARN)
}

/// Initialize logger at INFO.
pub fn init() {
    init_with_level(LogLevel::default());
}

/// Initialize logger at `level`.
///
/// A second call is a no-op: the first installed subscriber stays in place.
pub fn init_with_level(level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(false)
        .with_level(true)
        .with_thread_names(true)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .compact()
        .with_filter(filter_for(level));

    let _ = Registry::default().with(layer).try_init();
}

/// Initialize logger at DEBUG.
pub fn init_debug() {
    init_with_level(LogLevel::Debug);
}
