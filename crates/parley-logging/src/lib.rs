//! # parley-logging
//!
//! Structured logging with `tracing`.
//!
//! - [`init_subscriber`] installs the global stderr subscriber, either
//!   compact human-readable lines or JSON objects
//! - [`test_utils::capture_logs`] captures events in memory so tests can
//!   assert on what was logged
//!
//! `RUST_LOG` always wins over the configured level.

#![deny(unsafe_code)]

pub mod test_utils;

pub use parley_settings::{LogFormat, LoggingSettings};
pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber on stderr.
///
/// Call once at startup. Subsequent calls are no-ops.
pub fn init_subscriber(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    // try_init is a no-op if a global subscriber is already set
    let _ = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().with_span_list(true).try_init(),
    };
}

/// Initialize the global subscriber from loaded settings.
pub fn init_from_settings(settings: &LoggingSettings) {
    init_subscriber(&settings.level, settings.format);
}
