#![forbid(unsafe_code)]

//! Subscriber installation for binaries and test harnesses.
//!
//! The library crates only emit `tracing` events and spans; nothing in
//! gridmux installs a subscriber unless the embedding application calls
//! [`init_tracing`]. The filter comes from `GRIDMUX_LOG` (standard
//! `EnvFilter` syntax), falling back to the level passed in.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter directive.
pub const LOG_ENV: &str = "GRIDMUX_LOG";

/// Error from [`init_tracing`].
#[derive(Debug)]
pub enum TelemetryError {
    /// `GRIDMUX_LOG` did not parse as a filter directive.
    Filter(String),
    /// A global subscriber was already installed.
    AlreadyInstalled(String),
}

impl std::fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Filter(msg) => write!(f, "invalid {LOG_ENV} filter: {msg}"),
            Self::AlreadyInstalled(msg) => write!(f, "subscriber already installed: {msg}"),
        }
    }
}

impl std::error::Error for TelemetryError {}

fn build_filter(default_level: &str) -> Result<EnvFilter, TelemetryError> {
    match std::env::var(LOG_ENV) {
        Ok(directive) if !directive.trim().is_empty() => {
            EnvFilter::try_new(directive).map_err(|err| TelemetryError::Filter(err.to_string()))
        }
        _ => EnvFilter::try_new(default_level).map_err(|err| TelemetryError::Filter(err.to_string())),
    }
}

/// Install the global subscriber.
///
/// With the `tracing-json` feature, events are written as JSON lines;
/// otherwise as compact human-readable text.
pub fn init_tracing(default_level: &str) -> Result<(), TelemetryError> {
    let filter = build_filter(default_level)?;

    #[cfg(feature = "tracing-json")]
    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false);
    #[cfg(not(feature = "tracing-json"))]
    let fmt_layer = tracing_subscriber::fmt::layer().compact().with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| TelemetryError::AlreadyInstalled(err.to_string()))
}
