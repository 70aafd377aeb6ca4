//! Tracing and logging setup
//!
//! Configures the `tracing` subscriber with environment-based filtering.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output options for the tracing subscriber
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info",
    /// "campus_realtime=debug")
    pub default_filter: String,
    /// Emit JSON lines instead of the human-readable format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: false,
        }
    }
}

impl TracingConfig {
    /// Structured JSON output for production log shipping
    #[must_use]
    pub fn production() -> Self {
        Self {
            default_filter: "info".to_string(),
            json: true,
        }
    }
}

/// Tracing setup errors
#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}

/// Install the global subscriber
///
/// # Panics
/// Panics if a subscriber is already installed; use [`try_init_tracing`]
/// when that is expected (tests, embedded use).
pub fn init_tracing(config: TracingConfig) {
    try_init_tracing(config).expect("tracing subscriber already initialized");
}

/// Install the global subscriber; `RUST_LOG` overrides the configured filter
pub fn try_init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let format = if config.json {
        fmt::layer().json().with_current_span(true).boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .try_init()
        .map_err(|_| TracingError::AlreadyInitialized)
}
