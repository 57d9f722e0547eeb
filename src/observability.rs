//! Observability subsystem
//!
//! Installs the process-wide `tracing` subscriber. Everything else logs
//! through the `tracing` macros with structured fields.
//!
//! `RUST_LOG`, when set, wins over the configured filter.

use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when neither `RUST_LOG` nor the config names one
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=info";

/// Logging settings taken from the application config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    pub json: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}

/// Builds the filter, preferring `RUST_LOG` over `configured`.
pub fn env_filter(configured: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber, writing to stderr.
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(settings: &LogSettings) -> Result<(), String> {
    let filter = env_filter(&settings.filter);
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let result = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|e| format!("failed to install tracing subscriber: {}", e))
}
