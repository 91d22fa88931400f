//! Tracing setup shared by the CLI host and integration harnesses.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Configuration for log output.
#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    /// Default log level. Overridden by the RUST_LOG env var.
    pub log_level: Level,
    /// Emit one JSON object per line instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            json: false,
        }
    }
}

impl TelemetryConfig {
    /// Debug-mode config matching the settings flag: everything at DEBUG.
    pub fn debug() -> Self {
        Self {
            log_level: Level::DEBUG,
            json: false,
        }
    }
}

/// Initialize the global subscriber. Call once at startup; later calls are
/// no-ops so tests can initialize freely.
pub fn init_telemetry(config: TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.to_string().to_lowercase()));

    if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(filter);
        let _ = tracing_subscriber::registry().with(layer).try_init();
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(filter);
        let _ = tracing_subscriber::registry().with(layer).try_init();
    }
}
