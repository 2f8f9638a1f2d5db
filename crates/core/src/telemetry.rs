// Telemetry
//
// The notifier's diagnostic stream is stderr: the scheduler that spawns it
// collects stderr lines and reads the severity from them, so every line
// carries its level (ERROR, DEBUG, ...). Stdout stays unused.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Default log filter when neither RUST_LOG nor LOG_LEVEL is set
pub const DEFAULT_LOG_FILTER: &str = "httpfeed_core=debug,http_notifier=debug";

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Log filter (e.g., "info", "debug", "httpfeed_core=trace")
    pub log_filter: Option<String>,
    /// Prefix lines with a timestamp
    pub with_time: bool,
    /// Include the module path of each event
    pub with_target: bool,
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    /// - `HTTPFEED_LOG_TIME`: Prefix lines with a timestamp ("true" to enable)
    pub fn from_env() -> Self {
        Self {
            log_filter: std::env::var("RUST_LOG")
                .ok()
                .or_else(|| std::env::var("LOG_LEVEL").ok()),
            with_time: std::env::var("HTTPFEED_LOG_TIME")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(false),
            with_target: false,
        }
    }

    /// Build the filter, falling back to [`DEFAULT_LOG_FILTER`] when the
    /// configured one does not parse
    pub fn filter(&self) -> EnvFilter {
        self.log_filter
            .as_ref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
    }
}

/// Install the global subscriber writing to stderr
///
/// Calling it a second time is harmless; the first subscriber stays.
pub fn init_telemetry(config: TelemetryConfig) {
    let filter = config.filter();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(config.with_target)
        .with_level(true);

    let stderr_layer = if config.with_time {
        stderr_layer.with_filter(filter).boxed()
    } else {
        stderr_layer.without_time().with_filter(filter).boxed()
    };

    if let Err(e) = tracing_subscriber::registry().with(stderr_layer).try_init() {
        eprintln!("DEBUG: tracing subscriber already installed: {}", e);
    }
}
