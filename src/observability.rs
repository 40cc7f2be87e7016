//! Structured logging and tracing configuration.
//!
//! Logs go to stderr so stdout stays free for consumer output.

use std::path::Path;

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Tracing configuration options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Build a tracing configuration from `WORKWATCH_LOG_LEVEL` and
/// `WORKWATCH_LOG_JSON`, falling back to the defaults.
#[must_use]
pub fn config_from_env() -> TracingConfig {
    let level = std::env::var("WORKWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json = std::env::var("WORKWATCH_LOG_JSON")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);

    TracingConfig { level, json }
}

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Panics
///
/// Panics if tracing subscriber has already been initialized in this process.
pub fn init_tracing(config: &TracingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    if config.json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!(level = %config.level, json = config.json, "Tracing initialized");
}

/// Spans shared across the crate.
pub mod spans {
    use super::Path;
    use tracing::{info_span, Span};

    /// Span covering everything routed for one watched root.
    #[must_use]
    pub fn session_span(root: &Path) -> Span {
        info_span!("watch_session", root = %root.display())
    }
}
