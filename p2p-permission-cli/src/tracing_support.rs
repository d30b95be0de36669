//! Tracing and logging support.
//!
//! Logs go to stderr so command output on stdout stays machine-readable.

use clap::ValueEnum;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Tracing output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TracingFormat {
    /// Human-readable format with colors.
    Pretty,

    /// Compact single-line format (default).
    Compact,

    /// JSON format, one object per line.
    Json,
}

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level filter.
    ///
    /// If None, uses RUST_LOG environment variable or defaults to "warn".
    pub level: Option<tracing::Level>,

    /// Output format.
    pub format: TracingFormat,

    /// Include timestamps in output.
    pub timestamps: bool,

    /// Include target module names in output.
    pub target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: TracingFormat::Compact,
            timestamps: true,
            target: false,
        }
    }
}

impl TracingConfig {
    fn filter(&self) -> EnvFilter {
        match self.level {
            Some(level) => EnvFilter::new(level.to_string()),
            None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// # Environment Variables
///
/// - `RUST_LOG=debug` - Show state transitions and presentation decisions
/// - `RUST_LOG=p2p_permission=trace` - Per-module filtering
pub fn init_subscriber_with_config(config: TracingConfig) {
    let filter = config.filter();

    match (config.format, config.timestamps) {
        (TracingFormat::Pretty, true) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr)
                        .with_target(config.target),
                )
                .init();
        }
        (TracingFormat::Pretty, false) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .without_time()
                        .with_writer(std::io::stderr)
                        .with_target(config.target),
                )
                .init();
        }
        (TracingFormat::Compact, true) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .with_writer(std::io::stderr)
                        .with_target(config.target),
                )
                .init();
        }
        (TracingFormat::Compact, false) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .compact()
                        .without_time()
                        .with_writer(std::io::stderr)
                        .with_target(config.target),
                )
                .init();
        }
        (TracingFormat::Json, _) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr)
                        .with_target(config.target),
                )
                .init();
        }
    }
}
