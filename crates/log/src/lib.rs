//! Process-wide tracing setup.
//!
//! Every NodeRun's `logs` field (§3) is populated from `tracing` events
//! emitted on the node's execution span, not from a bespoke logging
//! abstraction -- handlers just use `tracing::info!` etc. and the engine
//! attaches a `node_span` layer that captures events scoped to that span.

pub use tracing;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Output format for the process-wide subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local development.
    Pretty,
    /// Newline-delimited JSON, for production log aggregation.
    Json,
}

/// Install a global `tracing` subscriber.
///
/// Reads the filter directive from `RUST_LOG`, defaulting to `info` when
/// unset or invalid. Call once at process startup, before constructing the
/// engine's composition root.
pub fn init(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => {
            registry.with(fmt::layer().with_target(true)).init();
        }
        LogFormat::Json => {
            registry.with(fmt::layer().json().with_target(true)).init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_variants_are_distinct() {
        assert_ne!(LogFormat::Pretty, LogFormat::Json);
    }
}
