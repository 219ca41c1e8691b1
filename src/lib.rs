pub mod config;
pub mod error;
pub mod etcd_stats;
pub mod leader;
pub mod metrics;
pub mod probe;

pub use error::{ProbeError, ProbeResult};
pub use probe::{MetricsProbe, ProbeOutput, Query, QueryType, NOT_SUPPORTED};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// Logs go to stderr: stdout carries nothing but the probe result, which the
/// monitoring agent parses.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();
}
