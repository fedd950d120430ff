//! Structured logging setup. JSON output by default so the same log stream
//! works unchanged whether it lands in a terminal or a log aggregator.

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,gateway_server=debug")),
        )
        .json()
        .init();
}
