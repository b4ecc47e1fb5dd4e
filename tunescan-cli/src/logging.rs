use std::env;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding the log filter, e.g. `tunescan_core=debug`
pub const LOG_ENV: &str = "TUNESCAN_LOG";

/// Info lines would interleave with the scan output in raw mode
const DEFAULT_FILTER: &str = "warn";

fn filter_directive(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

/// Install the global subscriber; logs go to stderr, stdout carries scan output
pub fn init_logger() {
    let filter = filter_directive(env::var(LOG_ENV).ok());
    let filter_layer =
        EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(filter_layer)
        .init();
}
