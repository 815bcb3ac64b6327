//! Tracing/logging setup shared by binaries and tests.
//!
//! Both entry points are safe to call multiple times; once a global
//! subscriber is installed, later calls are no-ops.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initialize process-wide logging: JSON lines with timestamps, filtered via
/// `RUST_LOG` (default `info`).
pub fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(DEFAULT_FILTER))
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}

/// Initialize human-readable logging captured by the test harness.
///
/// Defaults to `debug` so dispatch spans show up in failing test output.
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_a_no_op() {
        init_for_tests();
        init_for_tests();
        init();
        tracing::info!("still logging");
    }
}
