//! Logging setup
//!
//! Logs go to stderr so that JSON printed on stdout stays pipeable.
//! `RUST_LOG` takes precedence over the verbosity flags when it is set.

use crate::config::Verbosity;
use tracing_subscriber::EnvFilter;

/// Build the event filter for `verbosity`, preferring `RUST_LOG` when present
pub fn build_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()))
}

/// Initialize the global subscriber
///
/// Call once at startup. Later calls are ignored.
pub fn init_logging(verbosity: Verbosity) {
    let result = tracing_subscriber::fmt()
        .with_env_filter(build_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    if let Err(e) = result {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }
}
