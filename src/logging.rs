//! Logging configuration for db-relay.
//!
//! The library only emits `tracing` events; binaries decide where they go.
//! Logs are written to stderr so stdout stays reserved for envelopes.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Builds the filter from `RUST_LOG`, falling back to `default`.
pub fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Initializes logging to stderr.
///
/// `verbose` lowers the fallback level to `debug`, which includes every
/// acquire/run/release step.
pub fn init_stderr_logging(verbose: bool) {
    let default = if verbose { "debug" } else { DEFAULT_FILTER };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default))
        .with_writer(std::io::stderr)
        .init();
}
