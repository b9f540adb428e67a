//! Logging initialization for embedding applications.
//!
//! The library itself only emits `tracing` events; hosts that do not already
//! install a subscriber can call [`init`] to get console output filtered by
//! the `RUST_LOG` environment variable (default `info`).

use tracing_subscriber::EnvFilter;

/// Installs a console `tracing` subscriber.
///
/// Safe to call more than once; only the first call installs a subscriber.
/// Applications with their own `tracing` setup should skip this and let the
/// pipeline's events flow into their subscriber.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init();
}
