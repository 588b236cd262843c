//! Tracing subscriber initialization.
//!
//! Call one of these once at startup, before `App::listen`. The `RUST_LOG`
//! environment variable always wins over the programmatic level.
//!
//! ```bash
//! RUST_LOG=ravel_core=debug cargo run
//! ```

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogLevel;

/// Initialize logging with sensible defaults (`info` unless `RUST_LOG`
/// says otherwise).
///
/// # Panics
///
/// Panics if a global subscriber is already set. Call it once.
pub fn init_logging() {
    init_logging_with_level("info");
}

/// Initialize logging at a specific level, still overridable by
/// `RUST_LOG`.
pub fn init_logging_with_level(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize logging from the configured [`LogLevel`].
pub fn init_logging_for(level: LogLevel) {
    init_logging_with_level(level.as_directive());
}
