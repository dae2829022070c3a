//! Structured logging infrastructure.
//!
//! Log level can be configured via the `RUST_LOG` environment variable and
//! defaults to `info`. Initialization is idempotent: a second call (for
//! example from another test in the same process) leaves the first
//! subscriber in place.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize human-readable logging.
///
/// # Example
/// ```no_run
/// use vanetsec_core::logging;
///
/// logging::init();
/// tracing::info!("Simulation starting");
/// ```
pub fn init() {
    init_with_level("info");
}

/// Initialize human-readable logging with an explicit fallback level.
pub fn init_with_level(default_level: &str) {
    let _ = tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init();
}

/// Initialize JSON logging for log aggregation.
///
/// # Example
/// ```no_run
/// use vanetsec_core::logging;
///
/// logging::init_json();
/// tracing::info!(vehicles = 50, "Simulation starting");
/// ```
pub fn init_json() {
    let _ = tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .try_init();
}
