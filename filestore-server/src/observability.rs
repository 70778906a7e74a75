//! Tracing setup for the server process.

use tracing_subscriber::{EnvFilter, prelude::*};

use crate::config::Config;

/// Initializes the global tracing subscriber.
///
/// The configured level acts as the default; `RUST_LOG` can still override
/// it per module.
pub fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.logging.level.into())
        .from_env_lossy();

    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(format)
        .with(env_filter)
        .init();
}
